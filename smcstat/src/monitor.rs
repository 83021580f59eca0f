/*!
Periodic CPU/GPU temperature refresh.

Reads both sensors through one session, renders the status line and hands
it to a sink. The loop sleeps in short ticks so a cleared running flag is
noticed quickly even with a long refresh interval.
*/

use anyhow::{bail, Context, Result};
use smc::{SensorKey, Session};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{AppConfig, DisplayConfig};
use crate::display::{format_reading, status_line, StatusSink};

/// Granularity of the running-flag check between refreshes
const TICK: Duration = Duration::from_millis(100);

/// Refreshes the status line on a fixed interval
pub struct TemperatureMonitor {
    cpu_key: SensorKey,
    gpu_key: SensorKey,
    refresh_interval: Duration,
    display: DisplayConfig,
    running: Arc<AtomicBool>,
}

impl TemperatureMonitor {
    /// Create a monitor from the application configuration
    pub fn new(config: &AppConfig) -> Self {
        Self {
            cpu_key: config.monitor.cpu_key,
            gpu_key: config.monitor.gpu_key,
            refresh_interval: config.monitor.refresh_interval(),
            display: config.display.clone(),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get a reference to the running flag for external control
    pub fn get_running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Read both sensors once and render the status line
    pub fn refresh(&self, session: &mut Session) -> String {
        let cpu = session.read_temperature(self.cpu_key);
        let gpu = session.read_temperature(self.gpu_key);

        for (key, reading) in [(self.cpu_key, &cpu), (self.gpu_key, &gpu)] {
            if let Err(e) = reading {
                debug!(%key, "Sensor read failed: {}", e);
            }
        }

        status_line(
            &format_reading("CPU", &cpu, &self.display),
            &format_reading("GPU", &gpu, &self.display),
        )
    }

    /// Refresh until the running flag is cleared; returns the refresh count
    ///
    /// Fails if the session is lost, since no later read could succeed.
    pub fn run<S: StatusSink>(&self, session: &mut Session, sink: &mut S) -> Result<u64> {
        info!(
            "🌡️ Monitoring {} / {} every {:?}",
            self.cpu_key, self.gpu_key, self.refresh_interval
        );

        let mut refreshes = 0u64;
        let mut last_refresh: Option<Instant> = None;

        while self.running.load(Ordering::SeqCst) {
            let due = last_refresh.map_or(true, |at| at.elapsed() >= self.refresh_interval);
            if !due {
                thread::sleep(TICK.min(self.refresh_interval));
                continue;
            }

            let line = self.refresh(session);
            last_refresh = Some(Instant::now());

            if !session.is_open() {
                warn!("SMC session lost after {} refreshes", refreshes);
                bail!("SMC session was closed while monitoring");
            }

            sink.show(&line).context("Failed to write status line")?;
            refreshes += 1;
        }

        info!("Stopped after {} refreshes", refreshes);
        Ok(refreshes)
    }
}
