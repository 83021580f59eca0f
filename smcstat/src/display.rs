/*!
Status line rendering and output.

The monitor only ever hands a finished line to a [`StatusSink`]; where that
line ends up (terminal, window, test buffer) is the sink's business.
*/

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

use crate::config::DisplayConfig;

/// Rendering for a sensor that could not be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fallback {
    /// Show `0`, like a zero-degree reading
    #[default]
    Zero,
    /// Show `--`
    Dash,
}

/// Receives finished status lines
pub trait StatusSink {
    fn show(&mut self, line: &str) -> io::Result<()>;
}

/// Writes each status line to stdout
pub struct StdoutSink {
    show_timestamp: bool,
}

impl StdoutSink {
    pub fn new(show_timestamp: bool) -> Self {
        Self { show_timestamp }
    }
}

impl StatusSink for StdoutSink {
    fn show(&mut self, line: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        if self.show_timestamp {
            write!(stdout, "[{}] ", Local::now().format("%H:%M:%S"))?;
        }
        writeln!(stdout, "{}", line)?;
        stdout.flush()
    }
}

impl StatusSink for Vec<String> {
    fn show(&mut self, line: &str) -> io::Result<()> {
        self.push(line.to_string());
        Ok(())
    }
}

/// Format a temperature, with fixed decimals when `precision` is set
pub fn format_value(value: f64, precision: Option<usize>) -> String {
    match precision {
        Some(digits) => format!("{:.*}", digits, value),
        None => format!("{}", value),
    }
}

/// Render one sensor as `"<label>: <value>"`
pub fn format_reading(label: &str, reading: &smc::Result<f64>, display: &DisplayConfig) -> String {
    match (reading, display.unavailable) {
        (Ok(value), _) => format!("{}: {}", label, format_value(*value, display.precision)),
        (Err(_), Fallback::Zero) => format!("{}: {}", label, format_value(0.0, display.precision)),
        (Err(_), Fallback::Dash) => format!("{}: --", label),
    }
}

/// Join the CPU and GPU renderings into one line
pub fn status_line(cpu: &str, gpu: &str) -> String {
    format!("{} , {}", cpu, gpu)
}
