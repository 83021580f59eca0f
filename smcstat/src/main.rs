/*!
# SMC Status Monitor

Prints the CPU and GPU temperatures read from the System Management
Controller, refreshed on a fixed interval.

## Features

- Periodic `CPU: <value> , GPU: <value>` status line
- One-shot reads of any key with its type, size and raw bytes
- TOML configuration for sensor keys, interval, call timeout and rendering
- Diagnostics on stderr so stdout carries only status output

## Usage

### Watch (default)
```bash
smcstat
smcstat watch --interval-ms 1000 --timestamps
```

### Single key
```bash
smcstat read TC0P --json
```

### Generate configuration
```bash
smcstat config --output smcstat.toml
```
*/

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use smc::{decode_value, SensorKey, Session};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod display;
mod monitor;

use config::AppConfig;
use display::{StatusSink, StdoutSink};
use monitor::TemperatureMonitor;

#[derive(Parser)]
#[command(name = "smcstat")]
#[command(about = "CPU/GPU temperature status line backed by the SMC")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = "smcstat.toml")]
    config: PathBuf,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the temperature status line periodically
    Watch {
        /// Override the refresh interval
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// Print a single line and exit
        #[arg(long)]
        once: bool,

        /// Prefix each line with the local time
        #[arg(long)]
        timestamps: bool,
    },

    /// Read a single key and show its raw and decoded value
    Read {
        /// Four-character key, e.g. TC0P
        key: SensorKey,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate configuration file
    Config {
        /// Output path for configuration file
        #[arg(short, long, default_value = "smcstat.toml")]
        output: PathBuf,
    },
}

/// Result of a one-shot key read
#[derive(Debug, Serialize)]
struct KeyReport {
    key: SensorKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    type_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging goes to stderr to keep stdout clean for status lines
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    match cli.command {
        Some(Commands::Watch { interval_ms, once, timestamps }) => {
            run_watch(cli.config, interval_ms, once, timestamps)
        }

        Some(Commands::Read { key, json }) => run_read(cli.config, key, json),

        Some(Commands::Config { output }) => generate_config_file(output),

        None => run_watch(cli.config, None, false, false),
    }
}

/// Open a session for `config`, aborting with a diagnostic if that fails
fn open_session(config: &AppConfig) -> Result<Session> {
    Session::open_with(&config.monitor.session_options()).map_err(|e| {
        error!("Could not open SMC session: {}", e);
        anyhow::Error::new(e).context("Failed to open SMC session")
    })
}

/// Run the periodic status line
fn run_watch(
    config_path: PathBuf,
    interval_ms: Option<u64>,
    once: bool,
    timestamps: bool,
) -> Result<()> {
    let mut config = AppConfig::load_or_default(&config_path)?;
    if let Some(ms) = interval_ms {
        config.monitor.refresh_interval_ms = ms;
    }
    config.display.show_timestamp |= timestamps;
    config.validate()?;

    let mut session = open_session(&config)?;
    let monitor = TemperatureMonitor::new(&config);
    let mut sink = StdoutSink::new(config.display.show_timestamp);

    if once {
        let line = monitor.refresh(&mut session);
        sink.show(&line)?;
    } else {
        // Set up Ctrl+C handler
        let running = monitor.get_running_flag();
        ctrlc::set_handler(move || {
            info!("🛑 Received Ctrl+C, shutting down gracefully...");
            running.store(false, std::sync::atomic::Ordering::SeqCst);
        })?;

        monitor.run(&mut session, &mut sink)?;
    }

    session.close().context("Failed to close SMC session")?;
    Ok(())
}

/// Read one key and print its raw bytes and decoded value
fn run_read(config_path: PathBuf, key: SensorKey, json: bool) -> Result<()> {
    let config = AppConfig::load_or_default(&config_path)?;
    let mut session = open_session(&config)?;

    let report = match session.read_key(key) {
        Ok(raw) => {
            let decoded = decode_value(&raw);
            KeyReport {
                key,
                type_tag: Some(raw.type_tag().to_string()),
                size: Some(raw.size()),
                bytes: Some(hex::encode(raw.payload())),
                value: decoded.as_ref().ok().copied(),
                error: decoded.err().map(|e| e.to_string()),
            }
        }
        Err(e) => KeyReport {
            key,
            type_tag: None,
            size: None,
            bytes: None,
            value: None,
            error: Some(e.to_string()),
        },
    };
    session.close().context("Failed to close SMC session")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render_report(&report));
    }

    match (&report.error, report.size) {
        (Some(message), None) => anyhow::bail!("Failed to read {}: {}", key, message),
        _ => Ok(()),
    }
}

fn render_report(report: &KeyReport) -> String {
    let mut out = format!("{}", report.key);
    if let (Some(tag), Some(size)) = (&report.type_tag, report.size) {
        out.push_str(&format!("  [{}]  {} bytes", tag, size));
    }
    if let Some(bytes) = &report.bytes {
        out.push_str(&format!("  ({})", bytes));
    }
    match (&report.value, &report.error) {
        (Some(value), _) => out.push_str(&format!("  {}", value)),
        (None, Some(error)) => out.push_str(&format!("  <{}>", error)),
        (None, None) => {}
    }
    out
}

/// Generate a default configuration file
fn generate_config_file(output_path: PathBuf) -> Result<()> {
    let config = AppConfig::new();
    config.save_to_file(&output_path)?;

    println!("✅ Generated configuration file: {}", output_path.display());
    println!("📝 Edit the file to customize settings, then run:");
    println!("   smcstat --config {}", output_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(value: Option<f64>, error: Option<&str>) -> KeyReport {
        KeyReport {
            key: "TC0P".parse().unwrap(),
            type_tag: Some("sp78".to_string()),
            size: Some(2),
            bytes: Some("2d00".to_string()),
            value,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_render_decoded_report() {
        assert_eq!(
            render_report(&report(Some(45.0), None)),
            "TC0P  [sp78]  2 bytes  (2d00)  45"
        );
    }

    #[test]
    fn test_render_undecodable_report() {
        assert_eq!(
            render_report(&report(None, Some("Key returned no data"))),
            "TC0P  [sp78]  2 bytes  (2d00)  <Key returned no data>"
        );
    }

    #[test]
    fn test_report_json_skips_missing_fields() {
        let failed = KeyReport {
            key: "TG0P".parse().unwrap(),
            type_tag: None,
            size: None,
            bytes: None,
            value: None,
            error: Some("SMC call failed: status 0xffffffff".to_string()),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["key"], "TG0P");
        assert!(json.get("size").is_none());
        assert_eq!(json["error"], "SMC call failed: status 0xffffffff");
    }

    #[test]
    fn test_cli_parses_key_argument() {
        let cli = Cli::try_parse_from(["smcstat", "read", "TC0P", "--json"]).unwrap();
        match cli.command {
            Some(Commands::Read { key, json }) => {
                assert_eq!(key.code(), 0x5443_3050);
                assert!(json);
            }
            _ => panic!("expected read command"),
        }

        assert!(Cli::try_parse_from(["smcstat", "read", "TOOLONG"]).is_err());
    }
}
