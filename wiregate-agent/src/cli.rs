//! CLI argument definitions for wiregate-agent.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.
//! Flags override values loaded from `wiregate.toml`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use wiregate_core::AgentConfig;

/// Wiregate host telemetry agent.
///
/// Captures packets on every network interface, tails system log
/// files, and publishes batched records to the downstream event bus.
#[derive(Parser, Debug)]
#[command(name = "wiregate-agent")]
#[command(version, about, long_about = None)]
pub struct AgentCli {
    /// Path to wiregate.toml configuration file.
    #[arg(short, long, default_value = "/etc/wiregate/wiregate.toml")]
    pub config: PathBuf,

    /// Maximum number of packet records per batch.
    ///
    /// Takes precedence over the config file.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Network batch timeout (e.g. "1s", "500ms").
    ///
    /// Takes precedence over the config file.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub batch_timeout: Option<Duration>,

    /// Prometheus metrics HTTP port.
    ///
    /// Takes precedence over the config file.
    #[arg(long)]
    pub metrics_port: Option<u16>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty, compact).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without starting the agent.
    #[arg(long)]
    pub validate: bool,
}

impl AgentCli {
    /// Apply CLI overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut AgentConfig) {
        if let Some(batch_size) = self.batch_size {
            config.capture.batch_size = batch_size;
        }
        if let Some(batch_timeout) = self.batch_timeout {
            config.capture.batch_timeout = batch_timeout;
        }
        if let Some(port) = self.metrics_port {
            config.metrics.port = port;
        }
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
    }
}
