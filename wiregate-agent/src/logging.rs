//! Logging initialization for wiregate-agent.
//!
//! The subscriber is assembled from the `[general]` section of
//! `AgentConfig` after CLI overrides have been applied. A `RUST_LOG`
//! environment filter, when present, wins over the configured level.

use std::str::FromStr;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use wiregate_core::config::GeneralConfig;

/// Output format for agent logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON event per line. The default for deployments.
    Json,
    /// Multi-line colored output for local debugging.
    Pretty,
    /// Abbreviated single-line output, readable in journald.
    Compact,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(anyhow::anyhow!(
                "unsupported log format '{other}' (known formats: json, pretty, compact)"
            )),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Called once at startup, after the configuration is final. Fails if
/// the requested format is unknown or a subscriber has already been
/// installed in this process.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format: LogFormat = config.log_format.parse()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init(),
    };

    installed.map_err(|e| anyhow::anyhow!("tracing subscriber was not installed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_formats_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
    }

    #[test]
    fn unknown_format_names_the_offender() {
        let err = "xml".parse::<LogFormat>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("xml"));
        assert!(msg.contains("compact"));
    }

    #[test]
    fn format_parsing_is_case_sensitive() {
        // Config values are expected in lowercase
        assert!("JSON".parse::<LogFormat>().is_err());
    }

    #[test]
    fn init_rejects_unknown_format_before_installing() {
        let config = GeneralConfig {
            log_level: "info".to_owned(),
            log_format: "xml".to_owned(),
        };
        assert!(init_tracing(&config).is_err());
    }
}
