//! Command-line monitor for the mixer.
//!
//! Connects a context, prints the topology once it is ready and then
//! follows every context event until interrupted.

pub mod formatting;
mod monitor;

use std::path::PathBuf;

use clap::Parser;

pub use monitor::run;

use crate::mixer::BackendType;

/// Arguments of the `mixlayer` monitor
#[derive(Debug, Clone, Parser)]
#[command(name = "mixlayer", version, about = "Watch the sound topology of the active backend")]
pub struct MonitorArgs {
    /// Backend to use instead of auto-detection
    #[arg(long, value_parser = parse_backend_type)]
    pub backend: Option<BackendType>,

    /// Sound server address
    #[arg(long)]
    pub server: Option<String>,

    /// Configuration file instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long)]
    pub debug: bool,

    /// Also write logs to the mixlayer log directory
    #[arg(long)]
    pub log_file: bool,

    /// Print the topology and exit instead of following events
    #[arg(long)]
    pub once: bool,

    /// Print the JSON schema of the configuration file and exit
    #[arg(long)]
    pub print_schema: bool,
}

fn parse_backend_type(value: &str) -> Result<BackendType, String> {
    match value.to_ascii_lowercase().as_str() {
        "auto" | "unknown" => Ok(BackendType::Unknown),
        "pulseaudio" | "pulse" => Ok(BackendType::PulseAudio),
        "alsa" => Ok(BackendType::Alsa),
        "oss" => Ok(BackendType::Oss),
        "null" => Ok(BackendType::Null),
        other => Err(format!(
            "unknown backend '{other}', expected one of: auto, pulseaudio, alsa, oss, null"
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_aliases() {
        assert_eq!(parse_backend_type("Pulse"), Ok(BackendType::PulseAudio));
        assert_eq!(parse_backend_type("auto"), Ok(BackendType::Unknown));
        assert!(parse_backend_type("jack").is_err());
    }

    #[test]
    fn parses_monitor_flags() {
        let args =
            MonitorArgs::try_parse_from(["mixlayer", "--backend", "null", "--once"]).unwrap();

        assert_eq!(args.backend, Some(BackendType::Null));
        assert!(args.once);
        assert!(!args.debug);
    }
}
