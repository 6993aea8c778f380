use std::env;

use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    EnvFilter, Layer, fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
};

use crate::config::LogLevel;

const FORMAT_VAR: &str = "MIXLAYER_LOG_FORMAT";

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

fn json_requested() -> bool {
    env::var(FORMAT_VAR).is_ok_and(|format| format == "json")
}

/// Terminal output; always stderr so stdout stays reserved for monitor output
fn console_layer<S>(json: bool) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr)
            .boxed()
    }
}

fn file_layer<S>(json: bool, writer: NonBlocking) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_level(true)
            .with_writer(writer)
            .with_ansi(false)
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_target(true)
            .with_level(true)
            .with_writer(writer)
            .with_ansi(false)
            .boxed()
    }
}

/// Initialize tracing for the monitor tool
///
/// Uses RUST_LOG if set, otherwise the configured level. Output goes to
/// stderr, pretty printed unless MIXLAYER_LOG_FORMAT is "json".
///
/// # Errors
/// Returns error if a global subscriber is already installed
pub fn init(level: LogLevel) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(console_layer(json_requested()))
        .try_init()?;

    Ok(())
}

/// Initialize tracing with an additional daily rolling log file
///
/// Files live in the mixlayer log directory and are kept for a week. The
/// returned guard flushes the file writer when dropped.
///
/// # Errors
/// Returns error if the log directory cannot be created or a global
/// subscriber is already installed
pub fn init_with_file(level: LogLevel) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    const DAYS_TO_KEEP: usize = 7;

    let log_dir = crate::config::ConfigPaths::log_dir()?;
    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .max_log_files(DAYS_TO_KEEP)
        .filename_prefix("mixlayer")
        .filename_suffix("log")
        .build(&log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let json = json_requested();
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(console_layer(json))
        .with(file_layer(json, non_blocking))
        .try_init()?;

    Ok(guard)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tracing_subscriber::Registry;

    use super::*;

    #[test]
    fn console_layer_builds_for_both_formats() {
        for json in [false, true] {
            let subscriber = Registry::default().with(console_layer(json));

            tracing::subscriber::with_default(subscriber, || {
                tracing::info!(json, "console layer ready");
            });
        }
    }

    #[test]
    fn file_layer_writes_json_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let appender = tracing_appender::rolling::never(dir.path(), "test.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let subscriber = Registry::default().with(file_layer(true, writer));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(backend = "Null", "Using backend");
        });
        drop(guard);

        let written = std::fs::read_to_string(dir.path().join("test.log")).unwrap();
        let line: serde_json::Value = serde_json::from_str(written.lines().next().unwrap()).unwrap();
        assert_eq!(line["fields"]["message"], "Using backend");
    }
}
