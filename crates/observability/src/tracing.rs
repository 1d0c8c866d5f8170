//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Output format for process logs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line (default; for log shippers).
    #[default]
    Json,
    /// Human-readable multi-line output for local runs.
    Pretty,
}

/// Initialize tracing/logging for the process.
///
/// Filter comes from `RUST_LOG` (default `info`). Safe to call multiple times
/// (subsequent calls are no-ops).
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    let _ = match format {
        LogFormat::Json => builder.json().with_target(false).try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init(LogFormat::Json);
        init(LogFormat::Pretty);
        tracing::info!("still logging after repeated init");
    }
}
