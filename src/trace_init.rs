//! JSON-lines trace output for looking at a session after the fact.
//!
//! Only the `trace` feature writes anything; without it [`init_tracing`]
//! returns an inert guard so callers need no `cfg` of their own.

use std::io;
use std::path::Path;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "scan_engine=debug,scan_session=debug,scan_core=debug";

/// File created inside the trace directory.
pub const TRACE_FILE: &str = "scan-trace.jsonl";

/// Keeps the background writer alive. Buffered records are flushed when it
/// is dropped.
#[must_use = "trace output stops when the guard is dropped"]
pub struct TraceGuard {
    #[cfg(feature = "trace")]
    _writer: tracing_appender::non_blocking::WorkerGuard,
}

/// Install a global JSON subscriber writing to `log_dir/scan-trace.jsonl`,
/// creating the directory if needed. If another subscriber is already
/// installed it stays in place and the file receives nothing.
#[cfg(feature = "trace")]
pub fn init_tracing(log_dir: &Path) -> io::Result<TraceGuard> {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    std::fs::create_dir_all(log_dir)?;
    let appender = tracing_appender::rolling::never(log_dir, TRACE_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = tracing_subscriber::fmt()
        .json()
        .with_writer(writer)
        .with_target(true)
        .with_thread_names(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(filter)
        .try_init();
    if installed.is_err() {
        tracing::warn!(dir = %log_dir.display(), "subscriber already installed, trace file unused");
    }
    Ok(TraceGuard { _writer: guard })
}

#[cfg(not(feature = "trace"))]
pub fn init_tracing(_log_dir: &Path) -> io::Result<TraceGuard> {
    Ok(TraceGuard {})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_keeps_first_subscriber() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let first = init_tracing(&logs).unwrap();
        let second = init_tracing(&logs).unwrap();
        drop(second);
        drop(first);
        #[cfg(feature = "trace")]
        assert!(logs.join(TRACE_FILE).exists());
    }
}
