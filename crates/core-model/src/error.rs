use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy of the monitor. None of these ever reach the host: each
/// call site degrades to a default, a fallback mode or a log line.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A scene lookup failed; the field is reported as unknown.
    #[error("metadata field `{field}` unavailable")]
    MetadataUnavailable { field: &'static str },

    /// No usable output path; the file watcher cannot be started.
    #[error("output path unresolvable: {0}")]
    OutputPathUnresolvable(String),

    /// A file vanished or changed between the existence check and the read.
    #[error("file system race on {}: {source}", path.display())]
    FileSystemRace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The notification channel rejected the report.
    #[error("notification delivery failed: {0}")]
    DeliveryFailure(String),

    /// A watcher already owns this job; at most one runs per job.
    #[error("file watcher already running for job {job}")]
    WatcherAlreadyRunning { job: u64 },

    /// The OS refused to spawn the watcher thread.
    #[error("failed to spawn watcher thread: {0}")]
    WatcherSpawn(#[source] std::io::Error),
}

impl MonitorError {
    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::DeliveryFailure(msg.into())
    }

    pub fn unresolvable(msg: impl Into<String>) -> Self {
        Self::OutputPathUnresolvable(msg.into())
    }
}
