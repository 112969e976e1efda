//! Lifecycle vocabulary shared by the monitor, the tracker and the watcher.
//! Host hooks arrive as [`HostEvent`]s, watcher lifecycles are described by
//! [`WatcherState`] / [`WatcherExit`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use core_model::JobSpec;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Process-wide relaxed counters. They are never reset; tests compare before/after deltas. The CLI
// logs a snapshot at exit.
// -------------------------------------------------------------------------------------------------
pub static WATCHERS_STARTED: AtomicU64 = AtomicU64::new(0);
pub static WATCHER_LAZY_STARTS: AtomicU64 = AtomicU64::new(0);
pub static WATCHER_EXIT_COMPLETED: AtomicU64 = AtomicU64::new(0);
pub static WATCHER_EXIT_STALLED: AtomicU64 = AtomicU64::new(0);
pub static WATCHER_EXIT_STOPPED: AtomicU64 = AtomicU64::new(0);
pub static FRAMES_DETECTED: AtomicU64 = AtomicU64::new(0); // files accepted by the watcher
pub static FS_RACES: AtomicU64 = AtomicU64::new(0); // metadata readable but mtime not
pub static NOISE_CALLBACKS: AtomicU64 = AtomicU64::new(0); // callbacks ignored while a watcher runs
pub static DIRECT_SAMPLES: AtomicU64 = AtomicU64::new(0);
pub static REPORTS_SENT: AtomicU64 = AtomicU64::new(0);
pub static DELIVERY_FAILURES: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetrySnapshot {
    pub watchers_started: u64,
    pub watcher_lazy_starts: u64,
    pub watcher_exit_completed: u64,
    pub watcher_exit_stalled: u64,
    pub watcher_exit_stopped: u64,
    pub frames_detected: u64,
    pub fs_races: u64,
    pub noise_callbacks: u64,
    pub direct_samples: u64,
    pub reports_sent: u64,
    pub delivery_failures: u64,
}

pub fn telemetry_snapshot() -> TelemetrySnapshot {
    use Ordering::Relaxed;
    TelemetrySnapshot {
        watchers_started: WATCHERS_STARTED.load(Relaxed),
        watcher_lazy_starts: WATCHER_LAZY_STARTS.load(Relaxed),
        watcher_exit_completed: WATCHER_EXIT_COMPLETED.load(Relaxed),
        watcher_exit_stalled: WATCHER_EXIT_STALLED.load(Relaxed),
        watcher_exit_stopped: WATCHER_EXIT_STOPPED.load(Relaxed),
        frames_detected: FRAMES_DETECTED.load(Relaxed),
        fs_races: FS_RACES.load(Relaxed),
        noise_callbacks: NOISE_CALLBACKS.load(Relaxed),
        direct_samples: DIRECT_SAMPLES.load(Relaxed),
        reports_sent: REPORTS_SENT.load(Relaxed),
        delivery_failures: DELIVERY_FAILURES.load(Relaxed),
    }
}

#[inline]
pub fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// One host lifecycle callback. The host guarantees these never overlap.
#[derive(Debug, Clone)]
pub enum HostEvent {
    PreRender(JobSpec),
    /// Frame id as reported by the host, `None` when it cannot tell.
    PostFrame(Option<i64>),
    PostRender,
}

impl HostEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostEvent::PreRender(_) => "pre_render",
            HostEvent::PostFrame(_) => "post_frame",
            HostEvent::PostRender => "post_render",
        }
    }
}

/// Watcher lifecycle: `Stopped -> Running -> {Completed, Stalled, Stopped}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WatcherState {
    Stopped = 0,
    Running = 1,
    Completed = 2,
    Stalled = 3,
}

impl WatcherState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => WatcherState::Running,
            2 => WatcherState::Completed,
            3 => WatcherState::Stalled,
            _ => WatcherState::Stopped,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WatcherState::Stopped => "stopped",
            WatcherState::Running => "running",
            WatcherState::Completed => "completed",
            WatcherState::Stalled => "stalled",
        }
    }
}

/// Why a watcher loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatcherExit {
    /// Every expected frame file was observed.
    Completed,
    /// Frames remain but nothing resolved within the inactivity window.
    Stalled,
    /// Stop signal received (job end or a new job). No report from the watcher.
    Stopped,
}

impl WatcherExit {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatcherExit::Completed => "completed",
            WatcherExit::Stalled => "stalled",
            WatcherExit::Stopped => "stopped",
        }
    }

    /// Terminal exits that owe the job its final report.
    pub fn triggers_report(&self) -> bool {
        matches!(self, WatcherExit::Completed | WatcherExit::Stalled)
    }

    pub fn final_state(&self) -> WatcherState {
        match self {
            WatcherExit::Completed => WatcherState::Completed,
            WatcherExit::Stalled => WatcherState::Stalled,
            WatcherExit::Stopped => WatcherState::Stopped,
        }
    }

    pub fn counter(&self) -> &'static AtomicU64 {
        match self {
            WatcherExit::Completed => &WATCHER_EXIT_COMPLETED,
            WatcherExit::Stalled => &WATCHER_EXIT_STALLED,
            WatcherExit::Stopped => &WATCHER_EXIT_STOPPED,
        }
    }
}

impl fmt::Display for WatcherExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
