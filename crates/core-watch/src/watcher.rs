//! Background file watcher.
//!
//! Batched render modes fire every per-frame callback in a tight loop long
//! before the frames hit the disk, so callback timing says nothing about
//! progress. The watcher instead polls the expected output files and
//! records a sample when a file shows up, timed by file modification times.
//! A file counts once its size and mtime are unchanged across two polls, so
//! a frame still being written is not sampled at a partial size.
//!
//! Lifecycle: `Stopped -> Running -> {Completed, Stalled, Stopped}`.
//! - Completed: every expected file was seen; the finish callback runs.
//! - Stalled: nothing new for the inactivity window; the finish callback runs.
//! - Stopped: stop signal; the finish callback does not run.
//!
//! The loop sleeps in `crossbeam_channel::select!` on the stop channel, an
//! optional filesystem wake-up channel fed by `notify`, and the poll
//! interval. Filesystem events only shorten the wait; the poll check is
//! authoritative, so network shares without event support still work.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use core_config::WatcherSettings;
use core_events::{FRAMES_DETECTED, FS_RACES, WATCHERS_STARTED, WatcherExit, WatcherState, bump};
use core_model::MonitorError;
use core_state::{JobContext, Writer, secs_between};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, never, select};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, trace, warn};

/// Runs on the watcher thread once, for `Completed` or `Stalled` exits only.
pub type FinishCallback = Box<dyn FnOnce(WatcherExit) + Send + 'static>;

/// Control handle for a running watcher thread.
#[derive(Debug)]
pub struct WatcherHandle {
    job_id: u64,
    state: Arc<AtomicU8>,
    stop_tx: Sender<()>,
    done_rx: Receiver<WatcherExit>,
    thread: Option<JoinHandle<()>>,
    exit: Option<WatcherExit>,
}

impl WatcherHandle {
    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    pub fn state(&self) -> WatcherState {
        WatcherState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `true` until the loop has exited and any report it owed was handed off.
    pub fn is_running(&self) -> bool {
        self.state() == WatcherState::Running
    }

    /// Advisory stop; the loop notices within one poll interval at worst.
    pub fn stop(&self) {
        // Capacity one: a second stop while the first is still queued is redundant.
        let _ = self.stop_tx.try_send(());
    }

    /// Wait up to `timeout` for the loop to end. Returns the exit reason, or
    /// `None` when the thread is still busy after the timeout.
    pub fn join_timeout(&mut self, timeout: Duration) -> Option<WatcherExit> {
        if self.exit.is_none() {
            let exit = match self.done_rx.recv_timeout(timeout) {
                Ok(exit) => exit,
                Err(RecvTimeoutError::Timeout) => return None,
                // Sender dropped without a message: the thread panicked.
                Err(RecvTimeoutError::Disconnected) => WatcherExit::Stopped,
            };
            self.exit = Some(exit);
            if let Some(thread) = self.thread.take() {
                if thread.join().is_err() {
                    warn!(target: "watcher", job = self.job_id, "watcher_thread_panicked");
                }
            }
        }
        self.exit
    }

}

/// Publishes the loop's exit when the thread ends, unwinding included, so the
/// handle never reads `Running` for a dead thread.
struct ExitPublisher {
    job_id: u64,
    state: Arc<AtomicU8>,
    done_tx: Sender<WatcherExit>,
    exit: WatcherExit,
}

impl Drop for ExitPublisher {
    fn drop(&mut self) {
        if thread::panicking() {
            warn!(target: "watcher", job = self.job_id, exit = self.exit.as_str(), "watcher_unwinding");
        }
        self.state.store(self.exit.final_state() as u8, Ordering::Release);
        let _ = self.done_tx.send(self.exit);
    }
}

/// Starts watcher threads.
pub struct FileWatcher;

impl FileWatcher {
    /// Start watching `watch_set` (frame id -> expected file) for `ctx`.
    ///
    /// Takes the job's writer token, so the tracker stops recording and a
    /// second watcher for the same job is refused. Returns immediately.
    pub fn start(
        ctx: Arc<JobContext>,
        watch_set: BTreeMap<i64, PathBuf>,
        settings: WatcherSettings,
        on_finish: FinishCallback,
    ) -> Result<WatcherHandle, MonitorError> {
        if watch_set.is_empty() {
            return Err(MonitorError::unresolvable("no frames to watch"));
        }
        ctx.claim_for_watcher()
            .map_err(|_| MonitorError::WatcherAlreadyRunning { job: ctx.id() })?;

        let job_id = ctx.id();
        let state = Arc::new(AtomicU8::new(WatcherState::Running as u8));
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<WatcherExit>(1);
        let pending = watch_set.len();

        let thread_state = Arc::clone(&state);
        let thread_ctx = Arc::clone(&ctx);
        let spawned = thread::Builder::new()
            .name(format!("framewatch-watcher-{job_id}"))
            .spawn(move || {
                // Until the loop returns, any unwind is reported as a stop.
                let mut publisher = ExitPublisher {
                    job_id,
                    state: thread_state,
                    done_tx,
                    exit: WatcherExit::Stopped,
                };
                let exit = WatchLoop::new(thread_ctx, watch_set, settings, stop_rx).run();
                publisher.exit = exit;
                bump(exit.counter());
                if exit.triggers_report() {
                    on_finish(exit);
                }
            });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                ctx.revert_watcher_claim();
                return Err(MonitorError::WatcherSpawn(e));
            }
        };

        bump(&WATCHERS_STARTED);
        info!(
            target: "watcher",
            job = job_id,
            pending,
            poll_ms = settings.poll_interval.as_millis() as u64,
            inactivity_secs = settings.inactivity_timeout.as_secs(),
            "watcher_started"
        );
        Ok(WatcherHandle {
            job_id,
            state,
            stop_tx,
            done_rx,
            thread: Some(thread),
            exit: None,
        })
    }
}

/// Result of checking one expected output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    mtime: SystemTime,
    size: u64,
}

/// `Ok(None)` for a missing or stale file; `Err` when the file is there but
/// cannot be read consistently (retried next cycle).
fn probe(path: &Path, not_before: SystemTime) -> Result<Option<FileStamp>, MonitorError> {
    let race = |source: std::io::Error| MonitorError::FileSystemRace {
        path: path.to_path_buf(),
        source,
    };
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(race(e)),
    };
    if !meta.is_file() {
        return Ok(None);
    }
    let mtime = meta.modified().map_err(race)?;
    if mtime < not_before {
        return Ok(None);
    }
    Ok(Some(FileStamp {
        mtime,
        size: meta.len(),
    }))
}

struct WatchLoop {
    ctx: Arc<JobContext>,
    pending: BTreeMap<i64, PathBuf>,
    // Last stamp seen for files that are not accepted yet.
    settling: BTreeMap<i64, FileStamp>,
    settings: WatcherSettings,
    stop_rx: Receiver<()>,
    wake_rx: Receiver<()>,
    // Keeps OS watches registered for the loop's lifetime.
    _fs_watcher: Option<RecommendedWatcher>,
    not_before: SystemTime,
    last_completion: SystemTime,
    last_activity: Instant,
}

impl WatchLoop {
    fn new(
        ctx: Arc<JobContext>,
        pending: BTreeMap<i64, PathBuf>,
        settings: WatcherSettings,
        stop_rx: Receiver<()>,
    ) -> Self {
        let job_start = ctx.start_time();
        let not_before = job_start
            .checked_sub(settings.stale_margin)
            .unwrap_or(UNIX_EPOCH);
        let (fs_watcher, wake_rx) = if settings.use_fs_events {
            match fs_wakeups(ctx.id(), &pending) {
                Some((watcher, rx)) => (Some(watcher), rx),
                None => (None, never()),
            }
        } else {
            (None, never())
        };
        Self {
            ctx,
            pending,
            settling: BTreeMap::new(),
            settings,
            stop_rx,
            wake_rx,
            _fs_watcher: fs_watcher,
            not_before,
            last_completion: job_start,
            last_activity: Instant::now(),
        }
    }

    fn run(mut self) -> WatcherExit {
        let exit = loop {
            self.poll_once();
            if self.pending.is_empty() {
                break WatcherExit::Completed;
            }
            if self.last_activity.elapsed() >= self.settings.inactivity_timeout {
                break WatcherExit::Stalled;
            }
            let stop_requested = select! {
                // A dropped handle counts as a stop request.
                recv(self.stop_rx) -> _ => true,
                recv(self.wake_rx) -> _ => {
                    while self.wake_rx.try_recv().is_ok() {}
                    trace!(target: "watcher", job = self.ctx.id(), "fs_wakeup");
                    false
                }
                default(self.settings.poll_interval) => false,
            };
            if stop_requested {
                break WatcherExit::Stopped;
            }
        };
        let remaining: Vec<i64> = self.pending.keys().copied().collect();
        info!(
            target: "watcher",
            job = self.ctx.id(),
            exit = exit.as_str(),
            frames_completed = self.ctx.frames_completed(),
            pending = remaining.len(),
            missing = %core_text::format_frame_range(&remaining),
            "watcher_exit"
        );
        exit
    }

    /// One pass over the pending set. A file is ready when it shows the same
    /// stamp as on the previous pass; a new or changed stamp counts as activity.
    /// Ready files are recorded in modification order so durations stay
    /// non-negative.
    fn poll_once(&mut self) {
        let mut ready: Vec<(FileStamp, i64)> = Vec::new();
        for (&frame, path) in &self.pending {
            match probe(path, self.not_before) {
                Ok(Some(stamp)) => {
                    if self.settling.get(&frame) == Some(&stamp) {
                        ready.push((stamp, frame));
                    } else {
                        trace!(target: "watcher", job = self.ctx.id(), frame, bytes = stamp.size, "frame_settling");
                        self.settling.insert(frame, stamp);
                        self.last_activity = Instant::now();
                    }
                }
                Ok(None) => {
                    self.settling.remove(&frame);
                }
                Err(e) => {
                    bump(&FS_RACES);
                    debug!(target: "watcher", job = self.ctx.id(), frame, error = %e, "fs_race");
                }
            }
        }
        ready.sort_by(|a, b| a.0.mtime.cmp(&b.0.mtime).then(a.1.cmp(&b.1)));

        for (stamp, frame) in ready {
            self.pending.remove(&frame);
            self.settling.remove(&frame);
            let duration = secs_between(self.last_completion, stamp.mtime);
            self.last_completion = self.last_completion.max(stamp.mtime);
            self.last_activity = Instant::now();
            bump(&FRAMES_DETECTED);
            match self.ctx.record_sample(
                Writer::Watcher,
                frame,
                duration,
                stamp.size,
                SystemTime::now(),
            ) {
                Ok(done) => info!(
                    target: "watcher",
                    job = self.ctx.id(),
                    frame,
                    duration_secs = duration,
                    bytes = stamp.size,
                    frames_completed = done,
                    pending = self.pending.len(),
                    "frame_detected"
                ),
                Err(e) => warn!(target: "watcher", job = self.ctx.id(), frame, error = %e, "sample_rejected"),
            }
        }
    }
}

/// Register OS change notifications on every output directory. `None` when
/// nothing could be watched (missing directories, unsupported platform).
fn fs_wakeups(
    job_id: u64,
    pending: &BTreeMap<i64, PathBuf>,
) -> Option<(RecommendedWatcher, Receiver<()>)> {
    let dirs: BTreeSet<PathBuf> = pending
        .values()
        .map(|p| match p.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        })
        .collect();

    let (wake_tx, wake_rx) = bounded::<()>(1);
    let mut watcher = match notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if res.is_ok() {
            let _ = wake_tx.try_send(());
        }
    }) {
        Ok(watcher) => watcher,
        Err(e) => {
            debug!(target: "watcher", job = job_id, error = %e, "fs_events_unavailable");
            return None;
        }
    };

    let mut watched = 0usize;
    for dir in &dirs {
        match watcher.watch(dir, RecursiveMode::NonRecursive) {
            Ok(()) => watched += 1,
            Err(e) => {
                debug!(target: "watcher", job = job_id, dir = %dir.display(), error = %e, "fs_watch_failed")
            }
        }
    }
    if watched == 0 {
        return None;
    }
    debug!(target: "watcher", job = job_id, dirs = watched, "fs_events_enabled");
    Some((watcher, wake_rx))
}
