use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use core_model::JobMetadata;
use thiserror::Error;
use tracing::debug;

use crate::{RenderJobStats, StatsSnapshot, secs_between};

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Which path is authoritative for sample writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Writer {
    /// Per-frame host callbacks record samples directly.
    Tracker = 0,
    /// The file watcher records samples from observed output files.
    Watcher = 1,
}

impl Writer {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Writer::Watcher,
            _ => Writer::Tracker,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Writer::Tracker => "tracker",
            Writer::Watcher => "watcher",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("{attempted:?} may not write samples while {owner:?} owns the job")]
    NotWriter { attempted: Writer, owner: Writer },
    #[error("a file watcher already owns this job")]
    WatcherAlreadyActive,
}

/// One render job: its statistics, the writer token and the finalize guard.
///
/// Shared as `Arc<JobContext>` between the host callback path and the
/// watcher thread.
#[derive(Debug)]
pub struct JobContext {
    id: u64,
    stats: Mutex<RenderJobStats>,
    writer: AtomicU8,
    finalized: AtomicBool,
}

impl JobContext {
    /// Start a job now. Equivalent to a registry reset.
    pub fn new(total_frames: u64, metadata: JobMetadata) -> Arc<Self> {
        Self::new_at(total_frames, metadata, SystemTime::now())
    }

    pub fn new_at(total_frames: u64, metadata: JobMetadata, now: SystemTime) -> Arc<Self> {
        let id = NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed);
        debug!(target: "state", job = id, total_frames, "job_context_created");
        Arc::new(Self {
            id,
            stats: Mutex::new(RenderJobStats::new(total_frames, metadata, now)),
            writer: AtomicU8::new(Writer::Tracker as u8),
            finalized: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, RenderJobStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn writer(&self) -> Writer {
        Writer::from_u8(self.writer.load(Ordering::Acquire))
    }

    /// Hand the writer token to the watcher. Fails when a watcher already holds it,
    /// which caps the job at one watcher. The token is never handed back.
    pub fn claim_for_watcher(&self) -> Result<(), StateError> {
        self.writer
            .compare_exchange(
                Writer::Tracker as u8,
                Writer::Watcher as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| debug!(target: "state", job = self.id, "writer_claimed_by_watcher"))
            .map_err(|_| StateError::WatcherAlreadyActive)
    }

    /// Give the token back after a watcher failed to spawn. A watcher that ran
    /// keeps the token for the rest of the job.
    pub fn revert_watcher_claim(&self) {
        self.writer.store(Writer::Tracker as u8, Ordering::Release);
        debug!(target: "state", job = self.id, "writer_claim_reverted");
    }

    /// Append a sample on behalf of `writer`. Returns the new completed count.
    pub fn record_sample(
        &self,
        writer: Writer,
        frame: i64,
        duration_secs: f64,
        bytes_written: u64,
        now: SystemTime,
    ) -> Result<u64, StateError> {
        let mut stats = self.lock();
        let owner = self.writer();
        if owner != writer {
            return Err(StateError::NotWriter {
                attempted: writer,
                owner,
            });
        }
        stats.record_sample(frame, duration_secs, bytes_written, now);
        Ok(stats.frames_completed())
    }

    /// Update `last_sample_time` without counting anything.
    pub fn touch(&self, now: SystemTime) {
        self.lock().touch(now);
    }

    /// Seconds since the last accepted sample or touch.
    pub fn since_last_sample(&self, now: SystemTime) -> f64 {
        secs_between(self.lock().last_sample_time(), now)
    }

    pub fn start_time(&self) -> SystemTime {
        self.lock().start_time()
    }

    pub fn frames_completed(&self) -> u64 {
        self.lock().frames_completed()
    }

    pub fn metadata(&self) -> JobMetadata {
        self.lock().metadata().clone()
    }

    pub fn estimate_remaining(&self) -> f64 {
        self.lock().estimate_remaining()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.lock().snapshot()
    }

    /// `true` exactly once per job: the caller that wins sends the report.
    pub fn try_begin_finalize(&self) -> bool {
        self.finalized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn ctx(total: u64) -> Arc<JobContext> {
        JobContext::new_at(total, JobMetadata::default(), SystemTime::UNIX_EPOCH)
    }

    #[test]
    fn tracker_owns_new_jobs() {
        let job = ctx(3);
        assert_eq!(job.writer(), Writer::Tracker);
        let n = job
            .record_sample(Writer::Tracker, 1, 1.0, 0, SystemTime::UNIX_EPOCH)
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn watcher_claim_blocks_tracker_writes() {
        let job = ctx(3);
        job.claim_for_watcher().unwrap();
        let err = job
            .record_sample(Writer::Tracker, 1, 1.0, 0, SystemTime::UNIX_EPOCH)
            .unwrap_err();
        assert_eq!(
            err,
            StateError::NotWriter {
                attempted: Writer::Tracker,
                owner: Writer::Watcher
            }
        );
        assert_eq!(job.frames_completed(), 0);
    }

    #[test]
    fn second_watcher_claim_is_refused() {
        let job = ctx(3);
        assert!(job.claim_for_watcher().is_ok());
        assert_eq!(job.claim_for_watcher(), Err(StateError::WatcherAlreadyActive));
    }

    #[test]
    fn reverted_claim_restores_tracker() {
        let job = ctx(3);
        job.claim_for_watcher().unwrap();
        job.revert_watcher_claim();
        assert_eq!(job.writer(), Writer::Tracker);
        assert!(job.claim_for_watcher().is_ok());
    }

    #[test]
    fn finalize_guard_wins_once_across_threads() {
        let job = ctx(1);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let job = Arc::clone(&job);
                thread::spawn(move || job.try_begin_finalize())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(job.is_finalized());
    }

    #[test]
    fn since_last_sample_tracks_touch() {
        let job = ctx(2);
        let later = SystemTime::UNIX_EPOCH + Duration::from_secs(4);
        assert_eq!(job.since_last_sample(later), 4.0);
        job.touch(later);
        assert_eq!(job.since_last_sample(later), 0.0);
    }

    #[test]
    fn job_ids_are_unique() {
        assert_ne!(ctx(1).id(), ctx(1).id());
    }
}
