use std::time::SystemTime;

use core_model::{FrameSample, JobMetadata};

/// Seconds between two wall-clock instants, zero when `later` is earlier.
pub fn secs_between(earlier: SystemTime, later: SystemTime) -> f64 {
    later
        .duration_since(earlier)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Read-only copy of a job's progress, used for progress lines and reports.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub start_time: SystemTime,
    pub last_sample_time: SystemTime,
    pub frames_completed: u64,
    pub total_frames: u64,
    pub frame_samples: Vec<FrameSample>,
    pub total_bytes_written: u64,
    pub metadata: JobMetadata,
}

impl StatsSnapshot {
    pub fn elapsed_at(&self, now: SystemTime) -> f64 {
        secs_between(self.start_time, now)
    }

    /// Wall time since job start divided by completed frames; zero before the first frame.
    pub fn average_frame_secs_at(&self, now: SystemTime) -> f64 {
        if self.frames_completed == 0 {
            return 0.0;
        }
        self.elapsed_at(now) / self.frames_completed as f64
    }

    pub fn remaining_frames(&self) -> u64 {
        self.total_frames.saturating_sub(self.frames_completed)
    }

    /// `average * max(0, total - completed)`, zero before the first frame.
    pub fn estimate_remaining_at(&self, now: SystemTime) -> f64 {
        self.average_frame_secs_at(now) * self.remaining_frames() as f64
    }

    /// Fastest sample; ties keep the earliest recorded.
    pub fn min_sample(&self) -> Option<FrameSample> {
        self.frame_samples
            .iter()
            .copied()
            .reduce(|best, s| if s.duration_secs < best.duration_secs { s } else { best })
    }

    /// Slowest sample; ties keep the earliest recorded.
    pub fn max_sample(&self) -> Option<FrameSample> {
        self.frame_samples
            .iter()
            .copied()
            .reduce(|best, s| if s.duration_secs > best.duration_secs { s } else { best })
    }
}

/// Mutable statistics of the current render job.
///
/// `record_sample` is the only way to advance `frames_completed`, which keeps
/// the counter and the sample list in lockstep.
#[derive(Debug, Clone)]
pub struct RenderJobStats {
    data: StatsSnapshot,
}

impl RenderJobStats {
    pub fn new(total_frames: u64, metadata: JobMetadata, now: SystemTime) -> Self {
        Self {
            data: StatsSnapshot {
                start_time: now,
                last_sample_time: now,
                frames_completed: 0,
                total_frames,
                frame_samples: Vec::new(),
                total_bytes_written: 0,
                metadata,
            },
        }
    }

    /// Append a sample. Ordering and duplicates are the caller's business.
    pub fn record_sample(
        &mut self,
        frame: i64,
        duration_secs: f64,
        bytes_written: u64,
        now: SystemTime,
    ) {
        let d = &mut self.data;
        d.frame_samples.push(FrameSample::new(frame, duration_secs));
        d.frames_completed += 1;
        d.total_bytes_written = d.total_bytes_written.saturating_add(bytes_written);
        d.last_sample_time = now;
    }

    /// Timestamp bookkeeping only; nothing is counted.
    pub fn touch(&mut self, now: SystemTime) {
        self.data.last_sample_time = now;
    }

    pub fn start_time(&self) -> SystemTime {
        self.data.start_time
    }

    pub fn last_sample_time(&self) -> SystemTime {
        self.data.last_sample_time
    }

    pub fn frames_completed(&self) -> u64 {
        self.data.frames_completed
    }

    pub fn total_frames(&self) -> u64 {
        self.data.total_frames
    }

    pub fn total_bytes_written(&self) -> u64 {
        self.data.total_bytes_written
    }

    pub fn frame_samples(&self) -> &[FrameSample] {
        &self.data.frame_samples
    }

    pub fn metadata(&self) -> &JobMetadata {
        &self.data.metadata
    }

    pub fn estimate_remaining_at(&self, now: SystemTime) -> f64 {
        self.data.estimate_remaining_at(now)
    }

    pub fn estimate_remaining(&self) -> f64 {
        self.estimate_remaining_at(SystemTime::now())
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.data.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(base: SystemTime, secs: u64) -> SystemTime {
        base + Duration::from_secs(secs)
    }

    #[test]
    fn fresh_job_has_no_estimate() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let stats = RenderJobStats::new(10, JobMetadata::default(), t0);
        assert_eq!(stats.frames_completed(), 0);
        assert_eq!(stats.estimate_remaining_at(at(t0, 50)), 0.0);
    }

    #[test]
    fn record_sample_keeps_counter_and_samples_in_step() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let mut stats = RenderJobStats::new(4, JobMetadata::default(), t0);
        stats.record_sample(3, 2.0, 100, at(t0, 2));
        stats.record_sample(1, 4.0, 50, at(t0, 6));
        stats.record_sample(1, 4.0, 0, at(t0, 10));
        assert_eq!(stats.frames_completed(), 3);
        assert_eq!(stats.frame_samples().len(), 3);
        assert_eq!(stats.total_bytes_written(), 150);
        assert_eq!(stats.last_sample_time(), at(t0, 10));
    }

    #[test]
    fn estimate_uses_wall_clock_average() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let mut stats = RenderJobStats::new(10, JobMetadata::default(), t0);
        stats.record_sample(1, 5.0, 0, at(t0, 5));
        stats.record_sample(2, 5.0, 0, at(t0, 10));
        // 10s for 2 frames -> 5s/frame, 8 frames left.
        assert_eq!(stats.estimate_remaining_at(at(t0, 10)), 40.0);
    }

    #[test]
    fn overshoot_never_goes_negative() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let mut stats = RenderJobStats::new(1, JobMetadata::default(), t0);
        stats.record_sample(1, 1.0, 0, at(t0, 1));
        stats.record_sample(2, 1.0, 0, at(t0, 2));
        assert_eq!(stats.snapshot().remaining_frames(), 0);
        assert_eq!(stats.estimate_remaining_at(at(t0, 2)), 0.0);
    }

    #[test]
    fn touch_moves_only_the_timestamp() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let mut stats = RenderJobStats::new(3, JobMetadata::default(), t0);
        stats.touch(at(t0, 7));
        assert_eq!(stats.last_sample_time(), at(t0, 7));
        assert_eq!(stats.frames_completed(), 0);
        assert!(stats.frame_samples().is_empty());
    }

    #[test]
    fn min_and_max_pick_first_on_ties() {
        let t0 = SystemTime::UNIX_EPOCH;
        let mut stats = RenderJobStats::new(4, JobMetadata::default(), t0);
        stats.record_sample(5, 3.0, 0, t0);
        stats.record_sample(6, 1.0, 0, t0);
        stats.record_sample(7, 1.0, 0, t0);
        stats.record_sample(8, 3.0, 0, t0);
        let snap = stats.snapshot();
        assert_eq!(snap.min_sample().map(|s| s.frame), Some(6));
        assert_eq!(snap.max_sample().map(|s| s.frame), Some(5));
    }

    #[test]
    fn secs_between_never_negative() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        assert_eq!(secs_between(t0, t0 - Duration::from_secs(5)), 0.0);
        assert_eq!(secs_between(t0, t0 + Duration::from_millis(1500)), 1.5);
    }
}
