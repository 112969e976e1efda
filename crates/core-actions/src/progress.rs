use std::time::SystemTime;

use core_state::StatsSnapshot;
use core_text::format_clock;

/// Progress line data after a directly recorded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub frame: i64,
    pub done: u64,
    pub total: u64,
    pub elapsed_secs: f64,
    pub remaining_secs: f64,
    pub average_secs: f64,
}

impl Progress {
    pub fn from_snapshot(frame: i64, snap: &StatsSnapshot, now: SystemTime) -> Self {
        Self {
            frame,
            done: snap.frames_completed,
            total: snap.total_frames,
            elapsed_secs: snap.elapsed_at(now),
            remaining_secs: snap.estimate_remaining_at(now),
            average_secs: snap.average_frame_secs_at(now),
        }
    }

    /// `Frame 3/10 done. Elapsed: 0:00:12. Remaining: 0:00:28 (4.0 sec/frame)`
    pub fn message(&self) -> String {
        format!(
            "Frame {}/{} done. Elapsed: {}. Remaining: {} ({:.1} sec/frame)",
            self.done,
            self.total,
            format_clock(self.elapsed_secs),
            format_clock(self.remaining_secs),
            self.average_secs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::JobMetadata;
    use core_state::RenderJobStats;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn message_matches_status_bar_format() {
        let t0 = UNIX_EPOCH + Duration::from_secs(1_000);
        let mut stats = RenderJobStats::new(10, JobMetadata::default(), t0);
        for frame in 1..=3 {
            stats.record_sample(frame, 4.0, 0, t0 + Duration::from_secs(4 * frame as u64));
        }
        let progress = Progress::from_snapshot(3, &stats.snapshot(), t0 + Duration::from_secs(12));
        assert_eq!(progress.done, 3);
        assert_eq!(progress.total, 10);
        assert_eq!(
            progress.message(),
            "Frame 3/10 done. Elapsed: 0:00:12. Remaining: 0:00:28 (4.0 sec/frame)"
        );
    }
}
