use serde::{Deserialize, Serialize};

/// Inclusive frame range with a step, as entered on the render node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct FrameRange {
    pub start: i64,
    pub end: i64,
    #[serde(default = "FrameRange::default_step")]
    pub step: i64,
}

impl Default for FrameRange {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

impl FrameRange {
    const fn default_step() -> i64 {
        1
    }

    pub const fn new(start: i64, end: i64, step: i64) -> Self {
        Self { start, end, step }
    }

    /// Step clamped to at least one so a zero or negative step never divides by zero.
    pub fn effective_step(&self) -> i64 {
        self.step.max(1)
    }

    /// `floor((end - start) / step) + 1`, never negative.
    pub fn total_frames(&self) -> u64 {
        let count = (self.end - self.start).div_euclid(self.effective_step()) + 1;
        count.max(0) as u64
    }

    /// Frame ids the host is expected to render, ascending.
    pub fn frames(&self) -> impl Iterator<Item = i64> + use<> {
        let step = self.effective_step() as usize;
        (self.start..=self.end).step_by(step)
    }
}

/// One completed frame and its wall-clock cost in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameSample {
    pub frame: i64,
    pub duration_secs: f64,
}

impl FrameSample {
    pub const fn new(frame: i64, duration_secs: f64) -> Self {
        Self {
            frame,
            duration_secs,
        }
    }
}
