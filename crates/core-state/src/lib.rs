//! Per-job statistics registry and its ownership rules.
//!
//! Two writers compete for a job: the per-frame callback path (tracker) and
//! the background file watcher. Instead of guessing from "is the watcher
//! alive", every job gets its own [`JobContext`] carrying an explicit writer
//! token. Only the token owner may append samples, so
//! `frames_completed == frame_samples.len()` holds no matter which path
//! drives the job. A new job always gets a fresh context; a watcher that
//! outlives its job can only write into the discarded one.

mod context;
mod stats;

pub use context::{JobContext, StateError, Writer};
pub use stats::{RenderJobStats, StatsSnapshot, secs_between};
