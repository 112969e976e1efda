//! Human-readable formatting for render statistics.
//!
//! Everything here is pure: durations, wall-clock style elapsed times, frame
//! id ranges and byte totals. Report and progress text in the other crates is
//! assembled from these helpers only, so the exact wording lives in one place.

pub mod duration;
pub mod range;
pub mod size;

pub use duration::{format_clock, format_duration};
pub use range::format_frame_range;
pub use size::format_size;
