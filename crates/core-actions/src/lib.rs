//! Per-frame callback handling.
//!
//! The host fires a post-frame callback after every frame, but in batched
//! modes those callbacks arrive in a burst before any frame exists on disk.
//! [`FrameEventTracker`] decides per callback whether it is real progress
//! (record it), a sign of batching (hand the job to the file watcher) or
//! noise while a watcher already drives the job.

mod progress;
mod tracker;

pub use progress::Progress;
pub use tracker::{FrameAction, FrameEventTracker, WatcherControl};
