//! Filesystem side of the monitor: output path templates and the
//! background watcher that turns rendered frame files into samples.

pub mod path;
pub mod watcher;

pub use path::{build_watch_set, expand_frame_tokens, has_frame_placeholder, resolve_frame_path};
pub use watcher::{FileWatcher, FinishCallback, WatcherHandle};
