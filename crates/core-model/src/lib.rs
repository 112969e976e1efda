//! Value types shared by every stage of the render monitor.
//!
//! A job is described once at pre-render time by a [`JobSpec`]: the frame
//! range, best-effort scene metadata and the batched-mode hint. Completed
//! frames are recorded as immutable [`FrameSample`]s. Failures that cross
//! crate boundaries use the [`MonitorError`] taxonomy.

mod error;
mod frame;
mod metadata;

pub use error::MonitorError;
pub use frame::{FrameRange, FrameSample};
pub use metadata::{
    JobMetadata, MetadataField, UNKNOWN, camera_short_name, engine_from_node_type,
    engine_from_renderer, lights_summary,
};

use serde::Deserialize;

/// Everything the host tells us about a job when it starts.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct JobSpec {
    pub range: FrameRange,
    #[serde(default)]
    pub metadata: JobMetadata,
    /// Host hint that frames are produced out of band (single-process /
    /// batched rendering). Only used to start the file watcher eagerly.
    #[serde(default)]
    pub batched: bool,
}

impl JobSpec {
    pub fn new(range: FrameRange, metadata: JobMetadata) -> Self {
        Self {
            range,
            metadata,
            batched: false,
        }
    }

    pub fn batched(mut self, batched: bool) -> Self {
        self.batched = batched;
        self
    }
}
