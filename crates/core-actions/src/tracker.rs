use std::fs;
use std::time::SystemTime;

use core_config::TrackerSettings;
use core_events::{DIRECT_SAMPLES, NOISE_CALLBACKS, WATCHER_LAZY_STARTS, bump};
use core_model::{MetadataField, MonitorError};
use core_state::{JobContext, StateError, Writer};
use core_watch::resolve_frame_path;
use tracing::{debug, info};

use crate::Progress;

/// The tracker's view of the job's file watcher slot.
pub trait WatcherControl {
    fn is_running(&self) -> bool;
    /// Start a watcher for the current job. Fails when the output path cannot
    /// be resolved or a watcher already owns the job.
    fn try_start(&mut self) -> Result<(), MonitorError>;
}

/// What a single post-frame callback did.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameAction {
    /// A watcher drives the job (or took over); only timestamps were touched.
    Ignored,
    /// The callback arrived too fast to be real and a watcher took over.
    WatcherStarted,
    Recorded(Progress),
}

impl FrameAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameAction::Ignored => "ignored",
            FrameAction::WatcherStarted => "watcher_started",
            FrameAction::Recorded(_) => "recorded",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameEventTracker {
    settings: TrackerSettings,
}

impl FrameEventTracker {
    pub fn new(settings: TrackerSettings) -> Self {
        Self { settings }
    }

    /// Handle one post-frame callback. `frame` is the host's frame id; when the
    /// host cannot tell, the next ordinal (`frames_completed + 1`) is used.
    pub fn on_frame(
        &self,
        ctx: &JobContext,
        frame: Option<i64>,
        now: SystemTime,
        control: &mut dyn WatcherControl,
    ) -> FrameAction {
        if control.is_running() {
            ctx.touch(now);
            bump(&NOISE_CALLBACKS);
            debug!(target: "tracker", job = ctx.id(), ?frame, "callback_ignored");
            return FrameAction::Ignored;
        }

        let duration = ctx.since_last_sample(now);
        if duration < self.settings.fast_callback.as_secs_f64() {
            match control.try_start() {
                Ok(()) => {
                    ctx.touch(now);
                    bump(&WATCHER_LAZY_STARTS);
                    info!(
                        target: "tracker",
                        job = ctx.id(),
                        callback_secs = duration,
                        "batched_mode_detected"
                    );
                    return FrameAction::WatcherStarted;
                }
                Err(e) => {
                    debug!(target: "tracker", job = ctx.id(), error = %e, "lazy_start_failed");
                }
            }
        }

        let frame = frame.unwrap_or_else(|| ctx.frames_completed() as i64 + 1);
        let bytes = output_size(ctx, frame);
        match ctx.record_sample(Writer::Tracker, frame, duration, bytes, now) {
            Ok(_) => {
                bump(&DIRECT_SAMPLES);
                let progress = Progress::from_snapshot(frame, &ctx.snapshot(), now);
                debug!(
                    target: "tracker",
                    job = ctx.id(),
                    frame,
                    duration_secs = duration,
                    bytes,
                    "frame_recorded"
                );
                FrameAction::Recorded(progress)
            }
            Err(e @ StateError::NotWriter { .. }) => {
                ctx.touch(now);
                debug!(target: "tracker", job = ctx.id(), frame, error = %e, "callback_ignored");
                FrameAction::Ignored
            }
            Err(e) => {
                debug!(target: "tracker", job = ctx.id(), frame, error = %e, "record_failed");
                FrameAction::Ignored
            }
        }
    }
}

/// Size of the frame's output file, zero when unknown or not written yet.
fn output_size(ctx: &JobContext, frame: i64) -> u64 {
    let metadata = ctx.metadata();
    let Ok(template) = metadata.require(MetadataField::OutputTemplate) else {
        return 0;
    };
    fs::metadata(resolve_frame_path(template, frame))
        .map(|m| m.len())
        .unwrap_or(0)
}
