//! Host-facing render monitor.
//!
//! The host calls three hooks per job: [`RenderMonitor::pre_render`],
//! [`RenderMonitor::post_frame`] after every frame and
//! [`RenderMonitor::post_render`] at the end. None of them returns an error
//! or panics into the host; failures degrade to a log line and a fallback
//! mode.
//!
//! Each job gets a fresh [`JobContext`]. The monitor owns at most one
//! [`WatcherHandle`], started eagerly for batched jobs or lazily when the
//! tracker sees implausibly fast callbacks. Whoever ends the job (the watcher
//! on completion/stall, or the job-end hook) reports through the same
//! finalize guard, so a job is reported at most once.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use core_actions::{FrameAction, FrameEventTracker, WatcherControl};
use core_config::{Config, ReportSettings, WatcherSettings};
use core_events::{HostEvent, WatcherState};
use core_model::{FrameRange, JobSpec, MetadataField, MonitorError};
use core_report::{FinalizeOutcome, Notifier, finalize_and_report};
use core_state::JobContext;
use core_watch::{FileWatcher, FinishCallback, WatcherHandle, build_watch_set};
use tracing::{debug, info, trace, warn};

/// Host status bar or any other place for one-line progress text.
pub trait StatusSink: Send + Sync {
    fn set_status(&self, text: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatusSink;

impl StatusSink for NoopStatusSink {
    fn set_status(&self, _text: &str) {}
}

/// What the job-end hook did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEndOutcome {
    /// No job was started.
    NoJob,
    /// A watcher is still running and will report when it ends.
    Deferred,
    Finalized(FinalizeOutcome),
}

/// Starts watchers wired to report through the job's finalize guard.
struct Launcher {
    watcher: WatcherSettings,
    report: ReportSettings,
    notifier: Arc<dyn Notifier>,
}

impl Launcher {
    fn start(&self, ctx: &Arc<JobContext>, range: &FrameRange) -> Result<WatcherHandle, MonitorError> {
        let metadata = ctx.metadata();
        let template = metadata
            .require(MetadataField::OutputTemplate)
            .map_err(|_| MonitorError::unresolvable("job has no output path"))?;
        let watch_set = build_watch_set(template, range)?;

        let job = Arc::clone(ctx);
        let notifier = Arc::clone(&self.notifier);
        let report = self.report;
        let on_finish: FinishCallback = Box::new(move |exit| {
            let outcome = finalize_and_report(&job, notifier.as_ref(), &report, SystemTime::now());
            info!(
                target: "monitor",
                job = job.id(),
                exit = exit.as_str(),
                outcome = outcome.as_str(),
                "watcher_finalized"
            );
        });
        FileWatcher::start(Arc::clone(ctx), watch_set, self.watcher, on_finish)
    }
}

/// Tracker access to the current job's watcher slot.
struct WatcherSlot<'a> {
    launcher: &'a Launcher,
    ctx: &'a Arc<JobContext>,
    range: FrameRange,
    handle: &'a mut Option<WatcherHandle>,
}

impl WatcherControl for WatcherSlot<'_> {
    fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(WatcherHandle::is_running)
    }

    fn try_start(&mut self) -> Result<(), MonitorError> {
        if self.handle.is_some() {
            return Err(MonitorError::WatcherAlreadyRunning { job: self.ctx.id() });
        }
        *self.handle = Some(self.launcher.start(self.ctx, &self.range)?);
        Ok(())
    }
}

struct ActiveJob {
    ctx: Arc<JobContext>,
    range: FrameRange,
    watcher: Option<WatcherHandle>,
}

pub struct RenderMonitor {
    launcher: Launcher,
    tracker: FrameEventTracker,
    status: Arc<dyn StatusSink>,
    job: Option<ActiveJob>,
}

impl RenderMonitor {
    pub fn new(config: &Config, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            launcher: Launcher {
                watcher: config.watcher(),
                report: config.report(),
                notifier,
            },
            tracker: FrameEventTracker::new(config.tracker()),
            status: Arc::new(NoopStatusSink),
            job: None,
        }
    }

    pub fn with_status_sink(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    /// Context of the current job, if one was started.
    pub fn context(&self) -> Option<Arc<JobContext>> {
        self.job.as_ref().map(|job| Arc::clone(&job.ctx))
    }

    pub fn watcher_state(&self) -> Option<WatcherState> {
        self.job
            .as_ref()
            .and_then(|job| job.watcher.as_ref())
            .map(WatcherHandle::state)
    }

    /// Dispatch one host callback.
    pub fn handle(&mut self, event: HostEvent) {
        trace!(target: "monitor", event = event.as_str(), "host_event");
        match event {
            HostEvent::PreRender(spec) => self.pre_render(spec),
            HostEvent::PostFrame(frame) => {
                self.post_frame(frame);
            }
            HostEvent::PostRender => {
                self.post_render();
            }
        }
    }

    /// Job start: retire the previous job's watcher, then begin a fresh context.
    pub fn pre_render(&mut self, spec: JobSpec) {
        self.retire_watcher("new_job");
        if let Some(old) = self.job.take() {
            if !old.ctx.is_finalized() {
                debug!(target: "monitor", job = old.ctx.id(), "job_replaced_unreported");
            }
        }

        let total = spec.range.total_frames();
        let ctx = JobContext::new(total, spec.metadata);
        info!(
            target: "monitor",
            job = ctx.id(),
            total_frames = total,
            batched = spec.batched,
            "job_started"
        );
        self.status
            .set_status(&format!("Render started. Frames: {total}"));

        let mut watcher = None;
        if spec.batched {
            match self.launcher.start(&ctx, &spec.range) {
                Ok(handle) => watcher = Some(handle),
                Err(e) => {
                    warn!(target: "monitor", job = ctx.id(), error = %e, "eager_watcher_failed");
                }
            }
        }
        self.job = Some(ActiveJob {
            ctx,
            range: spec.range,
            watcher,
        });
    }

    /// Per-frame hook. `None` before the first job start.
    pub fn post_frame(&mut self, frame: Option<i64>) -> Option<FrameAction> {
        let Some(job) = self.job.as_mut() else {
            debug!(target: "monitor", "post_frame_without_job");
            return None;
        };
        let mut slot = WatcherSlot {
            launcher: &self.launcher,
            ctx: &job.ctx,
            range: job.range,
            handle: &mut job.watcher,
        };
        let action = self
            .tracker
            .on_frame(&job.ctx, frame, SystemTime::now(), &mut slot);
        if let FrameAction::Recorded(progress) = &action {
            let message = progress.message();
            info!(target: "monitor", job = job.ctx.id(), frame = progress.frame, %message, "progress");
            self.status.set_status(&message);
        }
        Some(action)
    }

    /// Job-end hook. Defers to a running watcher, otherwise reports now.
    pub fn post_render(&mut self) -> JobEndOutcome {
        let Some(job) = self.job.as_ref() else {
            return JobEndOutcome::NoJob;
        };
        if job.watcher.as_ref().is_some_and(WatcherHandle::is_running) {
            info!(target: "monitor", job = job.ctx.id(), "report_deferred_to_watcher");
            return JobEndOutcome::Deferred;
        }
        self.finalize_current()
    }

    /// Stop any watcher and report right away. The caller takes over the
    /// report the stopped watcher would have sent.
    pub fn finish_now(&mut self) -> JobEndOutcome {
        self.retire_watcher("finish_now");
        self.finalize_current()
    }

    /// Wait for the current watcher to end. `true` when no watcher is left running.
    pub fn wait_for_watcher(&mut self, timeout: Duration) -> bool {
        match self.job.as_mut().and_then(|job| job.watcher.as_mut()) {
            Some(handle) => handle.join_timeout(timeout).is_some(),
            None => true,
        }
    }

    /// Stop and join the watcher (bounded). Called on drop as well.
    ///
    /// A job whose report was left to a watcher that is stopped here gets
    /// its report now.
    pub fn shutdown(&mut self) -> Option<FinalizeOutcome> {
        if !self.retire_watcher("shutdown") {
            return None;
        }
        match self.finalize_current() {
            JobEndOutcome::Finalized(outcome) => Some(outcome),
            JobEndOutcome::NoJob | JobEndOutcome::Deferred => None,
        }
    }

    fn finalize_current(&self) -> JobEndOutcome {
        let Some(job) = self.job.as_ref() else {
            return JobEndOutcome::NoJob;
        };
        let outcome = finalize_and_report(
            &job.ctx,
            self.launcher.notifier.as_ref(),
            &self.launcher.report,
            SystemTime::now(),
        );
        JobEndOutcome::Finalized(outcome)
    }

    /// Returns `true` when the stopped watcher was still running, i.e. it
    /// will not send the job's report.
    fn retire_watcher(&mut self, reason: &'static str) -> bool {
        let Some(job) = self.job.as_mut() else {
            return false;
        };
        let Some(mut handle) = job.watcher.take() else {
            return false;
        };
        let was_running = handle.is_running();
        handle.stop();
        match handle.join_timeout(self.launcher.watcher.join_timeout) {
            Some(exit) => {
                debug!(target: "monitor", job = handle.job_id(), reason, exit = exit.as_str(), "watcher_retired");
            }
            // The thread only holds this job's context, which is being discarded.
            None => warn!(target: "monitor", job = handle.job_id(), reason, "watcher_join_timeout"),
        }
        was_running
    }
}

impl Drop for RenderMonitor {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
