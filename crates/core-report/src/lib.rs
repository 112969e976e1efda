//! Final job report: build it once, hand it to a [`Notifier`].
//!
//! Either the file watcher (on completion or stall) or the direct job-end
//! path calls [`finalize_and_report`]; the per-job finalize guard makes sure
//! only the first caller sends anything.

mod notifier;
mod report;

pub use notifier::{LogNotifier, Notifier, ReportFormat, WriterNotifier};
pub use report::JobReport;

use std::time::SystemTime;

use core_config::ReportSettings;
use core_events::{DELIVERY_FAILURES, REPORTS_SENT, bump};
use core_state::JobContext;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Sent,
    /// Another path already finalized this job; nothing was sent.
    AlreadyFinalized,
    /// The notifier failed. Logged, not retried.
    DeliveryFailed,
}

impl FinalizeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalizeOutcome::Sent => "sent",
            FinalizeOutcome::AlreadyFinalized => "already_finalized",
            FinalizeOutcome::DeliveryFailed => "delivery_failed",
        }
    }
}

/// Build and deliver the job's final report, at most once per job.
pub fn finalize_and_report(
    ctx: &JobContext,
    notifier: &dyn Notifier,
    settings: &ReportSettings,
    now: SystemTime,
) -> FinalizeOutcome {
    if !ctx.try_begin_finalize() {
        debug!(target: "report", job = ctx.id(), "report_skipped_already_finalized");
        return FinalizeOutcome::AlreadyFinalized;
    }
    let report = JobReport::build(ctx.id(), &ctx.snapshot(), settings, now);
    if report.estimated {
        warn!(
            target: "report",
            job = ctx.id(),
            frames = report.frames,
            "report_frames_estimated"
        );
    }
    match notifier.deliver(&report) {
        Ok(()) => {
            bump(&REPORTS_SENT);
            info!(
                target: "report",
                job = ctx.id(),
                notifier = notifier.name(),
                frames = report.frames,
                elapsed_secs = report.elapsed_secs,
                "report_sent"
            );
            FinalizeOutcome::Sent
        }
        Err(e) => {
            bump(&DELIVERY_FAILURES);
            warn!(
                target: "report",
                job = ctx.id(),
                notifier = notifier.name(),
                error = %e,
                "report_delivery_failed"
            );
            FinalizeOutcome::DeliveryFailed
        }
    }
}
