use std::io::Write;
use std::sync::{Mutex, PoisonError};

use core_model::MonitorError;
use tracing::info;

use crate::JobReport;

/// Delivery channel for the final report (chat bot, mail, stdout ...).
///
/// Implementations must not retry; a failed send is reported once and the
/// job moves on.
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn send(&self, message: &str) -> Result<(), MonitorError>;

    /// Deliver a whole report. Text channels get [`JobReport::render`].
    fn deliver(&self, report: &JobReport) -> Result<(), MonitorError> {
        self.send(&report.render())
    }
}

/// Writes the report into the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    fn send(&self, message: &str) -> Result<(), MonitorError> {
        info!(target: "report", %message, "job_report");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Writes reports to any `io::Write` (stdout for the CLI).
#[derive(Debug)]
pub struct WriterNotifier<W> {
    out: Mutex<W>,
    format: ReportFormat,
}

impl<W: Write + Send> WriterNotifier<W> {
    pub fn new(out: W, format: ReportFormat) -> Self {
        Self {
            out: Mutex::new(out),
            format,
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> Notifier for WriterNotifier<W> {
    fn name(&self) -> &'static str {
        "writer"
    }

    fn send(&self, message: &str) -> Result<(), MonitorError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{message}")
            .and_then(|()| out.flush())
            .map_err(|e| MonitorError::delivery(e.to_string()))
    }

    fn deliver(&self, report: &JobReport) -> Result<(), MonitorError> {
        match self.format {
            ReportFormat::Text => self.send(&report.render()),
            ReportFormat::Json => {
                let json = serde_json::to_string_pretty(report)
                    .map_err(|e| MonitorError::delivery(e.to_string()))?;
                self.send(&json)
            }
        }
    }
}
