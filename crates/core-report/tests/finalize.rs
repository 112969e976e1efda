use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use core_config::ReportSettings;
use core_model::{JobMetadata, MonitorError};
use core_report::{
    FinalizeOutcome, JobReport, LogNotifier, Notifier, ReportFormat, WriterNotifier,
    finalize_and_report,
};
use core_state::{JobContext, Writer};
use pretty_assertions::assert_eq;
use tracing::subscriber::with_default;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn send(&self, message: &str) -> Result<(), MonitorError> {
        if self.fail {
            return Err(MonitorError::delivery("chat api returned 502"));
        }
        self.sent.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

fn t(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(50_000 + secs)
}

fn finished_job() -> Arc<JobContext> {
    let ctx = JobContext::new_at(2, JobMetadata::default(), t(0));
    ctx.record_sample(Writer::Tracker, 1, 4.0, 100, t(4)).unwrap();
    ctx.record_sample(Writer::Tracker, 2, 6.0, 100, t(10)).unwrap();
    ctx
}

#[test]
fn second_finalize_sends_nothing() {
    let ctx = finished_job();
    let notifier = RecordingNotifier::default();
    let settings = ReportSettings::default();

    assert_eq!(
        finalize_and_report(&ctx, &notifier, &settings, t(10)),
        FinalizeOutcome::Sent
    );
    assert_eq!(
        finalize_and_report(&ctx, &notifier, &settings, t(11)),
        FinalizeOutcome::AlreadyFinalized
    );
    assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    assert!(ctx.is_finalized());
}

#[test]
fn racing_finalizers_send_once() {
    let ctx = finished_job();
    let notifier = Arc::new(RecordingNotifier::default());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let notifier = Arc::clone(&notifier);
            thread::spawn(move || {
                finalize_and_report(&ctx, notifier.as_ref(), &ReportSettings::default(), t(10))
            })
        })
        .collect();
    let outcomes: Vec<FinalizeOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let sent = outcomes.iter().filter(|o| **o == FinalizeOutcome::Sent).count();
    assert_eq!(sent, 1);
    assert_eq!(notifier.sent.lock().unwrap().len(), 1);
}

#[test]
fn delivery_failure_is_swallowed_and_not_retried() {
    let ctx = finished_job();
    let notifier = RecordingNotifier {
        fail: true,
        ..RecordingNotifier::default()
    };
    let settings = ReportSettings::default();
    assert_eq!(
        finalize_and_report(&ctx, &notifier, &settings, t(10)),
        FinalizeOutcome::DeliveryFailed
    );
    assert_eq!(
        finalize_and_report(&ctx, &notifier, &settings, t(12)),
        FinalizeOutcome::AlreadyFinalized
    );
}

#[test]
fn writer_notifier_text_and_json() {
    let ctx = finished_job();
    let report = JobReport::build(ctx.id(), &ctx.snapshot(), &ReportSettings::default(), t(10));

    let text = WriterNotifier::new(Vec::new(), ReportFormat::Text);
    text.deliver(&report).unwrap();
    let out = String::from_utf8(text.into_inner()).unwrap();
    assert_eq!(out, format!("{}\n", report.render()));

    let json = WriterNotifier::new(Vec::new(), ReportFormat::Json);
    json.deliver(&report).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&json.into_inner()).unwrap();
    assert_eq!(value["frames"], 2);
    assert_eq!(value["total_bytes"], 200);
    assert_eq!(value["max"]["frame"], 2);
}

#[derive(Clone)]
struct BufferWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

struct LockedWriter<'a> {
    guard: MutexGuard<'a, Vec<u8>>,
}

impl Write for LockedWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for BufferWriter {
    type Writer = LockedWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LockedWriter {
            guard: self.inner.lock().expect("log buffer poisoned"),
        }
    }
}

#[test]
fn log_notifier_writes_report_event() {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_writer(BufferWriter { inner: buf.clone() })
        .with_ansi(false)
        .finish();

    let ctx = finished_job();
    let outcome = with_default(subscriber, || {
        finalize_and_report(&ctx, &LogNotifier, &ReportSettings::default(), t(10))
    });
    assert_eq!(outcome, FinalizeOutcome::Sent);

    let logs = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
    assert!(logs.contains("job_report"), "{logs}");
    assert!(logs.contains("report_sent"), "{logs}");
    assert!(logs.contains("Render finished!"), "{logs}");
}
