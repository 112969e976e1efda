//! `framewatch`: follow a render that writes frames out of process and
//! report when it ends.
//!
//! The job file describes the render the same way a host would at
//! pre-render time. The job always runs in batched mode: the file watcher
//! is the only source of progress.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use core_events::telemetry_snapshot;
use core_model::{JobSpec, MetadataField};
use core_plugin::{JobEndOutcome, RenderMonitor};
use core_report::{FinalizeOutcome, ReportFormat, WriterNotifier};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

const LOG_FILE_NAME: &str = "framewatch.log";
// Granularity of the unbounded wait; also how often progress is logged.
const WAIT_SLICE: Duration = Duration::from_secs(5);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "framewatch", version, about = "Render progress monitor")]
struct Args {
    /// Job description (TOML): frame range, output path and metadata.
    pub job: PathBuf,
    /// Optional configuration file path (overrides discovery of `framewatch.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Print the final report as JSON instead of text.
    #[arg(long)]
    pub json: bool,
    /// Give up waiting after this many seconds and report what was seen so far.
    #[arg(long = "max-wait-secs")]
    pub max_wait_secs: Option<u64>,
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(".");
    let log_path = log_dir.join(LOG_FILE_NAME);
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .with_ansi(false)
        .try_init()
    {
        Ok(()) => Some(guard),
        // Global tracing subscriber already installed; drop guard so writer shuts down.
        Err(_) => None,
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn load_job(path: &Path) -> Result<JobSpec> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading job file {}", path.display()))?;
    let spec: JobSpec =
        toml::from_str(&text).with_context(|| format!("parsing job file {}", path.display()))?;
    let template = spec
        .metadata
        .require(MetadataField::OutputTemplate)
        .context("job file has no metadata.output_template")?;
    core_watch::build_watch_set(template, &spec.range)
        .with_context(|| format!("job file {}", path.display()))?;
    Ok(spec.batched(true))
}

/// Host name from the environment unless the job file names one.
fn fill_hostname(mut spec: JobSpec, env: impl Fn(&str) -> Option<String>) -> JobSpec {
    if spec.metadata.hostname.is_none() {
        spec.metadata.hostname = env("HOSTNAME").or_else(|| env("COMPUTERNAME"));
    }
    spec
}

fn wait(monitor: &mut RenderMonitor, max_wait: Option<Duration>) -> bool {
    match max_wait {
        Some(limit) => monitor.wait_for_watcher(limit),
        None => loop {
            if monitor.wait_for_watcher(WAIT_SLICE) {
                break true;
            }
            if let Some(ctx) = monitor.context() {
                info!(
                    target: "monitor",
                    job = ctx.id(),
                    frames_completed = ctx.frames_completed(),
                    "still_waiting"
                );
            }
        },
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging();
    install_panic_hook();

    let config = core_config::load_from(args.config.clone())?;
    let spec = fill_hostname(load_job(&args.job)?, |key| std::env::var(key).ok());
    let format = if args.json {
        ReportFormat::Json
    } else {
        ReportFormat::Text
    };
    let notifier = Arc::new(WriterNotifier::new(std::io::stdout(), format));

    let mut monitor = RenderMonitor::new(&config, notifier);
    monitor.pre_render(spec);
    let finished = wait(&mut monitor, args.max_wait_secs.map(Duration::from_secs));
    let outcome = if finished {
        monitor.post_render()
    } else {
        monitor.finish_now()
    };
    monitor.shutdown();

    let telemetry = telemetry_snapshot();
    info!(
        target: "monitor",
        ?outcome,
        frames_detected = telemetry.frames_detected,
        reports_sent = telemetry.reports_sent,
        fs_races = telemetry.fs_races,
        "framewatch_exit"
    );

    // A stall or completion was already reported by the watcher thread, but only
    // telemetry can tell whether that delivery succeeded.
    match outcome {
        JobEndOutcome::Finalized(FinalizeOutcome::DeliveryFailed) => {
            bail!("failed to write the report")
        }
        _ if telemetry.delivery_failures > 0 => bail!("failed to write the report"),
        _ => Ok(()),
    }
}
