use std::fmt::Write as _;
use std::time::SystemTime;

use core_config::ReportSettings;
use core_model::{FrameSample, MetadataField, UNKNOWN, camera_short_name, lights_summary};
use core_state::StatsSnapshot;
use core_text::{format_clock, format_duration, format_size};
use serde::Serialize;

const NOT_AVAILABLE: &str = "N/A";

/// Everything the final notification says about a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub job_id: u64,
    pub scene_file: String,
    pub job_label: String,
    pub hostname: String,
    pub engine: String,
    pub camera: String,
    pub lights: String,
    pub resolution: String,
    pub output: String,
    pub frames: u64,
    pub total_frames: u64,
    pub elapsed_secs: f64,
    pub average_secs: f64,
    pub min: Option<FrameSample>,
    pub max: Option<FrameSample>,
    pub total_bytes: u64,
    /// `frames` and `average_secs` are assumed, not measured: nothing was
    /// recorded although the job ran past the grace period.
    pub estimated: bool,
}

impl JobReport {
    pub fn build(
        job_id: u64,
        snap: &StatsSnapshot,
        settings: &ReportSettings,
        now: SystemTime,
    ) -> Self {
        let meta = &snap.metadata;
        let elapsed = snap.elapsed_at(now);

        // Known inaccuracy: batched jobs whose frames were never observed
        // report the whole target range as done.
        let estimated = snap.frames_completed == 0
            && snap.total_frames > 0
            && elapsed > settings.grace_period.as_secs_f64();
        let frames = if estimated {
            snap.total_frames
        } else {
            snap.frames_completed
        };
        let average_secs = if frames > 0 {
            elapsed / frames as f64
        } else {
            0.0
        };

        let camera = meta
            .camera
            .as_deref()
            .map(camera_short_name)
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(UNKNOWN);

        Self {
            job_id,
            scene_file: meta.display(MetadataField::SceneFile).to_string(),
            job_label: meta.display(MetadataField::JobLabel).to_string(),
            hostname: meta.display(MetadataField::Hostname).to_string(),
            engine: meta.engine_name().unwrap_or_else(|| UNKNOWN.to_string()),
            camera: camera.to_string(),
            lights: lights_summary(&meta.lights, settings.max_lights),
            resolution: meta.display(MetadataField::Resolution).to_string(),
            output: meta.display(MetadataField::OutputTemplate).to_string(),
            frames,
            total_frames: snap.total_frames,
            elapsed_secs: elapsed,
            average_secs,
            min: snap.min_sample(),
            max: snap.max_sample(),
            total_bytes: snap.total_bytes_written,
            estimated,
        }
    }

    /// Multi-line notification text.
    pub fn render(&self) -> String {
        let mark = if self.estimated { " (estimated)" } else { "" };
        let mut out = String::from("Render finished!\n\n");
        // Writing into a String cannot fail.
        let _ = writeln!(out, "Scene: {}", self.scene_file);
        let _ = writeln!(out, "Job: {}", self.job_label);
        let _ = writeln!(out, "Host: {}", self.hostname);
        let _ = writeln!(out, "Engine: {}", self.engine);
        let _ = writeln!(out, "Camera: {}", self.camera);
        let _ = writeln!(out, "Lights: {}", self.lights);
        let _ = writeln!(out, "Resolution: {}", self.resolution);
        let _ = writeln!(out, "Output: {}", self.output);
        out.push_str("\nStatistics:\n");
        let _ = writeln!(out, "- Frames: {}/{}{mark}", self.frames, self.total_frames);
        let _ = writeln!(out, "- Total time: {}", format_clock(self.elapsed_secs));
        let _ = writeln!(
            out,
            "- Average per frame: {}{mark}",
            format_duration(self.average_secs)
        );
        let _ = writeln!(out, "- Min time: {}", sample_text(self.min));
        let _ = writeln!(out, "- Max time: {}", sample_text(self.max));
        let _ = write!(out, "- Output size: {}", format_size(self.total_bytes));
        out
    }
}

fn sample_text(sample: Option<FrameSample>) -> String {
    match sample {
        Some(s) => format!("{} (f{})", format_duration(s.duration_secs), s.frame),
        None => NOT_AVAILABLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::JobMetadata;
    use core_state::RenderJobStats;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, UNIX_EPOCH};

    fn t(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(10_000 + secs)
    }

    fn metadata() -> JobMetadata {
        JobMetadata {
            scene_file: Some("shot_010.hip".into()),
            job_label: Some("/out/karma1".into()),
            hostname: Some("render-07".into()),
            engine: Some("BRAY_HdKarmaXPU".into()),
            node_type: Some("usdrender_rop".into()),
            camera: Some("/stage/cameras/shot_cam".into()),
            lights: ["key", "fill", "rim", "bounce", "sky", "practical"]
                .map(String::from)
                .to_vec(),
            resolution: Some("1920x1080".into()),
            output_template: Some("/renders/shot_010.$F4.exr".into()),
        }
    }

    #[test]
    fn measured_report_text() {
        let mut stats = RenderJobStats::new(4, metadata(), t(0));
        stats.record_sample(1, 30.0, 512 * 1024, t(30));
        stats.record_sample(2, 25.5, 512 * 1024, t(56));
        stats.record_sample(3, 64.0, 1024 * 1024, t(120));
        let report = JobReport::build(7, &stats.snapshot(), &ReportSettings::default(), t(120));

        assert!(!report.estimated);
        assert_eq!(report.frames, 3);
        assert_eq!(report.average_secs, 40.0);
        assert_eq!(
            report.render(),
            "Render finished!\n\
             \n\
             Scene: shot_010.hip\n\
             Job: /out/karma1\n\
             Host: render-07\n\
             Engine: Karma XPU\n\
             Camera: shot_cam\n\
             Lights: key, fill, rim, bounce, sky...\n\
             Resolution: 1920x1080\n\
             Output: /renders/shot_010.$F4.exr\n\
             \n\
             Statistics:\n\
             - Frames: 3/4\n\
             - Total time: 0:02:00\n\
             - Average per frame: 40.0 sec\n\
             - Min time: 25.5 sec (f2)\n\
             - Max time: 1 min 4 sec (f3)\n\
             - Output size: 2.00 MB"
        );
    }

    #[test]
    fn empty_job_inside_grace_period_reports_nothing_done() {
        let stats = RenderJobStats::new(10, JobMetadata::default(), t(0));
        let report = JobReport::build(1, &stats.snapshot(), &ReportSettings::default(), t(3));
        assert!(!report.estimated);
        assert_eq!(report.frames, 0);
        assert_eq!(report.average_secs, 0.0);
        assert_eq!(report.camera, UNKNOWN);
        assert_eq!(report.lights, "none found");
    }

    #[test]
    fn degraded_fallback_is_flagged() {
        let stats = RenderJobStats::new(10, JobMetadata::default(), t(0));
        let report = JobReport::build(1, &stats.snapshot(), &ReportSettings::default(), t(100));
        assert!(report.estimated);
        assert_eq!(report.frames, 10);
        assert_eq!(report.average_secs, 10.0);
        assert_eq!(report.min, None);
        let text = report.render();
        assert!(text.contains("- Frames: 10/10 (estimated)"), "{text}");
        assert!(text.contains("- Average per frame: 10.0 sec (estimated)"), "{text}");
        assert!(text.contains("- Min time: N/A"), "{text}");
    }

    #[test]
    fn zero_target_never_estimates() {
        let stats = RenderJobStats::new(0, JobMetadata::default(), t(0));
        let report = JobReport::build(1, &stats.snapshot(), &ReportSettings::default(), t(100));
        assert!(!report.estimated);
        assert_eq!(report.frames, 0);
    }

    #[test]
    fn serializes_to_json() {
        let mut stats = RenderJobStats::new(2, JobMetadata::default(), t(0));
        stats.record_sample(1, 2.0, 10, t(2));
        let report = JobReport::build(3, &stats.snapshot(), &ReportSettings::default(), t(2));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["frames"], 1);
        assert_eq!(value["min"]["frame"], 1);
        assert_eq!(value["engine"], "unknown");
        assert_eq!(value["estimated"], false);
    }
}
