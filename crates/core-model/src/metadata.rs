//! Best-effort scene metadata captured at job start.
//!
//! Lookups happen in the host integration; this module only stores the
//! results and renders missing values. Helpers for cleaning raw host values
//! (renderer identifiers, camera prim paths) live here as pure functions so
//! every integration normalizes them the same way.

use serde::{Deserialize, Serialize};

use crate::MonitorError;

/// Placeholder rendered for any field the host could not provide.
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct JobMetadata {
    pub scene_file: Option<String>,
    /// Render node path or any label identifying the job.
    pub job_label: Option<String>,
    pub hostname: Option<String>,
    /// Renderer identifier as the host reports it (`BRAY_HdKarmaXPU`, `Mantra`).
    pub engine: Option<String>,
    /// Render node type name, used to name the engine when `engine` is missing.
    pub node_type: Option<String>,
    pub camera: Option<String>,
    pub lights: Vec<String>,
    pub resolution: Option<String>,
    /// Output path, possibly containing a `$F` frame placeholder.
    pub output_template: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    SceneFile,
    JobLabel,
    Hostname,
    Engine,
    Camera,
    Resolution,
    OutputTemplate,
}

impl MetadataField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataField::SceneFile => "scene_file",
            MetadataField::JobLabel => "job_label",
            MetadataField::Hostname => "hostname",
            MetadataField::Engine => "engine",
            MetadataField::Camera => "camera",
            MetadataField::Resolution => "resolution",
            MetadataField::OutputTemplate => "output_template",
        }
    }
}

impl JobMetadata {
    fn slot(&self, field: MetadataField) -> Option<&str> {
        let value = match field {
            MetadataField::SceneFile => &self.scene_file,
            MetadataField::JobLabel => &self.job_label,
            MetadataField::Hostname => &self.hostname,
            MetadataField::Engine => &self.engine,
            MetadataField::Camera => &self.camera,
            MetadataField::Resolution => &self.resolution,
            MetadataField::OutputTemplate => &self.output_template,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Field value, or `MetadataUnavailable` when missing or blank.
    pub fn require(&self, field: MetadataField) -> Result<&str, MonitorError> {
        self.slot(field).ok_or(MonitorError::MetadataUnavailable {
            field: field.as_str(),
        })
    }

    /// Field value for display, [`UNKNOWN`] when missing or blank.
    pub fn display(&self, field: MetadataField) -> &str {
        self.slot(field).unwrap_or(UNKNOWN)
    }

    /// Product name of the render engine, from the renderer identifier or,
    /// failing that, the render node type.
    pub fn engine_name(&self) -> Option<String> {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|v| !v.trim().is_empty())
        }
        present(&self.engine)
            .map(engine_from_renderer)
            .or_else(|| present(&self.node_type).map(engine_from_node_type))
    }
}

/// Clean a renderer identifier such as `BRAY_HdKarmaXPU`.
pub fn engine_from_renderer(raw: &str) -> String {
    if raw.contains("KarmaXPU") {
        "Karma XPU".to_string()
    } else if raw.contains("KarmaCPU") {
        "Karma CPU".to_string()
    } else {
        raw.to_string()
    }
}

/// Map a render node type name to a product name, falling back to the type name.
pub fn engine_from_node_type(type_name: &str) -> String {
    const KNOWN: [(&str, &str); 5] = [
        ("mantra", "Mantra"),
        ("redshift", "Redshift"),
        ("vray", "V-Ray"),
        ("arnold", "Arnold"),
        ("karma", "Karma"),
    ];
    let lower = type_name.to_ascii_lowercase();
    KNOWN
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| type_name.to_string())
}

/// Last component of a camera prim/node path (`/cameras/shot_cam` -> `shot_cam`).
pub fn camera_short_name(path: &str) -> &str {
    path.rsplit('/').find(|s| !s.is_empty()).unwrap_or(path)
}

/// First `max` light names joined by `, `, with `...` when truncated.
pub fn lights_summary(lights: &[String], max: usize) -> String {
    if lights.is_empty() {
        return "none found".to_string();
    }
    let shown = lights.iter().take(max).cloned().collect::<Vec<_>>().join(", ");
    if lights.len() > max {
        format!("{shown}...")
    } else {
        shown
    }
}
