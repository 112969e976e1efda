//! Output path templates.
//!
//! Render nodes store a single output path with a frame placeholder, for
//! example `render/beauty.$F4.exr`. Supported tokens:
//! - `$F` / `${F}`: the frame number without padding;
//! - `$F<n>` / `${F<n>}`: the frame number zero padded to `n` digits.
//!
//! `$F` directly followed by a letter or underscore (`$FF`, `$FPS`,
//! `$FSTART`) names a different host variable and is left untouched.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::LazyLock;

use core_model::{FrameRange, MonitorError};
use regex::Regex;

const MAX_PAD_WIDTH: usize = 32;

static FRAME_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{F(\d*)\}|\$F(\d*)").expect("frame token pattern is valid"));

/// Byte span of each frame token in `template` with its padding width.
fn frame_tokens(template: &str) -> impl Iterator<Item = (Range<usize>, usize)> + '_ {
    FRAME_TOKEN.captures_iter(template).filter_map(move |caps| {
        let whole = caps.get(0)?;
        let (digits, braced) = match (caps.get(1), caps.get(2)) {
            (Some(d), _) => (d.as_str(), true),
            (None, Some(d)) => (d.as_str(), false),
            (None, None) => return None,
        };
        let continues_identifier = template[whole.end()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !braced && digits.is_empty() && continues_identifier {
            return None;
        }
        let width = digits.parse::<usize>().unwrap_or(0).min(MAX_PAD_WIDTH);
        Some((whole.range(), width))
    })
}

fn pad_frame(frame: i64, width: usize) -> String {
    if frame < 0 {
        format!("-{:0width$}", frame.unsigned_abs())
    } else {
        format!("{frame:0width$}")
    }
}

/// Substitute every frame token in `template` with `frame`.
pub fn expand_frame_tokens(template: &str, frame: i64) -> String {
    let mut out = String::with_capacity(template.len() + 8);
    let mut last = 0;
    for (span, width) in frame_tokens(template) {
        out.push_str(&template[last..span.start]);
        out.push_str(&pad_frame(frame, width));
        last = span.end;
    }
    out.push_str(&template[last..]);
    out
}

/// Concrete output file for `frame`. Pure; no filesystem access.
pub fn resolve_frame_path(template: &str, frame: i64) -> PathBuf {
    PathBuf::from(expand_frame_tokens(template, frame))
}

pub fn has_frame_placeholder(template: &str) -> bool {
    frame_tokens(template).next().is_some()
}

/// Expected output file for every frame of `range`.
///
/// Fails when the template is blank, or when a multi-frame job has no frame
/// token (every frame would map to the same file).
pub fn build_watch_set(
    template: &str,
    range: &FrameRange,
) -> Result<BTreeMap<i64, PathBuf>, MonitorError> {
    if template.trim().is_empty() {
        return Err(MonitorError::unresolvable("output path is empty"));
    }
    if range.total_frames() > 1 && !has_frame_placeholder(template) {
        return Err(MonitorError::unresolvable(format!(
            "output path `{template}` has no frame placeholder"
        )));
    }
    let set: BTreeMap<i64, PathBuf> = range
        .frames()
        .map(|frame| (frame, resolve_frame_path(template, frame)))
        .collect();
    if set.is_empty() {
        return Err(MonitorError::unresolvable("frame range is empty"));
    }
    Ok(set)
}
