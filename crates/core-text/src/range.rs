//! Compact frame-range rendering (`1-3, 5-7, 10`).

/// Collapse frame ids into comma separated runs.
///
/// Input order does not matter and duplicates are collapsed. Consecutive ids
/// become `start-end`, isolated ids stand alone. An empty slice yields an
/// empty string.
pub fn format_frame_range(frames: &[i64]) -> String {
    let mut sorted = frames.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut runs: Vec<(i64, i64)> = Vec::new();
    for frame in sorted {
        match runs.last_mut() {
            Some((_, end)) if frame == *end + 1 => *end = frame,
            _ => runs.push((frame, frame)),
        }
    }

    runs
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
