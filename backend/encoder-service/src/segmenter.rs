//! Even-duration segmentation of the source file
//!
//! Stream-copy split, so this stage is I/O bound; the expensive work happens
//! in the encode stage on the pieces produced here.

use crate::error::{EncoderError, Result};
use crate::tool::{path_arg, run_tool};
use std::path::Path;
use tracing::debug;
use video_core::constants::{MAX_SEGMENTS, MIN_SEGMENT_DURATION_SECS};
use video_core::{Segment, VideoInfo};

/// Segment count and per-segment duration for a source of `duration` seconds.
///
/// Short inputs collapse to a single segment; long inputs are capped so one
/// job never fans out into more parallel work than the encoder pool handles.
pub fn plan_segments(duration: f64) -> (u32, f64) {
    let count = (duration / MIN_SEGMENT_DURATION_SECS).ceil().max(1.0);
    let count = (count as u32).min(MAX_SEGMENTS);
    let segment_duration = (duration / count as f64).ceil();
    (count, segment_duration)
}

/// Split `input` into `segment_NNN.mp4` files under `segment_dir`.
pub async fn split_video(
    input: &Path,
    segment_dir: &Path,
    info: &VideoInfo,
) -> Result<Vec<Segment>> {
    tokio::fs::create_dir_all(segment_dir).await?;

    let (count, segment_duration) = plan_segments(info.duration_seconds);
    debug!(
        count,
        segment_duration, "splitting source into even segments"
    );

    run_tool(
        "ffmpeg",
        &[
            "-i".to_string(),
            path_arg(input),
            "-c".to_string(),
            "copy".to_string(),
            "-f".to_string(),
            "segment".to_string(),
            "-segment_time".to_string(),
            format!("{:.0}", segment_duration),
            "-reset_timestamps".to_string(),
            "1".to_string(),
            "-segment_format_options".to_string(),
            "movflags=+faststart".to_string(),
            path_arg(&segment_dir.join("segment_%03d.mp4")),
        ],
    )
    .await
    .map_err(EncoderError::Segmentation)?;

    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(segment_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("segment_") && name.ends_with(".mp4") {
            names.push(name);
        }
    }
    if names.is_empty() {
        return Err(EncoderError::Segmentation(
            "no segments were produced".to_string(),
        ));
    }
    // segment_%03d names sort into index order
    names.sort();

    let segments = names
        .into_iter()
        .enumerate()
        .map(|(index, name)| {
            let remaining = info.duration_seconds - segment_duration * index as f64;
            Segment {
                index,
                local_path: segment_dir.join(name),
                duration: remaining.min(segment_duration).max(0.0),
            }
        })
        .collect();

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_even_minute() {
        // 60 s: four 15 s segments
        assert_eq!(plan_segments(60.0), (4, 15.0));
    }

    #[test]
    fn test_plan_short_video_single_segment() {
        // 12 s: one segment covering the whole input
        assert_eq!(plan_segments(12.0), (1, 12.0));
    }

    #[test]
    fn test_plan_caps_segment_count() {
        let (count, segment_duration) = plan_segments(1000.0);
        assert_eq!(count, 8);
        assert_eq!(segment_duration, 125.0);
    }

    #[test]
    fn test_plan_rounds_duration_up() {
        // 100 s over 7 segments: ceil(14.28) = 15 s each
        assert_eq!(plan_segments(100.0), (7, 15.0));
    }

    #[test]
    fn test_plan_zero_duration_still_yields_one_segment() {
        let (count, _) = plan_segments(0.0);
        assert_eq!(count, 1);
    }
}
