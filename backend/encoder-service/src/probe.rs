//! Media probe
//!
//! Reads width, height, and container duration from the source file with two
//! ffprobe invocations in CSV output mode.

use crate::error::{EncoderError, Result};
use crate::tool::{path_arg, run_tool};
use std::path::Path;
use video_core::VideoInfo;

/// Probe a local video file.
pub async fn probe_video(input: &Path) -> Result<VideoInfo> {
    let dimensions_out = run_tool(
        "ffprobe",
        &[
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            "-show_entries".to_string(),
            "stream=width,height".to_string(),
            "-of".to_string(),
            "csv=p=0".to_string(),
            path_arg(input),
        ],
    )
    .await
    .map_err(EncoderError::Probe)?;

    let (width, height) = parse_dimensions(&String::from_utf8_lossy(&dimensions_out))
        .map_err(EncoderError::Probe)?;

    let duration_out = run_tool(
        "ffprobe",
        &[
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "csv=p=0".to_string(),
            path_arg(input),
        ],
    )
    .await
    .map_err(EncoderError::Probe)?;

    let duration_seconds =
        parse_duration(&String::from_utf8_lossy(&duration_out)).map_err(EncoderError::Probe)?;

    Ok(VideoInfo {
        width,
        height,
        duration_seconds,
    })
}

/// Parse `1920,1080` (ffprobe emits a trailing comma on some builds).
fn parse_dimensions(raw: &str) -> std::result::Result<(u32, u32), String> {
    let trimmed = raw.trim().trim_end_matches(',');
    let parts: Vec<&str> = trimmed.split(',').collect();
    if parts.len() != 2 {
        return Err(format!("unexpected ffprobe output: {trimmed:?}"));
    }

    let width = parts[0]
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid width {:?}: {e}", parts[0]))?;
    let height = parts[1]
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid height {:?}: {e}", parts[1]))?;

    Ok((width, height))
}

fn parse_duration(raw: &str) -> std::result::Result<f64, String> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid duration {:?}: {e}", raw.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimensions() {
        assert_eq!(parse_dimensions("1920,1080\n").unwrap(), (1920, 1080));
        assert_eq!(parse_dimensions("1280,720,").unwrap(), (1280, 720));
    }

    #[test]
    fn test_parse_dimensions_rejects_non_video() {
        assert!(parse_dimensions("").is_err());
        assert!(parse_dimensions("1920").is_err());
        assert!(parse_dimensions("w,h").is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("60.031000\n").unwrap(), 60.031);
        assert!(parse_duration("N/A").is_err());
    }
}
