//! Stitch, fragment, and package for adaptive streaming
//!
//! Encoded segments are concatenated in index order (stream copy), converted
//! to a fragmented MP4, and handed to the packager, which emits the
//! DASH/HLS tree the uploader ships to object storage.

use crate::error::{EncoderError, Result};
use crate::tool::{path_arg, run_tool};
use std::path::{Path, PathBuf};
use tracing::debug;
use video_core::PlaybackFormat;

/// Fragment duration handed to the fragmenter (milliseconds)
const FRAGMENT_DURATION_MS: u32 = 4000;
/// Track timescale for fragmented output
const FRAGMENT_TIMESCALE: u32 = 1000;

/// Concat-demuxer manifest: one `file '<absolute path>'` line per segment,
/// in the order given. Index order in, index order out.
pub fn write_concat_manifest(encoded: &[PathBuf]) -> String {
    let mut manifest = String::new();
    for path in encoded {
        manifest.push_str(&format!("file '{}'\n", path.display()));
    }
    manifest
}

/// Concatenate encoded segments into `stitched.mp4` under `packaging_dir`.
pub async fn stitch_segments(encoded: &[PathBuf], packaging_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(packaging_dir).await?;

    let list_path = packaging_dir.join("concat_list.txt");
    tokio::fs::write(&list_path, write_concat_manifest(encoded)).await?;

    let stitched = packaging_dir.join("stitched.mp4");
    run_tool(
        "ffmpeg",
        &[
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            path_arg(&list_path),
            "-c".to_string(),
            "copy".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-y".to_string(),
            path_arg(&stitched),
        ],
    )
    .await
    .map_err(EncoderError::Stitch)?;

    debug!(segments = encoded.len(), "stitched encoded segments");
    Ok(stitched)
}

/// Convert the stitched file into a fragmented MP4 the packager accepts.
pub async fn fragment_video(stitched: &Path, packaging_dir: &Path) -> Result<PathBuf> {
    let fragmented = packaging_dir.join("fragmented.mp4");

    run_tool(
        "mp4fragment",
        &[
            "--fragment-duration".to_string(),
            FRAGMENT_DURATION_MS.to_string(),
            "--timescale".to_string(),
            FRAGMENT_TIMESCALE.to_string(),
            path_arg(stitched),
            path_arg(&fragmented),
        ],
    )
    .await
    .map_err(EncoderError::Fragment)?;

    Ok(fragmented)
}

/// Produce the adaptive streaming tree under `output_dir`.
///
/// The packager always writes the DASH manifest; `--hls` adds the HLS
/// playlist alongside when requested.
pub async fn package_video(
    fragmented: &Path,
    output_dir: &Path,
    formats: &[PlaybackFormat],
) -> Result<()> {
    let mut args = vec!["--output-dir".to_string(), path_arg(output_dir)];
    if formats.contains(&PlaybackFormat::Hls) {
        args.push("--hls".to_string());
    }
    args.push(path_arg(fragmented));

    run_tool("mp4dash", &args)
        .await
        .map_err(EncoderError::Package)?;

    verify_output_tree(output_dir).await
}

/// A packaging run only counts if the tree holds at least one adaptive
/// manifest and at least one media segment.
pub async fn verify_output_tree(output_dir: &Path) -> Result<()> {
    let mut manifests = 0usize;
    let mut media_segments = 0usize;

    let mut pending = vec![output_dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
                continue;
            }
            match path.extension().and_then(|e| e.to_str()) {
                Some("m3u8") | Some("mpd") => manifests += 1,
                Some("m4s") | Some("ts") => media_segments += 1,
                _ => {}
            }
        }
    }

    if manifests == 0 {
        return Err(EncoderError::Package(format!(
            "no manifest found under {}",
            output_dir.display()
        )));
    }
    if media_segments == 0 {
        return Err(EncoderError::Package(format!(
            "no media segments found under {}",
            output_dir.display()
        )));
    }

    debug!(manifests, media_segments, "output tree verified");
    Ok(())
}
