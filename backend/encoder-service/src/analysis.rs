//! Spatial and temporal complexity analysis
//!
//! Two ffmpeg signalstats passes over a sample segment (index 0 by
//! convention). Each pass prints per-frame metadata into a log file which is
//! parsed line-by-line; the mean YAVG squared scores spatial detail, the
//! mean YDIF scores motion.

use crate::error::{EncoderError, Result};
use crate::tool::{path_arg, run_tool};
use std::path::Path;

/// Complexity scores feeding the bitrate planner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Complexity {
    pub spatial: f64,
    pub temporal: f64,
}

/// Analyze a sample segment; log files are written under `log_dir` and live
/// only as long as the job's scratch directory.
pub async fn analyze_complexity(sample: &Path, log_dir: &Path) -> Result<Complexity> {
    let spatial_log = log_dir.join("spatial.log");
    let yavg = signalstats_pass(sample, "YAVG", &spatial_log).await?;
    let spatial = yavg * yavg;

    let temporal_log = log_dir.join("temporal.log");
    let temporal = signalstats_pass(sample, "YDIF", &temporal_log).await?;

    Ok(Complexity { spatial, temporal })
}

/// One signalstats pass collecting the mean of `key` over all frames.
async fn signalstats_pass(input: &Path, key: &str, log_path: &Path) -> Result<f64> {
    let filter = format!(
        "signalstats=stat=tout,metadata=print:key=lavfi.signalstats.{}:file={}",
        key,
        path_arg(log_path)
    );

    run_tool(
        "ffmpeg",
        &[
            "-i".to_string(),
            path_arg(input),
            "-vf".to_string(),
            filter,
            "-f".to_string(),
            "null".to_string(),
            "-".to_string(),
        ],
    )
    .await
    .map_err(EncoderError::Analysis)?;

    let content = tokio::fs::read_to_string(log_path).await?;
    parse_stats_log(&content, &format!("lavfi.signalstats.{}=", key))
        .map_err(EncoderError::Analysis)
}

/// Mean of all `key=value` samples in a metadata log.
///
/// Lines without the key, or with an unparsable value, are skipped; only a
/// log with zero valid samples is an error.
fn parse_stats_log(content: &str, key: &str) -> std::result::Result<f64, String> {
    let mut sum = 0.0;
    let mut count = 0u32;

    for line in content.lines() {
        if !line.contains(key) {
            continue;
        }
        let mut parts = line.splitn(2, '=');
        let (_, value) = (parts.next(), parts.next());
        let Some(value) = value else { continue };
        if let Ok(value) = value.trim().parse::<f64>() {
            sum += value;
            count += 1;
        }
    }

    if count == 0 {
        return Err(format!("no valid entries found for key {key}"));
    }

    Ok(sum / count as f64)
}
