//! Per-job pipeline orchestration
//!
//! Runs one leased job end to end inside an exclusive scratch directory:
//! download, probe, split, analyze, plan, encode, stitch, fragment, package,
//! upload. Progress checkpoints are published after each stage; the scratch
//! directory is removed on every exit path.

use crate::analysis::analyze_complexity;
use crate::bitrate::target_bitrate;
use crate::config::EncoderConfig;
use crate::encode::encode_segments;
use crate::error::Result;
use crate::packaging::{fragment_video, package_video, stitch_segments};
use crate::probe::probe_video;
use crate::segmenter::split_video;
use job_queue::JobQueue;
use object_store::{upload_directory, ObjectStore, UploadOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use video_core::EncodeJob;

/// Progress checkpoints published as the pipeline advances
const PROGRESS_DOWNLOADED: f64 = 0.05;
const PROGRESS_SPLIT: f64 = 0.1;
const PROGRESS_ANALYZED: f64 = 0.3;
const PROGRESS_ENCODED: f64 = 0.8;
const PROGRESS_PACKAGED: f64 = 0.9;
const PROGRESS_UPLOADED: f64 = 1.0;

/// Scratch layout for one job; exclusive to the worker that leased it
pub struct JobWorkspace {
    pub root: PathBuf,
    pub source: PathBuf,
    pub segments_dir: PathBuf,
    pub encoded_dir: PathBuf,
    pub packaging_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl JobWorkspace {
    pub async fn create(temp_root: &Path, job: &EncodeJob) -> Result<Self> {
        let root = temp_root.join(&job.job_id);
        let source_name = Path::new(&job.input_s3_key)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "source.mp4".to_string());

        let workspace = Self {
            source: root.join(source_name),
            segments_dir: root.join("segments"),
            encoded_dir: root.join("encoded_segments"),
            packaging_dir: root.join("packaging"),
            output_dir: root.join("output"),
            root,
        };
        tokio::fs::create_dir_all(&workspace.root).await?;
        Ok(workspace)
    }

    /// Unconditional removal; failures are logged, not propagated, so
    /// cleanup can never mask the pipeline's own result.
    pub async fn cleanup(&self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.root).await {
            warn!(path = %self.root.display(), error = %e, "failed to remove job workspace");
        }
    }
}

/// Run one job end to end. The scratch directory is removed whether the
/// pipeline succeeds or fails.
pub async fn process_job(
    queue: &JobQueue,
    store: &ObjectStore,
    config: &EncoderConfig,
    job: &EncodeJob,
) -> Result<()> {
    let workspace = JobWorkspace::create(&config.temp_root, job).await?;
    let result = run_stages(queue, store, config, job, &workspace).await;
    workspace.cleanup().await;
    result
}

async fn run_stages(
    queue: &JobQueue,
    store: &ObjectStore,
    config: &EncoderConfig,
    job: &EncodeJob,
    workspace: &JobWorkspace,
) -> Result<()> {
    let job_id = &job.job_id;

    let bytes = store
        .download_object(&job.input_bucket, &job.input_s3_key, &workspace.source)
        .await?;
    info!(job_id = %job_id, bytes, "source downloaded");
    queue.update_progress(job_id, PROGRESS_DOWNLOADED).await?;

    let video_info = probe_video(&workspace.source).await?;
    info!(
        job_id = %job_id,
        width = video_info.width,
        height = video_info.height,
        duration = video_info.duration_seconds,
        "source probed"
    );

    let segments = split_video(&workspace.source, &workspace.segments_dir, &video_info).await?;
    info!(job_id = %job_id, segments = segments.len(), "source segmented");
    queue.update_progress(job_id, PROGRESS_SPLIT).await?;

    // Sample segment 0; the complexity of the opening slice stands in for
    // the whole title.
    let complexity = if job.enable_per_title_encoding {
        let complexity =
            analyze_complexity(&segments[0].local_path, &workspace.root).await?;
        info!(
            job_id = %job_id,
            spatial = complexity.spatial,
            temporal = complexity.temporal,
            "complexity analyzed"
        );
        queue.update_progress(job_id, PROGRESS_ANALYZED).await?;
        Some(complexity)
    } else {
        None
    };

    let bitrate_kbps = target_bitrate(job, &video_info, complexity.as_ref());
    info!(job_id = %job_id, bitrate_kbps, "target bitrate planned");

    let encoded = encode_segments(
        &segments,
        &workspace.encoded_dir,
        bitrate_kbps,
        config.max_parallel_encodes,
    )
    .await?;
    queue.update_progress(job_id, PROGRESS_ENCODED).await?;

    let stitched = stitch_segments(&encoded, &workspace.packaging_dir).await?;
    let fragmented = fragment_video(&stitched, &workspace.packaging_dir).await?;
    package_video(&fragmented, &workspace.output_dir, &job.requested_formats()).await?;
    queue.update_progress(job_id, PROGRESS_PACKAGED).await?;

    let summary = upload_directory(
        store,
        &job.output_bucket,
        &job.output_s3_key,
        &workspace.output_dir,
        &UploadOptions {
            concurrency: config.max_concurrent_uploads,
            max_attempts: video_core::constants::UPLOAD_MAX_ATTEMPTS,
            backoff_base: Duration::from_secs(1),
        },
    )
    .await?;
    info!(job_id = %job_id, uploaded = summary.uploaded, "artifacts uploaded");
    queue.update_progress(job_id, PROGRESS_UPLOADED).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use video_core::{JobStatus, PlaybackFormat};

    #[test]
    fn test_progress_checkpoints_never_regress() {
        let checkpoints = [
            PROGRESS_DOWNLOADED,
            PROGRESS_SPLIT,
            PROGRESS_ANALYZED,
            PROGRESS_ENCODED,
            PROGRESS_PACKAGED,
            PROGRESS_UPLOADED,
        ];
        for pair in checkpoints.windows(2) {
            assert!(pair[0] < pair[1], "checkpoints must strictly increase");
        }
        assert_eq!(*checkpoints.last().unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_workspace_layout_and_cleanup() {
        let temp = tempfile::tempdir().unwrap();
        let job = EncodeJob {
            job_id: "J1".to_string(),
            user_id: "u".to_string(),
            video_id: "v".to_string(),
            input_s3_key: "uploads/u/movie.mp4".to_string(),
            input_bucket: "in".to_string(),
            progress: 0.0,
            output_s3_key: "outputs/v".to_string(),
            output_bucket: "out".to_string(),
            qualities: vec![],
            output_formats: vec![PlaybackFormat::Hls],
            enable_per_title_encoding: false,
            status: JobStatus::Queued,
            started_at: None,
            completed_at: None,
        };

        let workspace = JobWorkspace::create(temp.path(), &job).await.unwrap();
        assert!(workspace.root.ends_with("J1"));
        assert!(workspace.source.ends_with("movie.mp4"));
        assert!(workspace.segments_dir.ends_with("segments"));
        assert!(workspace.encoded_dir.ends_with("encoded_segments"));
        assert!(workspace.packaging_dir.ends_with("packaging"));
        assert!(workspace.output_dir.ends_with("output"));
        assert!(workspace.root.exists());

        workspace.cleanup().await;
        assert!(!workspace.root.exists());
    }
}
