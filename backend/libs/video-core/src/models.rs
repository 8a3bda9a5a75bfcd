//! Core encode-job and video data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Lifecycle of an encode job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Completed and failed are the two terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Adaptive streaming packaging formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackFormat {
    Hls,
    Dash,
}

/// Requested output quality; bitrates in kbps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityInfo {
    pub resolution: String,
    pub bitrate: u32,
    pub max_bitrate: u32,
    pub min_bitrate: u32,
}

/// The unit of work carried on the job queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeJob {
    pub job_id: String,
    pub user_id: String,
    pub video_id: String,
    pub input_s3_key: String,
    pub input_bucket: String,
    #[serde(default)]
    pub progress: f64,
    pub output_s3_key: String,
    pub output_bucket: String,
    #[serde(default)]
    pub qualities: Vec<QualityInfo>,
    #[serde(default)]
    pub output_formats: Vec<PlaybackFormat>,
    #[serde(default)]
    pub enable_per_title_encoding: bool,
    pub status: JobStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl EncodeJob {
    /// Formats requested by the job, defaulting to HLS when none were given.
    pub fn requested_formats(&self) -> Vec<PlaybackFormat> {
        if self.output_formats.is_empty() {
            vec![PlaybackFormat::Hls]
        } else {
            self.output_formats.clone()
        }
    }
}

/// Published on the notification channel whenever a job is enqueued
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobNotification {
    pub job_id: String,
    pub video_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Persistent metadata row for an uploaded source file
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VideoFile {
    pub video_id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    pub duration: i64,
    pub s3_key: String,
    pub s3_bucket: String,
    pub format: String,
    pub status: JobStatus,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Probe result for a source file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub duration_seconds: f64,
}

/// One slice of the input produced by the segmenter
#[derive(Debug, Clone)]
pub struct Segment {
    pub index: usize,
    pub local_path: PathBuf,
    pub duration: f64,
}

/// Default minimum bitrate (kbps) for a resolution label.
pub fn default_min_bitrate(resolution: &str) -> u32 {
    match resolution {
        "2160p" | "4K" => 8000,
        "1440p" | "2K" => 5000,
        "1080p" => 3000,
        "720p" => 1500,
        "480p" => 500,
        "360p" => 300,
        _ => 500,
    }
}

/// Default maximum bitrate (kbps) for a resolution label.
pub fn default_max_bitrate(resolution: &str) -> u32 {
    match resolution {
        "2160p" | "4K" => 40000,
        "1440p" | "2K" => 16000,
        "1080p" => 8000,
        "720p" => 4000,
        "480p" => 2000,
        "360p" => 1000,
        _ => 2000,
    }
}

/// Quality ladder used when a job request names none.
pub fn default_qualities() -> Vec<QualityInfo> {
    vec![
        QualityInfo {
            resolution: "720p".to_string(),
            bitrate: 2500,
            min_bitrate: 1500,
            max_bitrate: 3000,
        },
        QualityInfo {
            resolution: "480p".to_string(),
            bitrate: 1000,
            min_bitrate: 500,
            max_bitrate: 2000,
        },
    ]
}

/// Clamp a requested bitrate into `[min, max]`.
pub fn adjust_bitrate_to_range(bitrate: u32, min_bitrate: u32, max_bitrate: u32) -> u32 {
    bitrate.clamp(min_bitrate, max_bitrate)
}

/// Fill absent bounds from the per-resolution defaults and clamp each
/// requested bitrate into its range. An empty ladder becomes the default one.
pub fn normalize_qualities(qualities: Vec<QualityInfo>) -> Vec<QualityInfo> {
    if qualities.is_empty() {
        return default_qualities();
    }

    qualities
        .into_iter()
        .map(|mut q| {
            if q.min_bitrate == 0 {
                q.min_bitrate = default_min_bitrate(&q.resolution);
            }
            if q.max_bitrate == 0 {
                q.max_bitrate = default_max_bitrate(&q.resolution);
            }
            q.bitrate = adjust_bitrate_to_range(q.bitrate, q.min_bitrate, q.max_bitrate);
            q
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_str() {
        assert_eq!(JobStatus::Queued.as_str(), "queued");
        assert_eq!(JobStatus::InProgress.as_str(), "in_progress");
        assert_eq!(JobStatus::Completed.as_str(), "completed");
        assert_eq!(JobStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_job_status_json_round_trip() {
        let json = serde_json::to_string(&JobStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let back: JobStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, JobStatus::InProgress);
    }

    #[test]
    fn test_encode_job_json_field_names() {
        let job = EncodeJob {
            job_id: "J1".to_string(),
            user_id: "u".to_string(),
            video_id: "v".to_string(),
            input_s3_key: "uploads/u/a.mp4".to_string(),
            input_bucket: "in".to_string(),
            progress: 0.0,
            output_s3_key: "outputs/v".to_string(),
            output_bucket: "out".to_string(),
            qualities: vec![],
            output_formats: vec![PlaybackFormat::Hls],
            enable_per_title_encoding: true,
            status: JobStatus::Queued,
            started_at: None,
            completed_at: None,
        };
        let value: serde_json::Value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["input_s3_key"], "uploads/u/a.mp4");
        assert_eq!(value["status"], "queued");
        assert_eq!(value["output_formats"][0], "hls");
    }

    #[test]
    fn test_requested_formats_default_to_hls() {
        let mut job: EncodeJob = serde_json::from_value(serde_json::json!({
            "job_id": "J1",
            "user_id": "u",
            "video_id": "v",
            "input_s3_key": "k",
            "input_bucket": "in",
            "output_s3_key": "o",
            "output_bucket": "out",
            "status": "queued"
        }))
        .unwrap();
        assert_eq!(job.requested_formats(), vec![PlaybackFormat::Hls]);

        job.output_formats = vec![PlaybackFormat::Dash];
        assert_eq!(job.requested_formats(), vec![PlaybackFormat::Dash]);
    }

    #[test]
    fn test_normalize_fills_defaults_and_clamps() {
        let normalized = normalize_qualities(vec![QualityInfo {
            resolution: "1080p".to_string(),
            bitrate: 20000,
            min_bitrate: 0,
            max_bitrate: 0,
        }]);
        assert_eq!(normalized[0].min_bitrate, 3000);
        assert_eq!(normalized[0].max_bitrate, 8000);
        assert_eq!(normalized[0].bitrate, 8000);
    }

    #[test]
    fn test_normalize_empty_ladder_uses_defaults() {
        let normalized = normalize_qualities(vec![]);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].resolution, "720p");
    }

    #[test]
    fn test_adjust_bitrate_to_range() {
        assert_eq!(adjust_bitrate_to_range(100, 500, 2000), 500);
        assert_eq!(adjust_bitrate_to_range(5000, 500, 2000), 2000);
        assert_eq!(adjust_bitrate_to_range(1000, 500, 2000), 1000);
    }
}
