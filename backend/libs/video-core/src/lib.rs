//! Encoder platform core models and types
//!
//! Shared data structures for the ingestion and encoder services

pub mod constants;
pub mod models;

pub use models::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_transitions() {
        let mut status = JobStatus::Queued;
        assert_eq!(status, JobStatus::Queued);

        status = JobStatus::InProgress;
        assert_eq!(status, JobStatus::InProgress);

        status = JobStatus::Completed;
        assert!(status.is_terminal());
    }

    #[test]
    fn test_quality_info_creation() {
        let quality = QualityInfo {
            resolution: "1080p".to_string(),
            bitrate: 5000,
            min_bitrate: 3000,
            max_bitrate: 8000,
        };
        assert_eq!(quality.bitrate, 5000);
    }
}
