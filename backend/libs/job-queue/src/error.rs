use thiserror::Error;

/// Queue engine error type
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error("failed to serialize job: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no job data recorded for job {0}")]
    MissingJobData(String),

    #[error("malformed job data for job {job_id}: {message}")]
    CorruptJobData { job_id: String, message: String },
}
