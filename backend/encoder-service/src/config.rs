//! Configuration for the encoder worker service
//!
//! Loaded from environment variables with sensible defaults. Every knob the
//! pipeline stages use is carried here and passed down explicitly; there is
//! no process-wide mutable state.

use object_store::S3Config;
use std::path::PathBuf;
use std::time::Duration;
use video_core::constants::{
    DEFAULT_JOB_QUEUE_KEY, DEFAULT_LEASE_TTL_SECS, JOB_NOTIFY_CHANNEL, MAX_CONCURRENT_UPLOADS,
    MAX_PARALLEL_ENCODES,
};

#[derive(Clone, Debug)]
pub struct EncoderConfig {
    /// Redis connection string
    pub redis_url: String,
    /// Queue list the workers drain
    pub queue_key: String,
    /// Pub/sub channel that wakes idle workers
    pub notify_channel: String,

    /// Number of worker loops in the pool
    pub worker_count: usize,
    /// CPU percentage ceiling for admitting new jobs
    pub max_cpu_usage: f32,
    /// How often an idle worker rescans the queue without a notification
    pub poll_interval: Duration,
    /// How long a worker sleeps after an admission refusal
    pub admission_backoff: Duration,
    /// Deadline for workers to wind down after a stop request
    pub shutdown_grace: Duration,

    /// Lease lock lifetime
    pub lease_ttl: Duration,
    /// Interval between lease renewals while a job is running
    pub lease_refresh_interval: Duration,
    /// Disable to hold the TTL fixed and accept duplicate encodes on expiry
    pub lease_refresh_enabled: bool,

    /// Bucket holding source uploads
    pub input_bucket: String,
    /// Bucket receiving packaged trees
    pub output_bucket: String,
    pub s3: S3Config,

    /// Root under which per-job scratch directories are created
    pub temp_root: PathBuf,
    /// Concurrent segment encodes per job
    pub max_parallel_encodes: usize,
    /// Concurrent artifact uploads per job
    pub max_concurrent_uploads: usize,
}

impl EncoderConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let redis_url = std::env::var("REDIS_URL")
            .map_err(|_| "REDIS_URL environment variable not set".to_string())?;
        let input_bucket = std::env::var("S3_INPUT_BUCKET")
            .map_err(|_| "S3_INPUT_BUCKET environment variable not set".to_string())?;
        let output_bucket = std::env::var("S3_OUTPUT_BUCKET")
            .map_err(|_| "S3_OUTPUT_BUCKET environment variable not set".to_string())?;

        Ok(Self {
            redis_url,
            queue_key: std::env::var("JOB_QUEUE_KEY")
                .unwrap_or_else(|_| DEFAULT_JOB_QUEUE_KEY.to_string()),
            notify_channel: std::env::var("JOB_NOTIFY_CHANNEL")
                .unwrap_or_else(|_| JOB_NOTIFY_CHANNEL.to_string()),
            worker_count: env_parsed("WORKER_COUNT", 2),
            max_cpu_usage: env_parsed("MAX_CPU_USAGE", 80.0),
            poll_interval: Duration::from_secs(env_parsed("POLL_INTERVAL_SECS", 5)),
            admission_backoff: Duration::from_secs(env_parsed("ADMISSION_BACKOFF_SECS", 5)),
            shutdown_grace: Duration::from_secs(env_parsed("SHUTDOWN_GRACE_SECS", 5)),
            lease_ttl: Duration::from_secs(env_parsed("LEASE_TTL_SECS", DEFAULT_LEASE_TTL_SECS)),
            lease_refresh_interval: Duration::from_secs(env_parsed("LEASE_REFRESH_SECS", 120)),
            lease_refresh_enabled: std::env::var("LEASE_REFRESH_ENABLED")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(true),
            input_bucket,
            output_bucket,
            s3: S3Config::from_env(),
            temp_root: std::env::var("ENCODER_TEMP_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("encoder_jobs")),
            max_parallel_encodes: env_parsed("MAX_PARALLEL_ENCODES", MAX_PARALLEL_ENCODES),
            max_concurrent_uploads: env_parsed("MAX_CONCURRENT_UPLOADS", MAX_CONCURRENT_UPLOADS),
        })
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parsed_falls_back_on_garbage() {
        std::env::set_var("ENCODER_TEST_GARBAGE", "not-a-number");
        let value: u64 = env_parsed("ENCODER_TEST_GARBAGE", 42);
        assert_eq!(value, 42);
        std::env::remove_var("ENCODER_TEST_GARBAGE");
    }
}
