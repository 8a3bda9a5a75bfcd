//! Configuration management for the ingestion service
//!
//! Loads configuration from environment variables with sensible defaults.

use object_store::S3Config;
use video_core::constants::{DEFAULT_JOB_QUEUE_KEY, DEFAULT_LEASE_TTL_SECS, JOB_NOTIFY_CHANNEL};

#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppConfig,
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
    pub queue: QueueSettings,
    pub storage: StorageConfig,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

#[derive(Clone, Debug)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct QueueSettings {
    pub redis_url: String,
    pub job_queue_key: String,
    pub notify_channel: String,
    pub lease_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub s3: S3Config,
    pub input_bucket: String,
    pub output_bucket: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                host: std::env::var("INGESTION_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("INGESTION_SERVICE_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                    .unwrap_or_else(|_| vec!["*".to_string()]),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/encoder".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            queue: QueueSettings {
                redis_url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost".to_string()),
                job_queue_key: std::env::var("JOB_QUEUE_KEY")
                    .unwrap_or_else(|_| DEFAULT_JOB_QUEUE_KEY.to_string()),
                notify_channel: std::env::var("JOB_NOTIFY_CHANNEL")
                    .unwrap_or_else(|_| JOB_NOTIFY_CHANNEL.to_string()),
                lease_ttl_secs: std::env::var("LEASE_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_LEASE_TTL_SECS),
            },
            storage: StorageConfig {
                s3: S3Config::from_env(),
                input_bucket: std::env::var("S3_INPUT_BUCKET")
                    .map_err(|_| "S3_INPUT_BUCKET environment variable not set")?,
                output_bucket: std::env::var("S3_OUTPUT_BUCKET")
                    .map_err(|_| "S3_OUTPUT_BUCKET environment variable not set")?,
            },
        })
    }
}
