//! Encoder Service - queue-draining transcoding worker
//!
//! Connects to Redis (queue + notifications) and S3, then runs a fixed pool
//! of workers until SIGINT/SIGTERM.
//!
//! Environment variables:
//! - REDIS_URL: Redis connection string (required)
//! - S3_INPUT_BUCKET / S3_OUTPUT_BUCKET: source and artifact buckets (required)
//! - S3_REGION / S3_ENDPOINT / S3_ACCESS_KEY_ID / S3_SECRET_ACCESS_KEY
//! - JOB_QUEUE_KEY: queue list name (default: "video_jobs")
//! - WORKER_COUNT: worker loops in the pool (default: 2)
//! - MAX_CPU_USAGE: admission ceiling in percent (default: 80)
//! - LEASE_TTL_SECS / LEASE_REFRESH_SECS / LEASE_REFRESH_ENABLED
//! - ENCODER_TEMP_ROOT: scratch directory root

use encoder_service::worker::WorkerPool;
use encoder_service::EncoderConfig;
use job_queue::{JobQueue, QueueConfig};
use object_store::{get_s3_client, ObjectStore};
use redis_utils::RedisPool;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("encoder_service=info".parse().expect("valid directive"))
                .add_directive("job_queue=info".parse().expect("valid directive")),
        )
        .init();

    info!("Starting Encoder Service");

    dotenvy::dotenv().ok();
    let config = EncoderConfig::from_env().map_err(anyhow::Error::msg)?;
    info!(
        workers = config.worker_count,
        queue = %config.queue_key,
        input_bucket = %config.input_bucket,
        output_bucket = %config.output_bucket,
        "Configuration loaded"
    );

    let redis_pool = RedisPool::connect(&config.redis_url).await?;

    let store = ObjectStore::new(get_s3_client(&config.s3).await);
    // The pipeline cannot run without its buckets: fail fast at startup
    store.health_check(&config.input_bucket).await?;
    store.health_check(&config.output_bucket).await?;

    let queue = JobQueue::new(
        redis_pool.manager(),
        QueueConfig {
            queue_key: config.queue_key.clone(),
            notify_channel: config.notify_channel.clone(),
            lease_ttl: config.lease_ttl,
        },
    );

    let mut pool = WorkerPool::new(
        Arc::new(config),
        Arc::new(queue),
        Arc::new(store),
        redis_pool.client(),
    );
    pool.start();

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
        _ = sigterm.recv() => info!("SIGTERM received"),
    }

    pool.stop().await;
    info!("Encoder Service stopped");
    Ok(())
}
