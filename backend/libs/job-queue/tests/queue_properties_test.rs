//! Queue engine integration tests against a containerized Redis.
//!
//! Covers the coordination properties the platform depends on: exactly-once
//! lease handoff, terminal closure, and lease recovery after a worker crash.

use job_queue::{subscribe_notifications, JobQueue, QueueConfig};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use redis_utils::SharedConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage,
};
use tokio::sync::{watch, Mutex};
use video_core::{EncodeJob, JobStatus, PlaybackFormat};

async fn start_redis() -> (ContainerAsync<GenericImage>, String) {
    let image = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379.tcp())
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));

    let container = image.start().await.expect("start redis container");
    let port = container
        .get_host_port_ipv4(6379.tcp())
        .await
        .expect("mapped redis port");
    (container, format!("redis://127.0.0.1:{}/", port))
}

async fn connect(redis_url: &str) -> SharedConnectionManager {
    let client = redis::Client::open(redis_url).expect("redis client");
    let conn = ConnectionManager::new(client)
        .await
        .expect("redis connection");
    Arc::new(Mutex::new(conn))
}

fn test_job(job_id: &str) -> EncodeJob {
    EncodeJob {
        job_id: job_id.to_string(),
        user_id: uuid::Uuid::new_v4().to_string(),
        video_id: uuid::Uuid::new_v4().to_string(),
        input_s3_key: "uploads/u1/a.mp4".to_string(),
        input_bucket: "videos-in".to_string(),
        progress: 0.0,
        output_s3_key: "outputs/v1".to_string(),
        output_bucket: "videos-out".to_string(),
        qualities: vec![],
        output_formats: vec![PlaybackFormat::Hls],
        enable_per_title_encoding: false,
        status: JobStatus::Queued,
        started_at: None,
        completed_at: None,
    }
}

fn queue_with_ttl(manager: SharedConnectionManager, ttl: Duration) -> JobQueue {
    JobQueue::new(
        manager,
        QueueConfig {
            lease_ttl: ttl,
            ..QueueConfig::default()
        },
    )
}

#[tokio::test]
async fn concurrent_acquire_hands_job_to_exactly_one_worker() {
    let (_container, redis_url) = start_redis().await;
    let manager = connect(&redis_url).await;
    let queue = queue_with_ttl(manager, Duration::from_secs(600));

    queue.enqueue_job(&test_job("J1")).await.expect("enqueue");

    let mut handles = Vec::new();
    for i in 0..8 {
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            queue.acquire_lease(&format!("worker-{}", i)).await.unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_some() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1, "exactly one worker may hold the lease");
    assert!(queue.lease_exists("J1").await.unwrap());
}

#[tokio::test]
async fn leased_job_is_marked_in_progress_with_start_time() {
    let (_container, redis_url) = start_redis().await;
    let manager = connect(&redis_url).await;
    let queue = queue_with_ttl(manager, Duration::from_secs(600));

    queue.enqueue_job(&test_job("J1")).await.expect("enqueue");

    let leased = queue
        .acquire_lease("worker-0")
        .await
        .unwrap()
        .expect("job should be claimable");
    assert_eq!(leased.status, JobStatus::InProgress);
    assert!(leased.started_at.is_some());

    // The persisted snapshot agrees with what the worker got
    let stored = queue.get_job("J1").await.unwrap().expect("job data");
    assert_eq!(stored.status, JobStatus::InProgress);
    assert_eq!(
        queue.get_job_status("J1").await.unwrap(),
        Some(JobStatus::InProgress)
    );
}

#[tokio::test]
async fn terminal_status_closes_job_and_removes_queue_entry() {
    let (_container, redis_url) = start_redis().await;
    let manager = connect(&redis_url).await;
    let queue = queue_with_ttl(manager, Duration::from_secs(600));

    queue.enqueue_job(&test_job("J1")).await.expect("enqueue");
    queue
        .acquire_lease("worker-0")
        .await
        .unwrap()
        .expect("lease");

    queue.update_progress("J1", 1.0).await.unwrap();
    queue.update_status("J1", JobStatus::Completed).await.unwrap();
    queue.release_lease("J1").await.unwrap();

    let stored = queue.get_job("J1").await.unwrap().expect("job data");
    assert_eq!(stored.status, JobStatus::Completed);
    assert!(stored.completed_at.is_some());
    assert!(!queue.lease_exists("J1").await.unwrap());

    // Entry left the queue, so it cannot be claimed again
    assert_eq!(queue.queue_depth().await.unwrap(), 0);
    assert!(queue.acquire_lease("worker-1").await.unwrap().is_none());
}

#[tokio::test]
async fn expired_lease_lets_another_worker_reclaim_the_job() {
    let (_container, redis_url) = start_redis().await;
    let manager = connect(&redis_url).await;
    let queue = queue_with_ttl(manager, Duration::from_secs(1));

    queue.enqueue_job(&test_job("J1")).await.expect("enqueue");

    // Worker 0 leases the job and then "crashes": no release, no refresh
    queue
        .acquire_lease("worker-0")
        .await
        .unwrap()
        .expect("initial lease");
    assert!(queue.acquire_lease("worker-1").await.unwrap().is_none());

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let reclaimed = queue
        .acquire_lease("worker-1")
        .await
        .unwrap()
        .expect("job should be reclaimable after TTL expiry");
    assert_eq!(reclaimed.job_id, "J1");
    assert_eq!(reclaimed.status, JobStatus::InProgress);
}

#[tokio::test]
async fn refresh_extends_lease_and_reports_lost_locks() {
    let (_container, redis_url) = start_redis().await;
    let manager = connect(&redis_url).await;
    let queue = queue_with_ttl(manager, Duration::from_secs(2));

    queue.enqueue_job(&test_job("J1")).await.expect("enqueue");
    queue
        .acquire_lease("worker-0")
        .await
        .unwrap()
        .expect("lease");

    assert!(queue.refresh_lease("J1").await.unwrap());

    queue.release_lease("J1").await.unwrap();
    assert!(!queue.refresh_lease("J1").await.unwrap());
}

#[tokio::test]
async fn malformed_entries_are_skipped_and_left_in_place() {
    let (_container, redis_url) = start_redis().await;
    let manager = connect(&redis_url).await;
    let queue = queue_with_ttl(manager.clone(), Duration::from_secs(600));

    // Poison entry pushed behind the queue's back
    {
        let mut conn = manager.lock().await;
        let _: () = conn
            .lpush(queue.config().queue_key.clone(), "{not json")
            .await
            .unwrap();
    }
    queue.enqueue_job(&test_job("J1")).await.expect("enqueue");

    let leased = queue
        .acquire_lease("worker-0")
        .await
        .unwrap()
        .expect("well-formed job should still be claimable");
    assert_eq!(leased.job_id, "J1");

    // Poison entry stays for operator inspection
    assert_eq!(queue.queue_depth().await.unwrap(), 2);
}

#[tokio::test]
async fn enqueue_publishes_a_notification() {
    let (_container, redis_url) = start_redis().await;
    let manager = connect(&redis_url).await;
    let queue = queue_with_ttl(manager, Duration::from_secs(600));

    let client = redis::Client::open(redis_url.as_str()).expect("redis client");
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (mut notifications, handle) = subscribe_notifications(
        client,
        queue.config().notify_channel.clone(),
        shutdown_rx,
    );

    // Give the subscriber a moment to attach before publishing
    tokio::time::sleep(Duration::from_millis(300)).await;

    let job = test_job("J1");
    queue.enqueue_job(&job).await.expect("enqueue");

    let notification = tokio::time::timeout(Duration::from_secs(5), notifications.recv())
        .await
        .expect("notification should arrive")
        .expect("subscriber should be running");
    assert_eq!(notification.job_id, "J1");
    assert_eq!(notification.video_id, job.video_id);

    let _ = shutdown_tx.send(true);
    handle.join().await;
}

#[tokio::test]
async fn progress_updates_are_clamped_and_readable() {
    let (_container, redis_url) = start_redis().await;
    let manager = connect(&redis_url).await;
    let queue = queue_with_ttl(manager, Duration::from_secs(600));

    queue.enqueue_job(&test_job("J1")).await.expect("enqueue");
    assert_eq!(queue.get_progress("J1").await.unwrap(), Some(0.0));

    queue.update_progress("J1", 0.3).await.unwrap();
    assert_eq!(queue.get_progress("J1").await.unwrap(), Some(0.3));

    queue.update_progress("J1", 7.5).await.unwrap();
    assert_eq!(queue.get_progress("J1").await.unwrap(), Some(1.0));

    assert_eq!(queue.get_progress("missing").await.unwrap(), None);
}
