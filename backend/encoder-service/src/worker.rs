//! Worker pool runtime
//!
//! A fixed pool of worker loops plus one notification subscriber. Workers
//! wake on a notification, a poll tick, or shutdown; admit work under the
//! CPU ceiling; lease a job; run the pipeline; and publish the terminal
//! status before releasing the lease. Workers share no mutable state beyond
//! the queue and lock substrate.

use crate::config::EncoderConfig;
use crate::cpu::CpuGate;
use crate::pipeline::process_job;
use job_queue::{subscribe_notifications, JobQueue, SubscriberHandle};
use object_store::ObjectStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use video_core::JobStatus;

/// Jobs currently being processed, by worker index; consulted at shutdown
/// for best-effort lease release.
type ActiveJobs = Arc<Mutex<HashMap<usize, String>>>;

pub struct WorkerPool {
    config: Arc<EncoderConfig>,
    queue: Arc<JobQueue>,
    store: Arc<ObjectStore>,
    redis_client: redis::Client,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    workers: Vec<JoinHandle<()>>,
    subscriber: Option<SubscriberHandle>,
    bridge: Option<JoinHandle<()>>,
    active: ActiveJobs,
}

impl WorkerPool {
    pub fn new(
        config: Arc<EncoderConfig>,
        queue: Arc<JobQueue>,
        store: Arc<ObjectStore>,
        redis_client: redis::Client,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            queue,
            store,
            redis_client,
            shutdown_tx,
            shutdown_rx,
            workers: Vec::new(),
            subscriber: None,
            bridge: None,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawn the subscriber and the worker loops; returns once all are up.
    pub fn start(&mut self) {
        let worker_count = self.config.worker_count.max(1);
        info!(workers = worker_count, "starting worker pool");

        // Depth-1 signal channel per worker: a backlog of one notification
        // is enough, since any queue scan drains all visible work.
        let mut signal_txs = Vec::with_capacity(worker_count);
        let mut signal_rxs = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let (tx, rx) = mpsc::channel::<()>(1);
            signal_txs.push(tx);
            signal_rxs.push(rx);
        }

        let (mut notifications, subscriber) = subscribe_notifications(
            self.redis_client.clone(),
            self.config.notify_channel.clone(),
            self.shutdown_rx.clone(),
        );
        self.subscriber = Some(subscriber);

        // Demux: fan each notification out to every worker's signal channel
        self.bridge = Some(tokio::spawn(async move {
            while let Some(notification) = notifications.recv().await {
                debug!(job_id = %notification.job_id, "waking workers");
                notify_all(&signal_txs);
            }
            debug!("notification bridge stopped");
        }));

        for (worker_id, signal_rx) in signal_rxs.into_iter().enumerate() {
            let config = self.config.clone();
            let queue = self.queue.clone();
            let store = self.store.clone();
            let shutdown_rx = self.shutdown_rx.clone();
            let active = self.active.clone();
            self.workers.push(tokio::spawn(async move {
                worker_loop(worker_id, config, queue, store, signal_rx, shutdown_rx, active)
                    .await;
            }));
        }
    }

    /// Cooperatively stop every loop, wait up to the grace period, then
    /// abort stragglers and release whatever leases were still held.
    pub async fn stop(mut self) {
        info!("stopping worker pool");
        let _ = self.shutdown_tx.send(true);

        let workers = std::mem::take(&mut self.workers);
        let abort_handles: Vec<_> = workers.iter().map(|h| h.abort_handle()).collect();
        if tokio::time::timeout(
            self.config.shutdown_grace,
            futures::future::join_all(workers),
        )
        .await
        .is_err()
        {
            warn!("workers did not stop within the grace period; aborting");
            for handle in abort_handles {
                handle.abort();
            }
        }

        if let Some(bridge) = self.bridge.take() {
            bridge.abort();
        }
        if let Some(subscriber) = self.subscriber.take() {
            subscriber.abort();
        }

        // Leases held by aborted workers would expire on their own; release
        // them now so another worker can pick the jobs up immediately.
        let active = self.active.lock().await.clone();
        for (worker_id, job_id) in active {
            warn!(worker_id, job_id = %job_id, "releasing lease left by stopped worker");
            if let Err(e) = self.queue.release_lease(&job_id).await {
                warn!(job_id = %job_id, error = %e, "failed to release lease at shutdown");
            }
        }

        info!("worker pool stopped");
    }
}

/// Coalescing wake-up: a full channel means that worker already has a
/// pending signal, which is all it needs.
fn notify_all(signal_txs: &[mpsc::Sender<()>]) {
    for tx in signal_txs {
        let _ = tx.try_send(());
    }
}

async fn worker_loop(
    worker_id: usize,
    config: Arc<EncoderConfig>,
    queue: Arc<JobQueue>,
    store: Arc<ObjectStore>,
    mut signal_rx: mpsc::Receiver<()>,
    mut shutdown_rx: watch::Receiver<bool>,
    active: ActiveJobs,
) {
    let worker_tag = format!("{}-{}", worker_id, uuid::Uuid::new_v4());
    let mut gate = CpuGate::new(config.max_cpu_usage);
    info!(worker_id, "worker started");

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
            _ = signal_rx.recv() => {}
            _ = tokio::time::sleep(config.poll_interval) => {}
        }
        if *shutdown_rx.borrow() {
            break;
        }

        let (admit, usage) = gate.check().await;
        if !admit {
            info!(worker_id, usage, "CPU above ceiling, deferring");
            if sleep_or_shutdown(&mut shutdown_rx, config.admission_backoff).await {
                break;
            }
            continue;
        }

        match queue.acquire_lease(&worker_tag).await {
            Ok(Some(job)) => {
                handle_job(worker_id, &config, &queue, &store, job, &active).await;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(worker_id, error = %e, "queue scan failed");
            }
        }
    }

    info!(worker_id, "worker stopped");
}

async fn handle_job(
    worker_id: usize,
    config: &Arc<EncoderConfig>,
    queue: &Arc<JobQueue>,
    store: &Arc<ObjectStore>,
    job: video_core::EncodeJob,
    active: &ActiveJobs,
) {
    let job_id = job.job_id.clone();
    info!(worker_id, job_id = %job_id, "lease acquired");
    active.lock().await.insert(worker_id, job_id.clone());

    let refresh_handle = tokio::spawn(refresh_loop(
        queue.clone(),
        job_id.clone(),
        config.lease_refresh_interval,
        config.lease_refresh_enabled,
    ));

    let result = process_job(queue, store, config, &job).await;
    refresh_handle.abort();

    match result {
        Ok(()) => {
            if let Err(e) = queue.update_status(&job_id, JobStatus::Completed).await {
                error!(job_id = %job_id, error = %e, "failed to record completion");
            }
            info!(worker_id, job_id = %job_id, "job completed");
        }
        Err(e) => {
            error!(worker_id, job_id = %job_id, error = %e, "pipeline failed");
            if let Err(e) = queue.update_status(&job_id, JobStatus::Failed).await {
                error!(job_id = %job_id, error = %e, "failed to record failure");
            }
        }
    }

    if let Err(e) = queue.release_lease(&job_id).await {
        warn!(job_id = %job_id, error = %e, "failed to release lease");
    }
    active.lock().await.remove(&worker_id);
}

/// Renew the lease while the pipeline runs so a long encode outlives the
/// TTL. Stops renewing (and lets the TTL govern) once the lock is lost.
async fn refresh_loop(queue: Arc<JobQueue>, job_id: String, interval: Duration, enabled: bool) {
    if !enabled {
        return;
    }
    loop {
        tokio::time::sleep(interval).await;
        match queue.refresh_lease(&job_id).await {
            Ok(true) => debug!(job_id = %job_id, "lease renewed"),
            Ok(false) => {
                warn!(job_id = %job_id, "lease expired mid-job; another worker may pick it up");
                return;
            }
            Err(e) => warn!(job_id = %job_id, error = %e, "lease renewal failed"),
        }
    }
}

/// Sleep for `delay`, returning true if shutdown fired first.
async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown.changed() => *shutdown.borrow(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notify_all_coalesces_on_full_channels() {
        let (tx, mut rx) = mpsc::channel::<()>(1);
        let senders = vec![tx];

        // Three notifications against a depth-1 channel leave one signal
        notify_all(&senders);
        notify_all(&senders);
        notify_all(&senders);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sleep_or_shutdown_returns_on_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        let waiter = tokio::spawn(async move {
            sleep_or_shutdown(&mut rx, Duration::from_secs(30)).await
        });
        tx.send(true).unwrap();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_sleep_or_shutdown_elapses_quietly() {
        let (_tx, mut rx) = watch::channel(false);
        assert!(!sleep_or_shutdown(&mut rx, Duration::from_millis(10)).await);
    }
}
