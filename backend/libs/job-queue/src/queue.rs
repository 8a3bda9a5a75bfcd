//! Queue operations: enqueue, lease, progress, status

use crate::QueueError;
use chrono::Utc;
use redis::AsyncCommands;
use redis_utils::{with_timeout, SharedConnectionManager};
use std::time::Duration;
use tracing::{debug, warn};
use video_core::constants::{
    DEFAULT_JOB_QUEUE_KEY, DEFAULT_LEASE_TTL_SECS, JOB_NOTIFY_CHANNEL, LOCK_KEY_PREFIX,
    PROGRESS_KEY_PREFIX,
};
use video_core::{EncodeJob, JobNotification, JobStatus};

/// Queue engine configuration; every deployment knob is explicit
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Redis list holding serialized jobs
    pub queue_key: String,
    /// Pub/sub channel for enqueue notifications
    pub notify_channel: String,
    /// Lease lock lifetime
    pub lease_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_key: DEFAULT_JOB_QUEUE_KEY.to_string(),
            notify_channel: JOB_NOTIFY_CHANNEL.to_string(),
            lease_ttl: Duration::from_secs(DEFAULT_LEASE_TTL_SECS),
        }
    }
}

/// The three job-queue capabilities the platform shares: enqueue with
/// notification, lease-gated handoff, and progress/status publication.
#[derive(Clone)]
pub struct JobQueue {
    manager: SharedConnectionManager,
    config: QueueConfig,
}

impl JobQueue {
    pub fn new(manager: SharedConnectionManager, config: QueueConfig) -> Self {
        Self { manager, config }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn lock_key(job_id: &str) -> String {
        format!("{LOCK_KEY_PREFIX}{job_id}")
    }

    fn progress_key(job_id: &str) -> String {
        format!("{PROGRESS_KEY_PREFIX}{job_id}")
    }

    /// Append a job to the queue, seed its progress hash, and publish a
    /// notification — one MULTI/EXEC round-trip, so a failed push can never
    /// leave a notification (or vice versa).
    pub async fn enqueue_job(&self, job: &EncodeJob) -> Result<(), QueueError> {
        let raw = serde_json::to_string(job)?;
        let notification = serde_json::to_string(&JobNotification {
            job_id: job.job_id.clone(),
            video_id: job.video_id.clone(),
            timestamp: Utc::now(),
        })?;
        let progress_key = Self::progress_key(&job.job_id);

        let mut conn = self.manager.lock().await;
        with_timeout(
            redis::pipe()
                .atomic()
                .lpush(&self.config.queue_key, &raw)
                .ignore()
                .hset(&progress_key, "progress", 0.0f64)
                .ignore()
                .hset(&progress_key, "status", JobStatus::Queued.as_str())
                .ignore()
                .hset(&progress_key, "job_data", &raw)
                .ignore()
                .publish(&self.config.notify_channel, &notification)
                .ignore()
                .query_async::<_, ()>(&mut *conn),
        )
        .await?;

        debug!(job_id = %job.job_id, queue = %self.config.queue_key, "job enqueued");
        Ok(())
    }

    /// Scan the queue head-to-tail and lease the first claimable entry.
    ///
    /// The SET-NX lock is the only arbiter: a queued entry with no lock is
    /// claimable, and so is an `in_progress` entry whose lock has expired
    /// (crashed worker). Entries that fail to decode are logged and left in
    /// place. Returns `None` when nothing is claimable.
    ///
    /// The leased entry is rewritten (status `in_progress`, `started_at` set)
    /// by value — remove old, append new — in the same transaction that
    /// records the new state in the progress hash. Value-based rewrite keeps
    /// the update race-free against concurrent pushes and removals shifting
    /// list indices.
    pub async fn acquire_lease(&self, worker_tag: &str) -> Result<Option<EncodeJob>, QueueError> {
        let entries: Vec<String> = {
            let mut conn = self.manager.lock().await;
            with_timeout(conn.lrange(&self.config.queue_key, 0, -1)).await?
        };

        for (index, raw) in entries.iter().enumerate() {
            let mut job: EncodeJob = match serde_json::from_str(raw) {
                Ok(job) => job,
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed queue entry");
                    continue;
                }
            };

            if job.status.is_terminal() {
                continue;
            }

            if !self.try_lock(&job.job_id, worker_tag).await? {
                continue;
            }

            job.status = JobStatus::InProgress;
            job.started_at = Some(Utc::now());
            let updated = serde_json::to_string(&job)?;
            let progress_key = Self::progress_key(&job.job_id);

            let mut conn = self.manager.lock().await;
            with_timeout(
                redis::pipe()
                    .atomic()
                    .lrem(&self.config.queue_key, 1, raw)
                    .ignore()
                    .rpush(&self.config.queue_key, &updated)
                    .ignore()
                    .hset(&progress_key, "status", JobStatus::InProgress.as_str())
                    .ignore()
                    .hset(&progress_key, "job_data", &updated)
                    .ignore()
                    .query_async::<_, ()>(&mut *conn),
            )
            .await?;

            debug!(job_id = %job.job_id, worker = %worker_tag, "lease acquired");
            return Ok(Some(job));
        }

        Ok(None)
    }

    /// SET-NX with TTL; true means this worker now holds the lease.
    async fn try_lock(&self, job_id: &str, worker_tag: &str) -> Result<bool, QueueError> {
        let mut conn = self.manager.lock().await;
        let acquired: Option<String> = with_timeout(
            redis::cmd("SET")
                .arg(Self::lock_key(job_id))
                .arg(worker_tag)
                .arg("NX")
                .arg("EX")
                .arg(self.config.lease_ttl.as_secs())
                .query_async(&mut *conn),
        )
        .await?;
        Ok(acquired.is_some())
    }

    /// Extend the lease to a full TTL again. Returns false when the lock no
    /// longer exists (expired and possibly re-leased elsewhere).
    pub async fn refresh_lease(&self, job_id: &str) -> Result<bool, QueueError> {
        let mut conn = self.manager.lock().await;
        let refreshed: bool = with_timeout(
            conn.expire(
                Self::lock_key(job_id),
                self.config.lease_ttl.as_secs() as i64,
            ),
        )
        .await?;
        Ok(refreshed)
    }

    /// Delete the lock key. Safe to call repeatedly.
    pub async fn release_lease(&self, job_id: &str) -> Result<(), QueueError> {
        let mut conn = self.manager.lock().await;
        with_timeout(conn.del::<_, ()>(Self::lock_key(job_id))).await?;
        Ok(())
    }

    /// Record pipeline progress in `[0.0, 1.0]`. Only the lease holder
    /// writes this field, and the pipeline's stage sequence is fixed, so the
    /// value never regresses within a lease.
    pub async fn update_progress(&self, job_id: &str, progress: f64) -> Result<(), QueueError> {
        let mut conn = self.manager.lock().await;
        with_timeout(conn.hset::<_, _, _, ()>(
            Self::progress_key(job_id),
            "progress",
            progress.clamp(0.0, 1.0),
        ))
        .await?;
        Ok(())
    }

    /// Transition a job's status. Terminal transitions stamp `completed_at`
    /// and remove the serialized entry from the queue list, so a finished
    /// job can never be re-leased once its lock is gone.
    pub async fn update_status(&self, job_id: &str, status: JobStatus) -> Result<(), QueueError> {
        let progress_key = Self::progress_key(job_id);

        let old_raw: Option<String> = {
            let mut conn = self.manager.lock().await;
            with_timeout(conn.hget(&progress_key, "job_data")).await?
        };
        let old_raw = old_raw.ok_or_else(|| QueueError::MissingJobData(job_id.to_string()))?;

        let mut job: EncodeJob =
            serde_json::from_str(&old_raw).map_err(|e| QueueError::CorruptJobData {
                job_id: job_id.to_string(),
                message: e.to_string(),
            })?;

        job.status = status;
        if status.is_terminal() {
            job.completed_at = Some(Utc::now());
        }
        let updated = serde_json::to_string(&job)?;

        let mut conn = self.manager.lock().await;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset(&progress_key, "status", status.as_str())
            .ignore()
            .hset(&progress_key, "job_data", &updated)
            .ignore();
        if status.is_terminal() {
            pipe.lrem(&self.config.queue_key, 1, &old_raw).ignore();
        }
        with_timeout(pipe.query_async::<_, ()>(&mut *conn)).await?;

        debug!(job_id = %job_id, status = %status.as_str(), "job status updated");
        Ok(())
    }

    /// Current status from the progress hash, if the job is known.
    pub async fn get_job_status(&self, job_id: &str) -> Result<Option<JobStatus>, QueueError> {
        let raw: Option<String> = {
            let mut conn = self.manager.lock().await;
            with_timeout(conn.hget(Self::progress_key(job_id), "status")).await?
        };
        match raw.as_deref() {
            None => Ok(None),
            Some(s) => Ok(Some(parse_status(job_id, s)?)),
        }
    }

    /// Current progress from the progress hash, if the job is known.
    pub async fn get_progress(&self, job_id: &str) -> Result<Option<f64>, QueueError> {
        let raw: Option<f64> = {
            let mut conn = self.manager.lock().await;
            with_timeout(conn.hget(Self::progress_key(job_id), "progress")).await?
        };
        Ok(raw)
    }

    /// The persisted job snapshot, if the job is known.
    pub async fn get_job(&self, job_id: &str) -> Result<Option<EncodeJob>, QueueError> {
        let raw: Option<String> = {
            let mut conn = self.manager.lock().await;
            with_timeout(conn.hget(Self::progress_key(job_id), "job_data")).await?
        };
        match raw {
            None => Ok(None),
            Some(raw) => {
                let job =
                    serde_json::from_str(&raw).map_err(|e| QueueError::CorruptJobData {
                        job_id: job_id.to_string(),
                        message: e.to_string(),
                    })?;
                Ok(Some(job))
            }
        }
    }

    /// Whether a lease lock currently exists for the job.
    pub async fn lease_exists(&self, job_id: &str) -> Result<bool, QueueError> {
        let mut conn = self.manager.lock().await;
        let exists: bool = with_timeout(conn.exists(Self::lock_key(job_id))).await?;
        Ok(exists)
    }

    /// Number of entries currently in the queue list.
    pub async fn queue_depth(&self) -> Result<usize, QueueError> {
        let mut conn = self.manager.lock().await;
        let depth: usize = with_timeout(conn.llen(&self.config.queue_key)).await?;
        Ok(depth)
    }
}

fn parse_status(job_id: &str, raw: &str) -> Result<JobStatus, QueueError> {
    match raw {
        "queued" => Ok(JobStatus::Queued),
        "in_progress" => Ok(JobStatus::InProgress),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        other => Err(QueueError::CorruptJobData {
            job_id: job_id.to_string(),
            message: format!("unknown status {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(JobQueue::lock_key("J1"), "lock:J1");
        assert_eq!(JobQueue::progress_key("J1"), "video:progress:J1");
    }

    #[test]
    fn test_parse_status_round_trip() {
        for status in [
            JobStatus::Queued,
            JobStatus::InProgress,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(parse_status("J1", status.as_str()).unwrap(), status);
        }
        assert!(parse_status("J1", "exploded").is_err());
    }

    #[test]
    fn test_default_config() {
        let config = QueueConfig::default();
        assert_eq!(config.queue_key, "video_jobs");
        assert_eq!(config.notify_channel, "new_video_jobs_channel");
        assert_eq!(config.lease_ttl, Duration::from_secs(600));
    }
}
