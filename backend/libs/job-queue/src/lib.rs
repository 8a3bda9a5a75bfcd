//! Durable job queue engine over Redis
//!
//! The queue is a Redis list of serialized [`video_core::EncodeJob`]s (newest
//! at the head), a `lock:<job_id>` namespace whose keys carry the worker
//! leases (SET-NX with TTL), a `video:progress:<job_id>` hash per job, and a
//! pub/sub channel that wakes idle workers when work arrives.
//!
//! Exactly-once handoff rests on the lock keys alone: whichever worker wins
//! the SET-NX owns the job until it releases the lock or the TTL expires.

mod error;
mod queue;
mod subscriber;

pub use error::QueueError;
pub use queue::{JobQueue, QueueConfig};
pub use subscriber::{subscribe_notifications, SubscriberHandle};
