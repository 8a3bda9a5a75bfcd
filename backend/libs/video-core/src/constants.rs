//! Encoder platform constants

/// Shortest slice the segmenter will cut (seconds)
pub const MIN_SEGMENT_DURATION_SECS: f64 = 15.0;

/// Upper bound on segments per job
pub const MAX_SEGMENTS: u32 = 8;

/// Concurrent segment encodes per job
pub const MAX_PARALLEL_ENCODES: usize = 4;

/// Concurrent artifact uploads per job
pub const MAX_CONCURRENT_UPLOADS: usize = 50;

/// Upload attempts per file (first try included)
pub const UPLOAD_MAX_ATTEMPTS: u32 = 3;

/// Base bitrates by resolution class (kbps)
pub const DEFAULT_BASE_BITRATE_KBPS: u32 = 400;
pub const HD_BASE_BITRATE_KBPS: u32 = 800;
pub const FULL_HD_BASE_BITRATE_KBPS: u32 = 1500;

/// Lease lock lifetime unless overridden by deployment config
pub const DEFAULT_LEASE_TTL_SECS: u64 = 600;

/// Key namespaces shared between the ingestion and encoder services
pub const LOCK_KEY_PREFIX: &str = "lock:";
pub const PROGRESS_KEY_PREFIX: &str = "video:progress:";
pub const DEFAULT_JOB_QUEUE_KEY: &str = "video_jobs";
pub const JOB_NOTIFY_CHANNEL: &str = "new_video_jobs_channel";

/// Allowed source container extensions for presigned uploads
pub const ALLOWED_UPLOAD_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpeg", "mpg", "3gp", "ogv", "vob",
    "ts", "mxf",
];
