//! Pipeline error taxonomy
//!
//! Every stage returns its own variant so worker logs name the failing stage
//! directly. Tool failures carry the child's captured stderr.

use thiserror::Error;

/// Result type for encoder pipeline operations
pub type Result<T> = std::result::Result<T, EncoderError>;

#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("probe failed: {0}")]
    Probe(String),

    #[error("segmentation failed: {0}")]
    Segmentation(String),

    #[error("complexity analysis failed: {0}")]
    Analysis(String),

    #[error("encoding segment {index} failed: {message}")]
    Encode { index: usize, message: String },

    #[error("stitching failed: {0}")]
    Stitch(String),

    #[error("fragmenting failed: {0}")]
    Fragment(String),

    #[error("packaging failed: {0}")]
    Package(String),

    #[error(transparent)]
    Storage(#[from] object_store::StoreError),

    #[error(transparent)]
    Queue(#[from] job_queue::QueueError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
