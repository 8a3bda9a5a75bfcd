//! Object storage adapter for the encoder platform
//!
//! Wraps the AWS S3 SDK behind the small surface the pipeline needs:
//! download of a source object, upload of packaged artifacts, presigned
//! upload URLs for the ingestion boundary, and a startup health check.
//! Works against any S3-compatible store via a custom endpoint.

mod content_type;
mod store;
mod uploader;

pub use content_type::content_type_for_path;
pub use store::{get_s3_client, validate_upload_extension, ObjectStore, S3Config};
pub use uploader::{upload_directory, UploadOptions, UploadSummary};

use thiserror::Error;

/// Object-store error type
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("invalid content type: {0}")]
    InvalidContentType(String),

    #[error("failed to presign put object: {0}")]
    Presign(String),

    #[error("failed to download s3://{bucket}/{key}: {message}")]
    Download {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("failed to upload s3://{bucket}/{key}: {message}")]
    Upload {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("failed to list objects in bucket {bucket}: {message}")]
    List { bucket: String, message: String },

    #[error("failed to delete s3://{bucket}/{key}: {message}")]
    Delete {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("{failed} of {total} uploads failed, first error: {first_error}")]
    UploadTree {
        failed: usize,
        total: usize,
        first_error: String,
    },

    #[error("S3 health check failed: {0}")]
    HealthCheck(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
