//! Ingestion Service
//!
//! The HTTP boundary of the encoder platform: presigned upload URLs, job
//! creation (persist the video row, enqueue the encode job, publish the
//! notification), and job status reads from the progress hash.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;

pub use config::Config;
pub use error::{AppError, Result};

use actix_web::web;
use job_queue::JobQueue;
use object_store::ObjectStore;
use sqlx::PgPool;
use std::sync::Arc;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub queue: JobQueue,
    pub store: ObjectStore,
    pub config: Arc<Config>,
}

/// Route table for the ingestion API
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/videos/upload-url", web::post().to(handlers::get_upload_url))
            .route("/videos", web::post().to(handlers::create_video_job))
            .route("/videos", web::get().to(handlers::list_videos))
            .route("/videos/{video_id}", web::get().to(handlers::get_video))
            .route("/jobs/{job_id}", web::get().to(handlers::get_job_progress)),
    );
}
