//! HTTP handlers for the ingestion API

use crate::error::{AppError, Result};
use crate::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;
use video_core::constants::ALLOWED_UPLOAD_EXTENSIONS;
use video_core::{
    normalize_qualities, EncodeJob, JobStatus, PlaybackFormat, QualityInfo, VideoFile,
};

/// Caller identity comes from the gateway as a header; authentication itself
/// lives upstream of this service.
fn user_from_request(req: &HttpRequest) -> Result<Uuid> {
    let raw = req
        .headers()
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing X-User-Id header".to_string()))?;
    Uuid::parse_str(raw)
        .map_err(|_| AppError::Unauthorized(format!("invalid X-User-Id header: {raw}")))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UploadUrlRequest {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[validate(range(min = 1))]
    pub file_size: i64,
    #[validate(length(min = 1, max = 100))]
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
pub struct UploadUrlResponse {
    pub upload_url: String,
    pub s3_key: String,
    pub bucket: String,
}

/// POST /api/v1/videos/upload-url
///
/// Issues a presigned PUT URL so the client uploads the source file straight
/// to the input bucket.
pub async fn get_upload_url(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<UploadUrlRequest>,
) -> Result<HttpResponse> {
    let user_id = user_from_request(&req)?;
    body.validate()?;
    object_store::validate_upload_extension(&body.file_name, ALLOWED_UPLOAD_EXTENSIONS)?;

    let s3_key = format!("uploads/{}/{}", user_id, body.file_name);
    let bucket = state.config.storage.input_bucket.clone();

    info!(user_id = %user_id, s3_key = %s3_key, "generating presigned upload URL");
    let upload_url = state
        .store
        .presign_put(&bucket, &s3_key, &body.mime_type, body.file_size, None)
        .await?;

    Ok(HttpResponse::Ok().json(UploadUrlResponse {
        upload_url,
        s3_key,
        bucket,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct VideoUploadInput {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[validate(range(min = 1))]
    pub file_size: i64,
    #[serde(default)]
    pub duration: i64,
    #[validate(length(min = 1, max = 20))]
    pub format: String,
    #[serde(default)]
    pub qualities: Vec<QualityInfo>,
    #[serde(default)]
    pub output_formats: Vec<PlaybackFormat>,
    #[serde(default)]
    pub enable_per_title_encoding: bool,
}

/// POST /api/v1/videos
///
/// Persists the video row and enqueues the encode job. Quality bounds are
/// filled from the per-resolution defaults and clamped before the job is
/// serialized; missing output formats default to HLS.
pub async fn create_video_job(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<VideoUploadInput>,
) -> Result<HttpResponse> {
    let user_id = user_from_request(&req)?;
    body.validate()?;
    object_store::validate_upload_extension(&body.file_name, ALLOWED_UPLOAD_EXTENSIONS)?;

    let input = body.into_inner();
    let qualities = normalize_qualities(input.qualities);
    let output_formats = if input.output_formats.is_empty() {
        vec![PlaybackFormat::Hls]
    } else {
        input.output_formats
    };

    let now = Utc::now();
    let video = VideoFile {
        video_id: Uuid::new_v4(),
        user_id,
        file_name: input.file_name.clone(),
        file_size: input.file_size,
        duration: input.duration,
        s3_key: format!("uploads/{}/{}", user_id, input.file_name),
        s3_bucket: state.config.storage.input_bucket.clone(),
        format: input.format,
        status: JobStatus::Queued,
        uploaded_at: now,
        updated_at: now,
    };
    let video = crate::db::video_repo::create_video(&state.db, &video).await?;

    let job = EncodeJob {
        job_id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        video_id: video.video_id.to_string(),
        input_s3_key: video.s3_key.clone(),
        input_bucket: state.config.storage.input_bucket.clone(),
        progress: 0.0,
        output_s3_key: format!("outputs/{}", video.video_id),
        output_bucket: state.config.storage.output_bucket.clone(),
        qualities,
        output_formats,
        enable_per_title_encoding: input.enable_per_title_encoding,
        status: JobStatus::Queued,
        started_at: None,
        completed_at: None,
    };
    state.queue.enqueue_job(&job).await?;

    info!(
        job_id = %job.job_id,
        video_id = %job.video_id,
        user_id = %user_id,
        "encode job enqueued"
    );
    Ok(HttpResponse::Created().json(job))
}

#[derive(Debug, Serialize)]
pub struct JobProgressResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: f64,
}

/// GET /api/v1/jobs/{job_id}
///
/// Status and progress come from the queue's progress hash. Terminal states
/// are mirrored onto the video row on read, so listings stay truthful
/// without giving the workers a database dependency.
pub async fn get_job_progress(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let job_id = path.into_inner();

    let job = state
        .queue
        .get_job(&job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))?;
    let progress = state.queue.get_progress(&job_id).await?.unwrap_or(0.0);

    if job.status.is_terminal() {
        if let Ok(video_id) = Uuid::parse_str(&job.video_id) {
            if let Err(e) =
                crate::db::video_repo::update_video_status(&state.db, video_id, job.status).await
            {
                tracing::warn!(video_id = %video_id, error = %e, "failed to mirror job status");
            }
        }
    }

    Ok(HttpResponse::Ok().json(JobProgressResponse {
        job_id,
        status: job.status,
        progress,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListVideosQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

/// GET /api/v1/videos
pub async fn list_videos(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListVideosQuery>,
) -> Result<HttpResponse> {
    let user_id = user_from_request(&req)?;
    let page_size = query.page_size.clamp(1, 100);

    let videos =
        crate::db::video_repo::list_videos(&state.db, user_id, query.page, page_size).await?;

    Ok(HttpResponse::Ok().json(videos))
}

/// GET /api/v1/videos/{video_id}
pub async fn get_video(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user_id = user_from_request(&req)?;
    let video_id = path.into_inner();

    let video = crate::db::video_repo::get_video(&state.db, video_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("video {video_id} not found")))?;

    Ok(HttpResponse::Ok().json(video))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_user_header_is_required_and_parsed() {
        let req = TestRequest::default().to_http_request();
        assert!(user_from_request(&req).is_err());

        let req = TestRequest::default()
            .insert_header(("X-User-Id", "not-a-uuid"))
            .to_http_request();
        assert!(user_from_request(&req).is_err());

        let user_id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header(("X-User-Id", user_id.to_string()))
            .to_http_request();
        assert_eq!(user_from_request(&req).unwrap(), user_id);
    }

    #[test]
    fn test_upload_request_validation() {
        let ok = UploadUrlRequest {
            file_name: "movie.mp4".to_string(),
            file_size: 1024,
            mime_type: "video/mp4".to_string(),
        };
        assert!(ok.validate().is_ok());

        let empty_name = UploadUrlRequest {
            file_name: String::new(),
            file_size: 1024,
            mime_type: "video/mp4".to_string(),
        };
        assert!(empty_name.validate().is_err());

        let zero_size = UploadUrlRequest {
            file_name: "movie.mp4".to_string(),
            file_size: 0,
            mime_type: "video/mp4".to_string(),
        };
        assert!(zero_size.validate().is_err());
    }

    #[test]
    fn test_video_input_defaults() {
        let input: VideoUploadInput = serde_json::from_value(serde_json::json!({
            "file_name": "movie.mp4",
            "file_size": 1024,
            "format": "mp4"
        }))
        .unwrap();
        assert!(input.validate().is_ok());
        assert!(input.qualities.is_empty());
        assert!(input.output_formats.is_empty());
        assert!(!input.enable_per_title_encoding);
    }
}
