//! Video file persistence
//!
//! Hand-written queries over the `video_files` table; statuses mirror the
//! job lifecycle so the row always reflects the latest queue state.

use sqlx::PgPool;
use uuid::Uuid;
use video_core::{JobStatus, VideoFile};

pub async fn create_video(pool: &PgPool, video: &VideoFile) -> Result<VideoFile, sqlx::Error> {
    sqlx::query_as::<_, VideoFile>(
        r#"
        INSERT INTO video_files
            (video_id, user_id, file_name, file_size, duration, s3_key, s3_bucket, format, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(video.video_id)
    .bind(video.user_id)
    .bind(&video.file_name)
    .bind(video.file_size)
    .bind(video.duration)
    .bind(&video.s3_key)
    .bind(&video.s3_bucket)
    .bind(&video.format)
    .bind(video.status)
    .fetch_one(pool)
    .await
}

pub async fn get_video(
    pool: &PgPool,
    video_id: Uuid,
    user_id: Uuid,
) -> Result<Option<VideoFile>, sqlx::Error> {
    sqlx::query_as::<_, VideoFile>(
        "SELECT * FROM video_files WHERE video_id = $1 AND user_id = $2",
    )
    .bind(video_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn update_video_status(
    pool: &PgPool,
    video_id: Uuid,
    status: JobStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE video_files SET status = $2, updated_at = NOW() WHERE video_id = $1")
        .bind(video_id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_videos(
    pool: &PgPool,
    user_id: Uuid,
    page: i64,
    page_size: i64,
) -> Result<Vec<VideoFile>, sqlx::Error> {
    let offset = (page.max(1) - 1) * page_size;
    sqlx::query_as::<_, VideoFile>(
        r#"
        SELECT * FROM video_files
        WHERE user_id = $1
        ORDER BY uploaded_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(page_size)
    .bind(offset)
    .fetch_all(pool)
    .await
}
