//! Ingestion Service - HTTP server
//!
//! Accepts upload descriptors, enqueues encode jobs, and serves job status.

use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer};
use ingestion_service::{configure_routes, AppState, Config};
use job_queue::{JobQueue, QueueConfig};
use object_store::{get_s3_client, ObjectStore};
use redis_utils::RedisPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ingestion_service=info".parse().expect("valid directive")),
        )
        .init();

    info!("Starting Ingestion Service");

    dotenvy::dotenv().ok();
    let config = Arc::new(Config::from_env().expect("Failed to load configuration"));

    // Postgres: video_files metadata rows
    let db_config = db_pool::DbConfig {
        service_name: "ingestion-service".to_string(),
        database_url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..db_pool::DbConfig::default()
    };
    db_config.log_config();
    let db = db_pool::create_pool(db_config)
        .await
        .expect("Failed to create database pool");
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("Failed to run database migrations");

    // Redis: job queue + notifications
    let redis_pool = RedisPool::connect(&config.queue.redis_url)
        .await
        .expect("Failed to connect to Redis");
    let queue = JobQueue::new(
        redis_pool.manager(),
        QueueConfig {
            queue_key: config.queue.job_queue_key.clone(),
            notify_channel: config.queue.notify_channel.clone(),
            lease_ttl: Duration::from_secs(config.queue.lease_ttl_secs),
        },
    );

    // S3: presigned uploads target the input bucket
    let store = ObjectStore::new(get_s3_client(&config.storage.s3).await);
    store
        .health_check(&config.storage.input_bucket)
        .await
        .expect("S3 input bucket must be reachable");

    let state = AppState {
        db,
        queue,
        store,
        config: config.clone(),
    };

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    info!(address = %bind_address, "Ingestion Service listening");

    let allowed_origins = config.cors.allowed_origins.clone();
    HttpServer::new(move || {
        let cors = if allowed_origins.iter().any(|o| o == "*") {
            Cors::permissive()
        } else {
            let mut cors = Cors::default()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);
            for origin in &allowed_origins {
                cors = cors.allowed_origin(origin);
            }
            cors
        };

        App::new()
            .wrap(TracingLogger::default())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .route(
                "/api/v1/health",
                web::get().to(|| async {
                    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
                }),
            )
            .route(
                "/api/v1/health/ready",
                web::get().to(|| async { HttpResponse::Ok().finish() }),
            )
            .route(
                "/api/v1/health/live",
                web::get().to(|| async { HttpResponse::Ok().finish() }),
            )
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
