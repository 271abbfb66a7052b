//! EduPredict Backend Server
//!
//! Student records for teachers, plus pass/fail prediction through an
//! external model script.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     EDUPREDICT SERVER                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌───────────┐  ┌─────────────────────────┐ │
//! │  │  API      │  │  Auth     │  │  Predictor              │ │
//! │  │  (Axum)   │  │  (JWT)    │  │  (child process)        │ │
//! │  └─────┬─────┘  └─────┬─────┘  └────────────┬────────────┘ │
//! │        └──────────────┼─────────────────────┘              │
//! │                       ▼                                     │
//! │                ┌─────────────┐                             │
//! │                │ PostgreSQL  │                             │
//! │                └─────────────┘                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;
mod models;
mod handlers;
mod middleware;
mod error;
mod predictor;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
    middleware as axum_middleware,
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::net::SocketAddr;

pub use error::{AppError, AppResult};
use predictor::Predictor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging
    let json_logs = config.log_format == "json";
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "edupredict_server=debug,tower_http=debug".into()))
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    config.validate()?;

    tracing::info!("EduPredict Server starting...");
    tracing::info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));

    // Initialize database pool
    let pool = db::create_pool(&config.database_url).await
        .context("Failed to create database pool")?;

    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await
        .context("Failed to run migrations")?;

    let predictor = Predictor::new(config.predictor()?);
    match predictor.probe().await {
        Ok(version) => tracing::info!("Prediction interpreter: {}", version),
        // Not fatal: the interpreter may be installed later; each request re-checks
        Err(e) => tracing::warn!("{}", e),
    }

    let state = AppState {
        pool,
        config: config.clone(),
        predictor,
    };

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub config: config::Config,
    pub predictor: Predictor,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/v1/auth/register", post(handlers::auth::register))
        .route("/api/v1/auth/login", post(handlers::auth::login));

    // Teacher routes (JWT auth)
    let teacher_routes = Router::new()
        // Students
        .route("/api/v1/students", get(handlers::students::list).post(handlers::students::create))
        .route(
            "/api/v1/students/:id",
            get(handlers::students::get)
                .put(handlers::students::update)
                .delete(handlers::students::delete),
        )

        // Prediction history
        .route("/api/v1/students/:id/predictions", get(handlers::students::predictions))
        .route("/api/v1/students/:id/predictions/trend", get(handlers::students::prediction_trend))

        // Prediction
        .route("/api/v1/predict/:student_id", post(handlers::predict::predict_student_result))

        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_teacher_auth
        ));

    Router::new()
        .merge(public_routes)
        .merge(teacher_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
