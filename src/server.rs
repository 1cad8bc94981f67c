use anyhow::Context;
use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::routes;
use crate::storage::StorageConfig;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub api_token: String,
    pub gemini_api_key: Option<String>,
    pub storage: Option<StorageConfig>,
    pub http: reqwest::Client,
}

pub async fn serve(pool: PgPool, config: Config) -> anyhow::Result<()> {
    let api_token = config
        .api_token
        .context("API_TOKEN must be set to serve the HTTP API")?;

    let state = AppState {
        pool,
        api_token,
        gemini_api_key: config.gemini_api_key,
        storage: config.storage,
        http: reqwest::Client::new(),
    };

    // The admin console is a browser client on another origin; mirror the
    // permissive CORS of the functions it replaces.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    let app = Router::new()
        .route("/seniors", get(routes::list_seniors).post(routes::create_senior))
        .route(
            "/seniors/:id",
            axum::routing::put(routes::update_senior).delete(routes::delete_senior),
        )
        .route(
            "/schedules",
            get(routes::list_schedules).post(routes::create_schedule),
        )
        .route(
            "/schedules/:id",
            axum::routing::put(routes::update_schedule).delete(routes::delete_schedule),
        )
        .route("/results", post(routes::upload_results))
        .route(
            "/reports",
            get(routes::list_reports).post(routes::generate_report),
        )
        .route("/monitoring", get(routes::monitoring_snapshot))
        .route("/dashboard", get(routes::dashboard_snapshot))
        .layer(cors)
        .with_state(state);

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("admin API listening on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
