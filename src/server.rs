use std::io::ErrorKind;
use std::sync::Arc;

use axum::{
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use hyper::Server;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::constants::REPORT_FILE;
use crate::pipeline::report::generate_report;

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "event-insights",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn index() -> impl IntoResponse {
    Html(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <title>Event Data Analysis Report</title>
  </head>
  <body>
    <h1>Event Data Analysis Report</h1>
    <button id="generate">Generate report</button>
    <a href="/download_report">Download report</a>
    <p id="status"></p>
    <script>
      document.getElementById('generate').onclick = async () => {
        const status = document.getElementById('status');
        status.textContent = 'Generating...';
        const res = await fetch('/generate_report', { method: 'POST' });
        const body = await res.json();
        status.textContent = body.message;
      };
    </script>
  </body>
</html>"#,
    )
}

/// Run one report job. Jobs are serialised by `lock` and executed on the
/// blocking pool.
async fn run_report_job(config: Arc<AppConfig>, lock: Arc<Mutex<()>>) -> axum::response::Response {
    let _guard = lock.lock().await;
    let job = tokio::task::spawn_blocking(move || generate_report(&config)).await;
    match job {
        Ok(Ok(handle)) => Json(serde_json::json!({
            "status": "success",
            "message": "Report generated successfully",
            "report": handle,
        }))
        .into_response(),
        Ok(Err(e)) => {
            error!("Error generating report: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "status": "error", "message": e.to_string() })),
            )
                .into_response()
        }
        Err(e) => {
            error!("Report job panicked or was cancelled: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "status": "error", "message": "report job did not complete" })),
            )
                .into_response()
        }
    }
}

async fn download_report(config: Arc<AppConfig>) -> axum::response::Response {
    match tokio::fs::read(config.report_path()).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", REPORT_FILE),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "Report file not found").into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Create the HTTP server with all routes
pub fn create_server(config: AppConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let config = Arc::new(config);
    let job_lock = Arc::new(Mutex::new(()));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route(
            "/generate_report",
            post({
                let config = config.clone();
                let lock = job_lock.clone();
                move || run_report_job(config.clone(), lock.clone())
            }),
        )
        .route(
            "/download_report",
            get({
                let config = config.clone();
                move || download_report(config.clone())
            }),
        )
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the configured bind address
pub async fn start_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.server.bind;
    let app = create_server(config);

    info!(%addr, "HTTP server listening");
    println!("🚀 HTTP server running on http://{addr}");
    println!("💚 Health check: http://{addr}/health");

    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
