use std::fs;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::Value;
use tempfile::tempdir;
use tower::ServiceExt;

use event_insights::config::AppConfig;
use event_insights::server::create_server;

const CSV: &str = "Event Name,Event Type,Event Organizer,Event Date,Attendee Name,Attendee Age,Attendee Gender,Attendee Contact Information,Attendee Location,Ticket ID,Ticket Type,Ticket Price,Event Duration
EventA,Rock,OrgX,2024-08-01,Ann,25,Male,ann@example.com,Colombo,T1,VIP,100,3
EventA,Rock,OrgX,2024-08-02,Ben,30,Female,ben@example.com,Colombo,T2,General,900,3
EventB,Jazz,OrgY,2024-09-05,Cal,,Other,,Kandy,T3,General,50,2
";

fn config_in(dir: &std::path::Path) -> AppConfig {
    AppConfig {
        input_path: dir.join("event.csv"),
        output_dir: dir.join("out"),
        ..AppConfig::default()
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempdir().unwrap();
    let response = create_server(config_in(dir.path())).oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "event-insights");
}

#[tokio::test]
async fn test_download_before_generation_is_not_found() {
    let dir = tempdir().unwrap();
    let response = create_server(config_in(dir.path()))
        .oneshot(get("/download_report"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    assert_eq!(&bytes[..], b"Report file not found");
}

#[tokio::test]
async fn test_generate_with_missing_input_reports_error() {
    let dir = tempdir().unwrap();
    let response = create_server(config_in(dir.path()))
        .oneshot(post("/generate_report"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("event.csv"));
}

#[tokio::test]
async fn test_generate_then_download() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("event.csv"), CSV).unwrap();
    let app = create_server(config_in(dir.path()));

    let response = app.clone().oneshot(post("/generate_report")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Report generated successfully");
    assert_eq!(body["report"]["cleaning"]["rows_out"], 3);

    let response = app.oneshot(get("/download_report")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains("event_data_analysis_report.md"));
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let markdown = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(markdown.starts_with("# CeylonEvent Analysis Report"));
}
