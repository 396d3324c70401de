#[path = "common/mod.rs"]
mod common;

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json,
    body::to_bytes,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::Fixture;
use framestat::config::DashboardConfig;
use framestat::sources::NewSource;
use framestat::web::{self, AppState, SourceIdRequest, TestRemoteRequest};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn state(config: DashboardConfig) -> State<AppState> {
    State(AppState::new(Arc::new(config)))
}

async fn body_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    (status, serde_json::from_slice(&bytes).expect("body is JSON"))
}

#[tokio::test]
async fn status_is_always_200() {
    let fixture = Fixture::new();

    let response = web::handle_status(state(fixture.config())).await.into_response();
    let (status, body) = body_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["overall"]["severity"], "ERROR");
    assert!(body["debug"]["quick_check_error"].is_string());
}

#[tokio::test]
async fn run_check_passes_deep_flag() {
    let fixture = Fixture::new();
    fixture.script("app/ops_tools/chk_sync.sh", "echo \"deep mode $1\"");

    let response = web::handle_run_check(state(fixture.config())).await;
    let (status, body) = body_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["output"].as_str().unwrap().trim(), "deep mode --d");
}

#[tokio::test]
async fn failed_restart_reports_ok_false() {
    let fixture = Fixture::new();
    let script = fixture.script("bin/restart-web", "echo 'unit not loaded' >&2\nexit 5");
    let mut config = fixture.config();
    config.services.restart_web_command = Some(vec![script.display().to_string()]);

    let response = web::handle_restart_web(state(config)).await;
    let (status, body) = body_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
    assert!(body["output"].as_str().unwrap().contains("unit not loaded"));
}

fn flat(value: Value) -> Result<Json<BTreeMap<String, Value>>, JsonRejection> {
    Ok(Json(serde_json::from_value(value).unwrap()))
}

#[tokio::test]
async fn settings_round_trip_and_validation() {
    let fixture = Fixture::new();
    let config = fixture.config();

    let response = web::handle_set_config(
        state(config.clone()),
        flat(json!({ "AUTO_UPDATE_ENABLED": true, "AUTO_UPDATE_HOUR": 4, "SLIDE_TIME": "30" })),
    )
    .await;
    let (status, body) = body_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["warnings"], json!(["SLIDE_TIME: not a known setting; stored as-is"]));

    let response = web::handle_get_config(state(config.clone()))
        .await
        .into_response();
    let (status, body) = body_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exists"], true);
    assert_eq!(body["config"]["AUTO_UPDATE_ENABLED"], "true");
    assert_eq!(body["config"]["AUTO_UPDATE_HOUR"], "4");
    assert_eq!(body["schema"]["AUTO_UPDATE_FREQUENCY"]["default"], "monthly");
    assert_eq!(body["schema"]["AUTO_UPDATE_MINUTE"]["type"], "integer");

    let response = web::handle_set_config(
        state(config),
        flat(json!({ "not-a-key": "x", "AUTO_UPDATE_HOUR": 25 })),
    )
    .await;
    let (status, body) = body_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].as_str().unwrap().starts_with("AUTO_UPDATE_HOUR"));
    assert!(errors[1].as_str().unwrap().contains("not-a-key"));
}

#[tokio::test]
async fn nested_setting_values_are_rejected() {
    let fixture = Fixture::new();

    let response =
        web::handle_set_config(state(fixture.config()), flat(json!({ "SLIDE_TIME": [1, 2] })))
            .await;
    let (status, body) = body_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"][0].as_str().unwrap().starts_with("SLIDE_TIME"));
}

#[tokio::test]
async fn unwritable_settings_file_is_500_with_errors() {
    let fixture = Fixture::new();
    std::fs::create_dir_all(fixture.root().join("app/config/picframe.conf")).unwrap();

    let response =
        web::handle_set_config(state(fixture.config()), flat(json!({ "AUTO_UPDATE_DAY": "1" })))
            .await;
    let (status, body) = body_json(response).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["ok"], false);
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn export_downloads_settings_as_text() {
    let fixture = Fixture::new();
    let config = fixture.config();

    let response = web::handle_export_config(state(config.clone()))
        .await
        .into_response();
    let (status, body) = body_json(response).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "No config to export" }));

    fixture.write("app/config/picframe.conf", "# hand edited\nSLIDE_TIME=30\n");
    let response = web::handle_export_config(state(config))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(headers["content-type"].to_str().unwrap().starts_with("text/plain"));
    let disposition = headers["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=picframe-config-"));
    assert!(disposition.ends_with(".txt"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"# hand edited\nSLIDE_TIME=30\n");
}

#[tokio::test]
async fn source_crud_maps_errors_to_status_codes() {
    let fixture = Fixture::new();
    let config = fixture.config();
    let new_source = || NewSource {
        id: "kfr".into(),
        label: "Koofr".into(),
        path: "/home/pi/Pictures/kfr".into(),
        enabled: true,
        remote: Some("kfr_frame:photos".into()),
    };

    let response = web::handle_create_source(state(config.clone()), Ok(Json(new_source())))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = web::handle_create_source(state(config.clone()), Ok(Json(new_source())))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = web::handle_get_sources(state(config.clone()))
        .await
        .into_response();
    let (_, body) = body_json(response).await;
    assert_eq!(body["sources"][0]["id"], "kfr");
    assert_eq!(body["active"], Value::Null);

    let response = web::handle_set_active_source(
        state(config.clone()),
        Ok(Json(SourceIdRequest { id: "nope".into() })),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = web::handle_delete_source(
        state(config.clone()),
        Ok(Json(SourceIdRequest { id: "kfr".into() })),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let response = web::handle_delete_source(
        state(config),
        Ok(Json(SourceIdRequest { id: String::new() })),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blank_remote_test_is_bad_request() {
    let fixture = Fixture::new();

    let response = web::handle_test_remote(
        state(fixture.config()),
        Ok(Json(TestRemoteRequest {
            remote: "  ".into(),
        })),
    )
    .await
    .into_response();
    let (status, body) = body_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No remote specified");
}

async fn raw_request(addr: std::net::SocketAddr, request: &str) -> String {
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn router_serves_status_and_legacy_check_alias() {
    let fixture = Fixture::new();
    fixture.check_script("Remote file count: 2\nLocal file count: 2", 0);
    let app = web::router(AppState::new(Arc::new(fixture.config())));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let response = raw_request(
        addr,
        "GET /api/status HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("\"severity\":\"OK\""));

    let response = raw_request(
        addr,
        "POST /api/run-chk-syncd HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("\"ok\":true"));

    let response = raw_request(
        addr,
        "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.contains("Frame Sync Status"));
}
