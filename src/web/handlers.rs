//! HTTP request handlers.
//!
//! Blocking work (subprocesses, file I/O) runs on the blocking pool. Status
//! is always answered with 200; mutating endpoints answer 4xx for bad
//! requests and 5xx for backend faults, both as `{ok: false, error}`. The
//! settings form gets `{ok: false, errors}` instead.

use super::AppState;
use crate::actions::{self, ActionOutcome};
use crate::config::DashboardConfig;
use crate::error::{SettingsError, SourceError};
use crate::settings::{self, SettingsStore};
use crate::sources::{NewSource, SourceRegistry};
use crate::status::StatusPayload;

use axum::{
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

const DASHBOARD_TEMPLATE: &str = include_str!("templates/dashboard.html");

// ============================================================================
// Errors
// ============================================================================

/// `{ok: false, error}` response with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "ok": false, "error": self.message })),
        )
            .into_response()
    }
}

impl From<SourceError> for ApiError {
    fn from(err: SourceError) -> Self {
        match &err {
            SourceError::NotFound(_) => Self {
                status: StatusCode::NOT_FOUND,
                message: err.to_string(),
            },
            SourceError::Duplicate(_) | SourceError::Active(_) => Self {
                status: StatusCode::CONFLICT,
                message: err.to_string(),
            },
            _ if err.is_user_error() => Self::bad_request(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<SettingsError> for ApiError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Invalid(_) => Self::bad_request(err.to_string()),
            SettingsError::Io { .. } => Self::internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

/// Runs `work` on the blocking pool with a handle on the config.
async fn blocking<T, F>(config: &Arc<DashboardConfig>, work: F) -> Result<T, ApiError>
where
    F: FnOnce(&DashboardConfig) -> T + Send + 'static,
    T: Send + 'static,
{
    let config = Arc::clone(config);
    tokio::task::spawn_blocking(move || work(&config))
        .await
        .map_err(|err| ApiError::internal(format!("Background task failed: {err}")))
}

async fn run_action<F>(state: &AppState, action: F) -> Response
where
    F: FnOnce(&DashboardConfig) -> ActionOutcome + Send + 'static,
{
    match blocking(&state.config, action).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => err.into_response(),
    }
}

// ============================================================================
// Dashboard
// ============================================================================

pub async fn handle_dashboard() -> impl IntoResponse {
    Html(DASHBOARD_TEMPLATE)
}

// ============================================================================
// API: Status
// ============================================================================

pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let reconciler = state.reconciler.clone();
    let payload = match tokio::task::spawn_blocking(move || reconciler.collect()).await {
        Ok(payload) => payload,
        Err(err) => StatusPayload::degraded(&state.config, err.to_string()),
    };
    Json(payload)
}

// ============================================================================
// API: Actions
// ============================================================================

pub async fn handle_run_check(State(state): State<AppState>) -> Response {
    run_action(&state, actions::run_deep_check).await
}

pub async fn handle_sync_now(State(state): State<AppState>) -> Response {
    run_action(&state, actions::sync_now).await
}

pub async fn handle_update(State(state): State<AppState>) -> Response {
    run_action(&state, actions::run_update).await
}

pub async fn handle_restart_pf(State(state): State<AppState>) -> Response {
    run_action(&state, actions::restart_pf).await
}

pub async fn handle_restart_web(State(state): State<AppState>) -> Response {
    run_action(&state, actions::restart_web).await
}

// ============================================================================
// API: Settings
// ============================================================================

pub async fn handle_get_config(State(state): State<AppState>) -> Result<Response, ApiError> {
    let view = blocking(&state.config, |config| {
        SettingsStore::new(config.paths.settings_file()).view()
    })
    .await??;
    Ok(Json(json!({
        "ok": true,
        "exists": view.exists,
        "config": view.config,
        "schema": settings::settings_schema(),
        "config_path": view.config_path
    }))
    .into_response())
}

/// `{ok: false, errors}` response used by the settings form.
fn settings_rejected(status: StatusCode, errors: Vec<String>) -> Response {
    (status, Json(json!({ "ok": false, "errors": errors }))).into_response()
}

/// Settings values arrive as JSON scalars; the file stores them as text.
fn setting_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Saves a flat `{KEY: value}` map into the settings file.
pub async fn handle_set_config(
    State(state): State<AppState>,
    body: Result<Json<BTreeMap<String, Value>>, JsonRejection>,
) -> Response {
    let submitted = match body {
        Ok(Json(submitted)) => submitted,
        Err(rejection) => return settings_rejected(rejection.status(), vec![rejection.body_text()]),
    };

    let mut updates = BTreeMap::new();
    let mut errors = Vec::new();
    for (key, value) in submitted {
        match setting_text(&value) {
            Some(text) => {
                updates.insert(key, text);
            }
            None => errors.push(format!("{key}: value must be a string, number or boolean")),
        }
    }
    if !errors.is_empty() {
        return settings_rejected(StatusCode::BAD_REQUEST, errors);
    }

    let written = blocking(&state.config, move |config| {
        SettingsStore::new(config.paths.settings_file()).write(&updates)
    })
    .await;
    match written {
        Ok(Ok(warnings)) => Json(json!({ "ok": true, "warnings": warnings })).into_response(),
        Ok(Err(SettingsError::Invalid(errors))) => {
            settings_rejected(StatusCode::BAD_REQUEST, errors)
        }
        Ok(Err(err)) => settings_rejected(StatusCode::INTERNAL_SERVER_ERROR, vec![err.to_string()]),
        Err(err) => settings_rejected(err.status, vec![err.message]),
    }
}

/// Settings file as a plain-text download.
pub async fn handle_export_config(State(state): State<AppState>) -> Result<Response, ApiError> {
    let exported = blocking(&state.config, |config| {
        SettingsStore::new(config.paths.settings_file()).export()
    })
    .await??;
    let Some(content) = exported else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No config to export" })),
        )
            .into_response());
    };

    let disposition = format!("attachment; filename={}", settings::export_filename());
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct TestRemoteRequest {
    #[serde(default)]
    pub remote: String,
}

pub async fn handle_test_remote(
    State(state): State<AppState>,
    body: Result<Json<TestRemoteRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    if req.remote.trim().is_empty() {
        return Err(ApiError::bad_request("No remote specified"));
    }
    let result = blocking(&state.config, move |config| {
        actions::test_remote(config, &req.remote)
    })
    .await?;
    Ok(Json(result).into_response())
}

// ============================================================================
// API: Sources
// ============================================================================

pub async fn handle_get_sources(State(state): State<AppState>) -> Result<Response, ApiError> {
    let sources = blocking(&state.config, |config| SourceRegistry::from_config(config).list())
        .await??;
    let active = sources
        .iter()
        .find(|source| source.active)
        .map(|source| source.id.clone());
    Ok(Json(json!({ "ok": true, "sources": sources, "active": active })).into_response())
}

pub async fn handle_create_source(
    State(state): State<AppState>,
    body: Result<Json<NewSource>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    let source = blocking(&state.config, move |config| {
        SourceRegistry::from_config(config).create(req)
    })
    .await??;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "ok": true, "source": source })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct SourceIdRequest {
    #[serde(default, alias = "source_id")]
    pub id: String,
}

pub async fn handle_delete_source(
    State(state): State<AppState>,
    body: Result<Json<SourceIdRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    blocking(&state.config, move |config| {
        SourceRegistry::from_config(config).delete(&req.id)
    })
    .await??;
    Ok(Json(json!({ "ok": true })).into_response())
}

pub async fn handle_set_active_source(
    State(state): State<AppState>,
    body: Result<Json<SourceIdRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    let outcome = blocking(&state.config, move |config| {
        actions::set_active_source(config, &req.id)
    })
    .await??;
    Ok(Json(outcome).into_response())
}

// ============================================================================
// API: Frame
// ============================================================================

pub async fn handle_get_frame_live(State(state): State<AppState>) -> Result<Response, ApiError> {
    let live = blocking(&state.config, actions::frame_live).await?;
    Ok(Json(live).into_response())
}

#[derive(Debug, Deserialize)]
pub struct FrameLiveRequest {
    pub live: bool,
}

pub async fn handle_set_frame_live(
    State(state): State<AppState>,
    body: Result<Json<FrameLiveRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    Ok(run_action(&state, move |config| actions::set_frame_live(config, req.live)).await)
}
