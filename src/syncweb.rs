use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Json},
    routing::{get, post},
    Form, Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::{
    api_errors::AppError,
    app_state::AppState,
    bootstrap::{list_data_files, resolve_data_file},
    consent::ConsentSubmission,
    errors::SyncError,
    log_sink::{AnalysisEvent, ChatEntry},
    record_store::UserRecord,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub user_id: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessStatusForm {
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddUserForm {
    pub username: String,
    pub password: String,
    pub status: String,
    pub expiry: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatForm {
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisForm {
    pub user_id: String,
    pub engine: String,
    pub method: String,
    pub status: String,
    pub download: String,
    pub report: String,
}

/// Build the router exposing the sync endpoints and health check
pub fn build_sync_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        // consent
        .route("/consent", post(record_consent))
        .route("/analyze", post(analyze))
        // user access records
        .route("/access-status", post(access_status))
        .route("/add-user", post(add_user))
        // event logs
        .route("/log-chat", post(log_chat))
        .route("/log-analysis", post(log_analysis))
        // raw data files
        .route("/admin-data", get(admin_data))
        .route("/admin-data/{file}", get(download_data_file))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Harmony Sync Server is running." }))
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn record_consent(
    State(st): State<Arc<AppState>>,
    Json(req): Json<ConsentSubmission>,
) -> Result<Json<Value>, AppError> {
    match req.validate() {
        Ok(()) => {}
        // Incomplete forms answer 200 with an error status so form clients can show the message.
        Err(SyncError::Validation { field, message }) if field == "consent" => {
            tracing::warn!(user_id = %req.user_id, "incomplete consent submission");
            return Ok(Json(json!({ "status": "error", "message": message })));
        }
        Err(e) => return Err(e.into()),
    }

    let entry = req.into_entry(Local::now().naive_local(), &st.device);
    st.logs.append_consent(&entry)?;

    Ok(Json(json!({ "status": "success", "message": "Consent recorded." })))
}

async fn analyze(
    State(st): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Json<Value> {
    if !st.consent.has_consented(&req.user_id) {
        tracing::info!(user_id = %req.user_id, "analysis refused without consent");
        return Json(json!({
            "status": "error",
            "message": "Consent not found. Please complete the consent form first."
        }));
    }

    Json(json!({
        "status": "success",
        "message": "Consent verified. Proceeding with analysis."
    }))
}

async fn access_status(
    State(st): State<Arc<AppState>>,
    Form(req): Form<AccessStatusForm>,
) -> Result<Json<Value>, AppError> {
    match st.records.lookup(&req.user_id) {
        Ok(record) => Ok(Json(json!({
            "access": record.status,
            "expiry": record.expiry
        }))),
        Err(SyncError::NotFound { .. }) => {
            Ok(Json(json!({ "access": "error", "reason": "user not found" })))
        }
        Err(SyncError::StorageUnavailable { .. }) => {
            Ok(Json(json!({ "access": "error", "reason": "user file not found" })))
        }
        Err(e) => Err(e.into()),
    }
}

async fn add_user(
    State(st): State<Arc<AppState>>,
    Form(req): Form<AddUserForm>,
) -> Result<Json<Value>, AppError> {
    let record = UserRecord::new(req.username, req.password, req.status, req.expiry);
    st.records.upsert(&record)?;

    Ok(Json(json!({ "status": "success", "message": "User added or updated." })))
}

async fn log_chat(
    State(st): State<Arc<AppState>>,
    Form(req): Form<ChatForm>,
) -> Result<Json<Value>, AppError> {
    st.logs.append_chat(&ChatEntry::now(req.user_id, &req.message))?;
    Ok(Json(json!({ "status": "chat logged" })))
}

async fn log_analysis(
    State(st): State<Arc<AppState>>,
    Form(req): Form<AnalysisForm>,
) -> Result<Json<Value>, AppError> {
    let entry = AnalysisEvent {
        user_id: req.user_id,
        engine: req.engine,
        method: req.method,
        status: req.status,
        download_flag: req.download,
        report_flag: req.report,
    }
    .now();
    st.logs.append_analysis(&entry)?;
    Ok(Json(json!({ "status": "analysis logged" })))
}

async fn admin_data(State(st): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    match list_data_files(&st.paths.root) {
        Ok(files) => Ok(Json(json!({ "files": files }))),
        Err(SyncError::StorageUnavailable { .. }) => {
            Ok(Json(json!({ "error": "admin_data folder not found" })))
        }
        Err(e) => Err(e.into()),
    }
}

async fn download_data_file(
    State(st): State<Arc<AppState>>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let path = resolve_data_file(&st.paths.root, &file)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::from(SyncError::storage("reading data file", e)))?;

    tracing::info!(file = %file, size = bytes.len(), "data file downloaded");
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file}\""),
            ),
        ],
        bytes,
    ))
}
