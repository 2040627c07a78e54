//! HTTP API routes.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use coedit_core::{ModelConfig, SessionHandle, StartRequest};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use crate::error::{ApiError, INVALID_SESSION};
use crate::state::AppState;
use crate::ws;

/// Shown in place of a workspace path when none was given
pub const NO_REPOSITORY: &str = "No repository selected";

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Session lifecycle
        .route("/api/start_session", post(start_session))
        .route("/api/end_session", post(end_session))
        // Turns and workspace
        .route("/api/send_message", post(send_message))
        .route("/api/add_files", post(add_files))
        .route("/api/get_repo_files", post(get_repo_files))
        .route("/api/commit_changes", post(commit_changes))
        // Inspection
        .route("/api/get_output", post(get_output))
        .route("/api/get_history", post(get_history))
        .route("/api/session_info", post(session_info))
        // Push channel
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

fn lookup(state: &AppState, session_id: Option<&str>) -> Result<SessionHandle, ApiError> {
    let session_id = session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request(INVALID_SESSION))?;
    Ok(state.registry.lookup(session_id)?)
}

// ============ Health Check ============

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "coedit",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.registry.len(),
    }))
}

// ============ Session Lifecycle ============

#[derive(Debug, Deserialize)]
struct StartSessionRequest {
    #[serde(default)]
    model_name: Option<String>,
    #[serde(default)]
    repo_path: Option<String>,
    #[serde(default)]
    model_config: Option<ModelConfig>,
}

async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let info = state
        .registry
        .start(StartRequest {
            model_name: request.model_name,
            workspace_path: request
                .repo_path
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            model_config: request.model_config,
        })
        .await?;

    Ok(Json(json!({
        "status": "success",
        "session_id": info.session_id,
        "model": info.model,
        "edit_format": info.edit_format,
        "repo_path": info.workspace.unwrap_or_else(|| NO_REPOSITORY.to_string()),
    })))
}

#[derive(Debug, Deserialize)]
struct SessionRequest {
    #[serde(default)]
    session_id: Option<String>,
}

async fn end_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> impl IntoResponse {
    if let Some(id) = request.session_id.as_deref() {
        state.registry.remove(id);
    }
    Json(json!({ "status": "success" }))
}

// ============ Turns and Workspace ============

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    message: String,
}

async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = lookup(&state, request.session_id.as_deref())?;
    let mut session = handle.lock().await;
    let response = session.send_message(&request.message).await?;

    Ok(Json(json!({
        "status": "success",
        "response": response,
    })))
}

#[derive(Debug, Deserialize)]
struct AddFilesRequest {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    file_paths: Vec<String>,
}

async fn add_files(
    State(state): State<AppState>,
    Json(request): Json<AddFilesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = lookup(&state, request.session_id.as_deref())?;
    let mut session = handle.lock().await;
    let added = session.add_files(&request.file_paths).await;

    Ok(Json(json!({
        "status": "success",
        "added_files": added,
    })))
}

async fn get_repo_files(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = lookup(&state, request.session_id.as_deref())?;
    let session = handle.lock().await;
    let files = session.list_repo_files().await?;

    if files.is_empty() {
        return Err(ApiError::bad_request(
            "No repository is associated with this session or no files found",
        ));
    }

    Ok(Json(json!({
        "status": "success",
        "files": files,
    })))
}

#[derive(Debug, Deserialize)]
struct CommitRequest {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    commit_message: String,
}

async fn commit_changes(
    State(state): State<AppState>,
    Json(request): Json<CommitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = lookup(&state, request.session_id.as_deref())?;
    let session = handle.lock().await;

    let Some(commit_hash) = session.commit(&request.commit_message).await? else {
        return Err(ApiError::bad_request(
            "No repository is associated with this session or no changes to commit",
        ));
    };

    info!(session_id = %session.id(), commit = %commit_hash, "Committed session changes");
    Ok(Json(json!({
        "status": "success",
        "commit_hash": commit_hash,
        "message": format!("Changes committed with hash: {}", commit_hash),
    })))
}

// ============ Inspection ============

async fn get_output(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = lookup(&state, request.session_id.as_deref())?;
    let output = handle.lock().await.drain_output();

    Ok(Json(json!({
        "status": "success",
        "output": output,
    })))
}

async fn get_history(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = lookup(&state, request.session_id.as_deref())?;
    let session = handle.lock().await;

    Ok(Json(json!({
        "status": "success",
        "messages": session.history(),
    })))
}

async fn session_info(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = lookup(&state, request.session_id.as_deref())?;
    let info = handle.lock().await.info();

    Ok(Json(json!({
        "status": "success",
        "session": info,
    })))
}
