//! HTTP transport - JSON endpoints over the task engine
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use crate::command::Parameters;
use crate::engine::TaskEngine;
use crate::error::MediaTaskError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use vidforge_types::{MediaFile, ProfileSummary, StatusRecord, TaskAccepted};

/// Shared handler state
pub type AppState = Arc<TaskEngine>;

/// Error body returned by every endpoint
#[derive(Debug)]
pub struct ApiError(MediaTaskError);

impl From<MediaTaskError> for ApiError {
    fn from(err: MediaTaskError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            MediaTaskError::UnknownProfile(_) | MediaTaskError::InputNotFound(_) => StatusCode::NOT_FOUND,
            MediaTaskError::MissingParameter { .. }
            | MediaTaskError::InvalidProfileKey(_)
            | MediaTaskError::InvalidTemplate { .. }
            | MediaTaskError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        } else {
            warn!(error = %self.0, "Request rejected");
        }
        let body = json!({
            "status": "error",
            "msg": self.0.user_message(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct AddProfileRequest {
    pub key: String,
    /// Argument tokens; takes precedence over `command`
    #[serde(default)]
    pub template: Option<Vec<String>>,
    /// Whitespace-separated command line
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct TranscodeRequest {
    pub profile: String,
    /// Input path relative to the media root
    pub input: String,
    #[serde(default)]
    pub params: Parameters,
}

#[derive(Debug, Default, Deserialize)]
pub struct MediaQuery {
    #[serde(default)]
    pub probe: bool,
}

/// Build the application router
pub fn router(engine: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/profiles", get(list_profiles).post(add_profile))
        .route("/api/profiles/:key/parameters", get(profile_parameters))
        .route("/api/media", get(list_media))
        .route("/api/media/*path", delete(delete_media))
        .route("/api/tasks/download", post(submit_download))
        .route("/api/tasks/transcode", post(submit_transcode))
        .route("/api/tasks/:task_id", get(task_status))
        .with_state(engine)
}

/// HTTP server exposing the engine
pub struct ApiServer {
    engine: AppState,
    port: u16,
}

impl ApiServer {
    pub fn new(engine: AppState, port: u16) -> Self {
        Self { engine, port }
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn start(self) -> anyhow::Result<()> {
        let app = router(self.engine);

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind HTTP server to {}: {}", addr, e))?;

        info!(port = self.port, "HTTP server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "media-tasks",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn list_profiles(State(engine): State<AppState>) -> Json<Vec<ProfileSummary>> {
    Json(engine.list_profiles().await)
}

pub async fn profile_parameters(
    State(engine): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let parameters = engine.extract_parameters(&key).await?;
    Ok(Json(json!({ "key": key, "parameters": parameters })))
}

pub async fn add_profile(
    State(engine): State<AppState>,
    Json(request): Json<AddProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    match (request.template, request.command) {
        (Some(template), _) => {
            engine
                .add_custom_profile(&request.key, template, &request.description)
                .await?
        }
        (None, Some(command)) => {
            engine
                .add_custom_command_line(&request.key, &command, &request.description)
                .await?
        }
        (None, None) => {
            return Err(MediaTaskError::InvalidTemplate {
                profile: request.key,
                reason: "either template or command is required".to_string(),
            }
            .into())
        }
    }
    Ok((StatusCode::CREATED, Json(json!({ "key": request.key }))))
}

pub async fn list_media(
    State(engine): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> ApiResult<Json<Vec<MediaFile>>> {
    Ok(Json(engine.list_media(query.probe).await?))
}

pub async fn delete_media(
    State(engine): State<AppState>,
    Path(path): Path<String>,
) -> ApiResult<StatusCode> {
    if engine.delete_media(&path).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

pub async fn submit_download(
    State(engine): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> ApiResult<(StatusCode, Json<TaskAccepted>)> {
    let task_id = engine.submit_download(&request.url)?;
    Ok((StatusCode::ACCEPTED, Json(TaskAccepted { task_id })))
}

pub async fn submit_transcode(
    State(engine): State<AppState>,
    Json(request): Json<TranscodeRequest>,
) -> ApiResult<(StatusCode, Json<TaskAccepted>)> {
    let task_id = engine
        .submit_transcode(&request.profile, &request.input, request.params)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(TaskAccepted { task_id })))
}

pub async fn task_status(State(engine): State<AppState>, Path(task_id): Path<String>) -> Json<StatusRecord> {
    Json(engine.status(&task_id))
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal (Ctrl+C) received");
        },
        _ = terminate => {
            info!("Shutdown signal (SIGTERM) received");
        },
    }
}
