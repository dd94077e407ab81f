//! JSON endpoints: interrupt, session listing, command catalog, health.

use std::path::PathBuf;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use relay_core::SessionId;

use crate::compat;
use crate::server::AppState;

/// `POST /api/interrupt`
pub async fn interrupt_handler(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let normalized = compat::normalize_request(&body);
    let id = normalized
        .get("sessionId")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty());
    let Some(id) = id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "session_id_required"})),
        )
            .into_response();
    };

    let session_id = SessionId::from_raw(id);
    if state.registry.interrupt(&session_id) {
        tracing::info!(session_id = %session_id, "Session interrupted");
        Json(json!({"ok": true, "interrupted": id})).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "session_not_found"})),
        )
            .into_response()
    }
}

/// `GET /api/sessions`
pub async fn sessions_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sessions = state.registry.list();
    Json(json!({"count": sessions.len(), "sessions": sessions}))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandsQuery {
    #[serde(default)]
    pub include_body: bool,
    pub cwd: Option<String>,
}

/// `GET /api/commands`
pub async fn commands_handler(
    State(state): State<AppState>,
    Query(query): Query<CommandsQuery>,
) -> Json<serde_json::Value> {
    let (project_root, user_root) = state.config.command_roots(query.cwd.as_deref());
    let mut commands = relay_commands::discover(&project_root, &user_root);
    if !query.include_body {
        for command in &mut commands {
            command.body = None;
        }
    }
    Json(json!({"commands": commands}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandRequest {
    pub command: String,
    #[serde(default)]
    pub args: String,
    pub cwd: Option<String>,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
}

/// `POST /api/commands/expand`
pub async fn expand_handler(
    State(state): State<AppState>,
    Json(request): Json<ExpandRequest>,
) -> Response {
    let (project_root, user_root) = state.config.command_roots(request.cwd.as_deref());
    let commands = relay_commands::discover(&project_root, &user_root);
    let Some(def) = relay_commands::find(&commands, &request.command) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "command_not_found"})),
        )
            .into_response();
    };

    let cwd = request
        .cwd
        .map(PathBuf::from)
        .unwrap_or_else(|| state.config.project_root.clone());
    let expanded = relay_commands::expand(
        def,
        &request.args,
        &cwd,
        &request.allowed_tools,
        &state.config.expand,
    )
    .await;

    Json(json!({"expanded": expanded})).into_response()
}

/// `GET /api/health`
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}
