//! The SSE streaming bridge.
//!
//! Frame order per stream: one `start`, zero or more `message`, then exactly
//! one of `done` or `error`. Heartbeat comments interleave on a fixed
//! interval but never reorder message frames.

use std::convert::Infallible;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use relay_core::{QueryOptions, SessionId};

use crate::compat;
use crate::server::AppState;

const FRAME_QUEUE: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    #[serde(default)]
    pub prompt: String,
    pub session_id: Option<String>,
    pub options: Option<QueryOptions>,
}

/// `POST /api/claude/stream` (aliased at `/api/query`).
pub async fn stream_handler(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let normalized = compat::normalize_request(&body);
    let request: StreamRequest = match serde_json::from_value(normalized) {
        Ok(r) => r,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("malformed request: {e}")})),
            )
                .into_response();
        }
    };
    if request.prompt.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "prompt is required"})),
        )
            .into_response();
    }

    let session_id = request
        .session_id
        .map(SessionId::from_raw)
        .unwrap_or_default();
    let options = request.options.unwrap_or_default();

    // Registered before the first await so an interrupt racing the stream's
    // start still finds the session.
    let cancel = state.registry.register(session_id.clone());

    tracing::info!(session_id = %session_id, "Stream started");

    let heartbeat = state.config.heartbeat_interval;
    let (tx, rx) = mpsc::channel::<Event>(FRAME_QUEUE);
    tokio::spawn(run_stream(
        state,
        session_id,
        request.prompt,
        options,
        cancel,
        tx,
    ));

    let frames = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    let sse = Sse::new(frames).keep_alive(KeepAlive::new().interval(heartbeat).text("keep-alive"));
    (
        [("x-accel-buffering", "no"), ("cache-control", "no-cache")],
        sse,
    )
        .into_response()
}

/// Pump upstream messages into SSE frames. Every exit path runs the
/// registry teardown exactly once.
async fn run_stream(
    state: AppState,
    id: SessionId,
    prompt: String,
    options: QueryOptions,
    cancel: CancellationToken,
    tx: mpsc::Sender<Event>,
) {
    if tx
        .send(frame("start", json!({"sessionId": id})))
        .await
        .is_err()
    {
        state.registry.end(&id);
        return;
    }

    let mut upstream = match state.agent.query(&prompt, &options, cancel.clone()).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(session_id = %id, error = %e, "Upstream query failed");
            let _ = tx
                .send(frame("error", json!({"sessionId": id, "error": e.to_string()})))
                .await;
            state.registry.end(&id);
            return;
        }
    };

    let mut count: u64 = 0;
    let terminal = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break frame("error", json!({"sessionId": id, "error": "interrupted"}));
            }
            item = upstream.next() => match item {
                Some(Ok(msg)) => {
                    count += 1;
                    state.registry.touch(&id);
                    let payload = json!({"sessionId": id, "message": msg.into_payload()});
                    if tx.send(frame("message", payload)).await.is_err() {
                        // Client went away; stop the upstream and tear down.
                        cancel.cancel();
                        state.registry.end(&id);
                        return;
                    }
                }
                Some(Err(e)) => {
                    tracing::error!(session_id = %id, error = %e, "Upstream stream failed");
                    break frame("error", json!({"sessionId": id, "error": e.to_string()}));
                }
                None => {
                    break frame("done", json!({"sessionId": id, "messageCount": count}));
                }
            }
        }
    };

    let _ = tx.send(terminal).await;
    state.registry.end(&id);
    tracing::info!(session_id = %id, messages = count, "Stream ended");
}

fn frame(kind: &str, data: serde_json::Value) -> Event {
    Event::default().event(kind).data(data.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parses_canonical_shape() {
        let body = json!({
            "prompt": "hello",
            "sessionId": "s-1",
            "options": {"maxTurns": 2}
        });
        let req: StreamRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.prompt, "hello");
        assert_eq!(req.session_id.as_deref(), Some("s-1"));
        assert_eq!(req.options.unwrap().max_turns, 2);
    }

    #[test]
    fn request_parses_legacy_shape_after_normalization() {
        let body = json!({"text": "hi", "opts": {}});
        let req: StreamRequest =
            serde_json::from_value(compat::normalize_request(&body)).unwrap();
        assert_eq!(req.prompt, "hi");
        assert!(req.options.is_some());
    }

    #[test]
    fn missing_prompt_defaults_to_empty() {
        let req: StreamRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.prompt.is_empty());
    }
}
