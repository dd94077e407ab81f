use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use relay_commands::ExpandConfig;
use relay_core::AgentClient;

use crate::handlers;
use crate::registry::{start_eviction_task, SessionRegistry};
use crate::stream;

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    /// Base for the project-scope command root and directive execution.
    pub project_root: PathBuf,
    /// User-scope command root, normally `~/.claude/commands`.
    pub user_commands_root: PathBuf,
    /// Sessions idle longer than this are evicted.
    pub idle_timeout: Duration,
    /// Interval between SSE keep-alive comments while a stream is open.
    pub heartbeat_interval: Duration,
    pub expand: ExpandConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let project_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let user_commands_root = std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| project_root.clone())
            .join(".claude/commands");
        Self {
            port: 8787,
            project_root,
            user_commands_root,
            idle_timeout: Duration::from_secs(30 * 60),
            heartbeat_interval: Duration::from_secs(15),
            expand: ExpandConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Project and user command roots, with an optional per-request project
    /// override.
    pub fn command_roots(&self, cwd: Option<&str>) -> (PathBuf, PathBuf) {
        let project = cwd
            .map(PathBuf::from)
            .unwrap_or_else(|| self.project_root.clone())
            .join(".claude/commands");
        (project, self.user_commands_root.clone())
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub agent: Arc<dyn AgentClient>,
    pub config: Arc<ServerConfig>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/claude/stream", post(stream::stream_handler))
        .route("/api/query", post(stream::stream_handler))
        .route("/api/interrupt", post(handlers::interrupt_handler))
        .route("/api/sessions", get(handlers::sessions_handler))
        .route("/api/commands", get(handlers::commands_handler))
        .route("/api/commands/expand", post(handlers::expand_handler))
        .route("/api/health", get(handlers::health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps the background
/// tasks alive.
pub async fn start(
    config: ServerConfig,
    agent: Arc<dyn AgentClient>,
) -> Result<ServerHandle, std::io::Error> {
    let registry = Arc::new(SessionRegistry::new());

    let eviction = start_eviction_task(
        Arc::clone(&registry),
        Duration::from_secs(60),
        config.idle_timeout,
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let state = AppState {
        registry: Arc::clone(&registry),
        agent,
        config: Arc::new(config),
    };
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "Relay server started");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        registry,
        _server: server,
        _eviction: eviction,
    })
}

/// Handle returned by `start()`.
pub struct ServerHandle {
    pub port: u16,
    pub registry: Arc<SessionRegistry>,
    _server: tokio::task::JoinHandle<()>,
    _eviction: tokio::task::JoinHandle<()>,
}
