//! HTTP surface of the bridge: SSE streaming, session registry, interrupt,
//! and the command catalog endpoints.

pub mod compat;
pub mod handlers;
pub mod registry;
pub mod server;
pub mod stream;

pub use registry::{start_eviction_task, SessionRegistry};
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
