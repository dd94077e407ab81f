pub mod agent;
pub mod errors;
pub mod ids;
pub mod message;
pub mod options;

pub use agent::{AgentClient, MessageStream};
pub use errors::AgentError;
pub use ids::SessionId;
pub use message::AgentMessage;
pub use options::{PermissionMode, QueryOptions};
