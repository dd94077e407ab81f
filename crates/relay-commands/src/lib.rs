//! Slash-command catalog: markdown command files discovered from project and
//! user directories, expanded into prompt text on demand.

pub mod discovery;
pub mod expand;
pub mod permissions;

pub use discovery::{discover, find, CommandDef, CommandScope};
pub use expand::{expand, ExpandConfig};
pub use permissions::ToolGrant;
