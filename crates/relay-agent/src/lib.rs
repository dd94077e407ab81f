pub mod cli;
pub mod mock;

pub use cli::{CliAgent, CliAgentConfig};
pub use mock::{MockAgent, MockTurn};
