/// Failures surfaced by an upstream agent adapter.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("failed to spawn upstream agent: {0}")]
    Spawn(String),

    #[error("upstream protocol error: {0}")]
    Protocol(String),

    #[error("query interrupted")]
    Interrupted,

    #[error("upstream agent failed: {0}")]
    Upstream(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            AgentError::Spawn("not found".into()).to_string(),
            "failed to spawn upstream agent: not found"
        );
        assert_eq!(AgentError::Interrupted.to_string(), "query interrupted");
    }
}
