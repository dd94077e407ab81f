use serde::{Deserialize, Serialize};

/// One structured message produced by the upstream agent.
///
/// The bridge forwards payloads verbatim and never interprets tool semantics;
/// the only field it inspects is `type`, for logging.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentMessage(pub serde_json::Value);

impl AgentMessage {
    pub fn new(payload: serde_json::Value) -> Self {
        Self(payload)
    }

    /// The upstream `type` discriminator, if present.
    pub fn message_type(&self) -> Option<&str> {
        self.0.get("type").and_then(|v| v.as_str())
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_payload(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for AgentMessage {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}
