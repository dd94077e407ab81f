use serde::{Deserialize, Serialize};

/// How the upstream agent should gate mutating actions. Forwarded opaquely;
/// the bridge never interprets these beyond serialization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    #[default]
    Default,
    AcceptEdits,
    Plan,
    BypassPermissions,
}

impl PermissionMode {
    /// Wire form passed to the agent CLI.
    pub fn as_flag(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::Plan => "plan",
            Self::BypassPermissions => "bypassPermissions",
        }
    }
}

fn default_max_turns() -> u32 {
    3
}

/// Options bag for one upstream query. camelCase on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryOptions {
    /// System prompt override for the upstream agent.
    pub system_prompt: Option<String>,
    /// Upper bound on request/response cycles the agent may perform.
    pub max_turns: u32,
    /// Capability filters, forwarded verbatim.
    pub allowed_tools: Vec<String>,
    pub disallowed_tools: Vec<String>,
    /// Working directory for the upstream invocation.
    pub cwd: Option<String>,
    pub permission_mode: Option<PermissionMode>,
    pub verbose: bool,
    pub model: Option<String>,
    /// Resume the most recent conversation instead of starting fresh.
    pub continue_session: bool,
    /// Resume a specific upstream conversation.
    pub resume_session_id: Option<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_turns: default_max_turns(),
            allowed_tools: Vec::new(),
            disallowed_tools: Vec::new(),
            cwd: None,
            permission_mode: None,
            verbose: false,
            model: None,
            continue_session: false,
            resume_session_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = QueryOptions::default();
        assert_eq!(opts.max_turns, 3);
        assert!(opts.allowed_tools.is_empty());
        assert!(!opts.continue_session);
        assert!(opts.permission_mode.is_none());
    }

    #[test]
    fn deserializes_camel_case() {
        let json = serde_json::json!({
            "maxTurns": 5,
            "allowedTools": ["Bash(git *)", "Read"],
            "permissionMode": "acceptEdits",
            "resumeSessionId": "abc",
        });
        let opts: QueryOptions = serde_json::from_value(json).unwrap();
        assert_eq!(opts.max_turns, 5);
        assert_eq!(opts.allowed_tools.len(), 2);
        assert_eq!(opts.permission_mode, Some(PermissionMode::AcceptEdits));
        assert_eq!(opts.resume_session_id.as_deref(), Some("abc"));
    }

    #[test]
    fn empty_object_uses_defaults() {
        let opts: QueryOptions = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(opts.max_turns, 3);
    }

    #[test]
    fn unknown_permission_mode_rejected() {
        let json = serde_json::json!({"permissionMode": "yolo"});
        assert!(serde_json::from_value::<QueryOptions>(json).is_err());
    }

    #[test]
    fn permission_mode_flags() {
        assert_eq!(PermissionMode::Default.as_flag(), "default");
        assert_eq!(PermissionMode::AcceptEdits.as_flag(), "acceptEdits");
        assert_eq!(PermissionMode::Plan.as_flag(), "plan");
        assert_eq!(PermissionMode::BypassPermissions.as_flag(), "bypassPermissions");
    }
}
