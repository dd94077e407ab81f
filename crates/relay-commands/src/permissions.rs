use glob::Pattern;

/// One parsed tool grant, e.g. `Bash` (blanket) or `Bash(git *)` (pattern).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolGrant {
    pub tool: String,
    pub pattern: Option<String>,
}

impl ToolGrant {
    /// Parse the `Tool` / `Tool(pattern)` grant syntax.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.split_once('(') {
            Some((tool, rest)) => {
                let pattern = rest.strip_suffix(')')?.trim();
                Some(Self {
                    tool: tool.trim().to_string(),
                    pattern: Some(pattern.to_string()),
                })
            }
            None => Some(Self {
                tool: raw.to_string(),
                pattern: None,
            }),
        }
    }

    /// Whether this grant permits executing the literal shell command.
    pub fn allows_shell(&self, command: &str) -> bool {
        if self.tool != "Bash" {
            return false;
        }
        match &self.pattern {
            None => true,
            Some(p) => Pattern::new(p).is_ok_and(|pat| pat.matches(command)),
        }
    }
}

/// Fail-closed check over every grant from the command header and the
/// caller's session-level allow-list.
pub fn shell_allowed(grants: &[String], command: &str) -> bool {
    grants
        .iter()
        .filter_map(|g| ToolGrant::parse(g))
        .any(|g| g.allows_shell(command))
}
