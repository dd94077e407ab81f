use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::discovery::CommandDef;
use crate::permissions::shell_allowed;

const DEFAULT_DIRECTIVE_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_MAX_OUTPUT_BYTES: usize = 10_000;
const MAX_MARKER_BYTES: usize = 500;

/// Placeholder token substituted with the caller's argument string.
const ARGUMENTS_PLACEHOLDER: &str = "$ARGUMENTS";

/// Bounds on inline shell directive execution.
#[derive(Clone, Debug)]
pub struct ExpandConfig {
    pub directive_timeout: Duration,
    pub max_output_bytes: usize,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        Self {
            directive_timeout: DEFAULT_DIRECTIVE_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!`([^`\n]+)`").unwrap())
}

fn file_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@([A-Za-z0-9_][A-Za-z0-9_./-]*)").unwrap())
}

/// Expand a command body into prompt text.
///
/// The argument string replaces the placeholder token (or is appended when no
/// placeholder is present), then inline `` !`cmd` `` directives run subject to
/// the permission check, then `@path` references are inlined as fenced blocks.
/// Interrupting the surrounding request does not kill directives already
/// running; they are bounded by the configured timeout instead.
pub async fn expand(
    def: &CommandDef,
    args: &str,
    cwd: &Path,
    session_allowed: &[String],
    config: &ExpandConfig,
) -> String {
    let body = def.body.clone().unwrap_or_default();

    let mut text = if body.contains(ARGUMENTS_PLACEHOLDER) {
        body.replace(ARGUMENTS_PLACEHOLDER, args)
    } else if args.trim().is_empty() {
        body
    } else {
        format!("{body}\n\n{args}")
    };

    text = run_directives(&text, def, cwd, session_allowed, config).await;
    inline_file_refs(&text, cwd)
}

async fn run_directives(
    text: &str,
    def: &CommandDef,
    cwd: &Path,
    session_allowed: &[String],
    config: &ExpandConfig,
) -> String {
    let matches: Vec<(std::ops::Range<usize>, String)> = directive_re()
        .captures_iter(text)
        .filter_map(|c| {
            let whole = c.get(0)?;
            Some((whole.range(), c.get(1)?.as_str().to_string()))
        })
        .collect();
    if matches.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (range, command) in matches {
        out.push_str(&text[last..range.start]);
        let allowed =
            shell_allowed(&def.allowed_tools, &command) || shell_allowed(session_allowed, &command);
        if allowed {
            out.push_str(&execute_directive(&command, cwd, config).await);
        } else {
            tracing::warn!(command = %command, name = %def.name, "Denied shell directive");
            out.push_str(&format!("[[permission denied: {command}]]"));
        }
        last = range.end;
    }
    out.push_str(&text[last..]);
    out
}

/// Run one allow-listed directive through `bash -c`, bounded by the timeout
/// and output cap. Failures become inline markers, never raised errors.
async fn execute_directive(command: &str, cwd: &Path, config: &ExpandConfig) -> String {
    let result = tokio::time::timeout(
        config.directive_timeout,
        tokio::process::Command::new("bash")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .output(),
    )
    .await;

    let output = match result {
        Err(_) => {
            return error_marker(
                command,
                &format!("timed out after {}s", config.directive_timeout.as_secs()),
            );
        }
        Ok(Err(e)) => return error_marker(command, &e.to_string()),
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output.status.code().unwrap_or(-1);
        let detail = if stderr.trim().is_empty() {
            format!("exit code {code}")
        } else {
            format!("exit code {code}: {}", stderr.trim())
        };
        return error_marker(command, &detail);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let trimmed = stdout.trim_end_matches('\n');
    if trimmed.len() > config.max_output_bytes {
        format!(
            "{}...\n[truncated: {} bytes total]",
            truncate_utf8(trimmed, config.max_output_bytes),
            trimmed.len()
        )
    } else {
        trimmed.to_string()
    }
}

fn error_marker(command: &str, detail: &str) -> String {
    let marker = format!("[[error running {command}: {detail}]]");
    if marker.len() > MAX_MARKER_BYTES {
        format!("{}...]]", truncate_utf8(&marker, MAX_MARKER_BYTES))
    } else {
        marker
    }
}

/// Replace `@path` tokens with fenced blocks of the file's contents.
/// Missing or unreadable files leave the token untouched.
fn inline_file_refs(text: &str, cwd: &Path) -> String {
    file_ref_re()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let rel = &caps[1];
            let path = cwd.join(rel);
            match std::fs::read_to_string(&path) {
                Ok(contents) => {
                    let lang = language_tag(rel);
                    format!("```{lang}\n{}\n```", contents.trim_end_matches('\n'))
                }
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn language_tag(path: &str) -> &str {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("rs") => "rust",
        Some("py") => "python",
        Some("js") => "javascript",
        Some("ts") => "typescript",
        Some("sh") => "bash",
        Some("md") => "markdown",
        Some("yml") | Some("yaml") => "yaml",
        Some("json") => "json",
        Some("toml") => "toml",
        Some("html") => "html",
        Some("css") => "css",
        _ => "",
    }
}

/// Cut at a char boundary at or below `max` bytes.
fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::CommandScope;
    use std::path::PathBuf;

    fn def(body: &str, allowed_tools: Vec<&str>) -> CommandDef {
        CommandDef {
            name: "test".into(),
            description: "test".into(),
            argument_hint: None,
            scope: CommandScope::Project,
            path: PathBuf::from("test.md"),
            allowed_tools: allowed_tools.into_iter().map(String::from).collect(),
            body: Some(body.to_string()),
        }
    }

    fn cwd() -> PathBuf {
        std::env::temp_dir()
    }

    async fn expand_simple(body: &str, args: &str, tools: Vec<&str>) -> String {
        expand(&def(body, tools), args, &cwd(), &[], &ExpandConfig::default()).await
    }

    #[tokio::test]
    async fn placeholder_substitution() {
        let out = expand_simple("Fix the bug: $ARGUMENTS now", "in parser", vec![]).await;
        assert_eq!(out, "Fix the bug: in parser now");
    }

    #[tokio::test]
    async fn args_appended_without_placeholder() {
        let out = expand_simple("Fix the bug.", "in parser", vec![]).await;
        assert_eq!(out, "Fix the bug.\n\nin parser");
    }

    #[tokio::test]
    async fn empty_args_leave_body_alone() {
        let out = expand_simple("Fix the bug.", "", vec![]).await;
        assert_eq!(out, "Fix the bug.");
    }

    #[tokio::test]
    async fn directive_denied_without_grant() {
        let out = expand_simple("Status: !`echo hi`", "", vec![]).await;
        assert_eq!(out, "Status: [[permission denied: echo hi]]");
    }

    #[tokio::test]
    async fn directive_runs_with_blanket_grant() {
        let out = expand_simple("Status: !`echo hi`", "", vec!["Bash"]).await;
        assert_eq!(out, "Status: hi");
    }

    #[tokio::test]
    async fn directive_runs_with_matching_pattern() {
        let out = expand_simple("!`echo one` and !`ls /`", "", vec!["Bash(echo *)"]).await;
        assert!(out.starts_with("one and "));
        assert!(out.contains("[[permission denied: ls /]]"));
    }

    #[tokio::test]
    async fn session_allow_list_also_grants() {
        let d = def("!`echo from-session`", vec![]);
        let out = expand(
            &d,
            "",
            &cwd(),
            &["Bash(echo *)".to_string()],
            &ExpandConfig::default(),
        )
        .await;
        assert_eq!(out, "from-session");
    }

    #[tokio::test]
    async fn failing_directive_becomes_error_marker() {
        let out = expand_simple("!`false`", "", vec!["Bash"]).await;
        assert!(out.starts_with("[[error running false:"), "got: {out}");
        assert!(out.contains("exit code 1"));
    }

    #[tokio::test]
    async fn directive_timeout_becomes_error_marker() {
        let d = def("!`sleep 5`", vec!["Bash"]);
        let config = ExpandConfig {
            directive_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let out = expand(&d, "", &cwd(), &[], &config).await;
        assert!(out.contains("[[error running sleep 5: timed out"), "got: {out}");
    }

    #[tokio::test]
    async fn long_output_truncated() {
        let d = def("!`yes x | head -c 2000`", vec!["Bash"]);
        let config = ExpandConfig {
            max_output_bytes: 100,
            ..Default::default()
        };
        let out = expand(&d, "", &cwd(), &[], &config).await;
        assert!(out.contains("...\n[truncated:"), "got: {out}");
        assert!(out.len() < 300, "not truncated: {} bytes", out.len());
    }

    #[tokio::test]
    async fn missing_file_ref_left_untouched() {
        let out = expand_simple("See @missing/file.txt for details", "", vec![]).await;
        assert_eq!(out, "See @missing/file.txt for details");
    }

    #[tokio::test]
    async fn existing_file_ref_inlined_as_fenced_block() {
        let dir = std::env::temp_dir()
            .join(format!("relay_expand_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("main.rs"), "fn main() {}\n").unwrap();

        let d = def("Review @main.rs carefully", vec![]);
        let out = expand(&d, "", &dir, &[], &ExpandConfig::default()).await;
        assert_eq!(out, "Review ```rust\nfn main() {}\n``` carefully");

        std::fs::remove_dir_all(&dir).ok();
    }
}
