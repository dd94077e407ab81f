use std::path::{Path, PathBuf};

use serde::Serialize;

/// Where a command definition was found. Project commands shadow user
/// commands with the same name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandScope {
    Project,
    User,
}

/// A loaded command definition.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandDef {
    /// Derived from the relative file path, with `/` mapped to `:`.
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argument_hint: Option<String>,
    pub scope: CommandScope,
    #[serde(skip)]
    pub path: PathBuf,
    /// Tool grants declared in the header, consulted during expansion.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_tools: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Scan both roots for `.md` command files. Results are sorted so project
/// entries precede user entries, then by name, and hold exactly one entry per
/// name: on a collision the project-scope definition shadows the user one.
pub fn discover(project_root: &Path, user_root: &Path) -> Vec<CommandDef> {
    let mut commands = Vec::new();
    collect(project_root, project_root, CommandScope::Project, 0, &mut commands);
    collect(user_root, user_root, CommandScope::User, 0, &mut commands);
    commands.sort_by(|a, b| a.scope.cmp(&b.scope).then_with(|| a.name.cmp(&b.name)));

    let mut seen = std::collections::HashSet::new();
    commands.retain(|c| seen.insert(c.name.clone()));
    commands
}

/// First definition with the given name, honoring scope precedence.
pub fn find<'a>(commands: &'a [CommandDef], name: &str) -> Option<&'a CommandDef> {
    commands.iter().find(|c| c.name == name)
}

const MAX_SCAN_DEPTH: usize = 8;

fn collect(root: &Path, dir: &Path, scope: CommandScope, depth: usize, out: &mut Vec<CommandDef>) {
    if depth > MAX_SCAN_DEPTH {
        return;
    }
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(_) => continue,
        };
        // Symlinked directories are not followed, so a link cycle cannot
        // recurse. Symlinked files still load.
        if file_type.is_dir() {
            collect(root, &path, scope, depth + 1, out);
        } else if path.extension().is_some_and(|e| e == "md") && path.is_file() {
            if let Some(def) = load_command(root, &path, scope) {
                out.push(def);
            }
        }
    }
}

fn load_command(root: &Path, path: &Path, scope: CommandScope) -> Option<CommandDef> {
    let raw = std::fs::read_to_string(path).ok()?;
    let name = command_name(root, path)?;

    let (header, body) = parse_header(&raw);
    if body.trim().is_empty() {
        return None;
    }

    let description = header
        .description
        .unwrap_or_else(|| first_line_summary(&body));

    Some(CommandDef {
        name,
        description,
        argument_hint: header.argument_hint,
        scope,
        path: path.to_path_buf(),
        allowed_tools: header.allowed_tools,
        body: Some(body),
    })
}

/// Relative path with the extension stripped and separators mapped to `:`,
/// so `git/commit.md` becomes `git:commit`.
fn command_name(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let stem = rel.with_extension("");
    let parts: Vec<String> = stem
        .components()
        .filter_map(|c| c.as_os_str().to_str().map(|s| s.to_string()))
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join(":"))
}

fn first_line_summary(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.trim_start_matches('#').trim().to_string())
        .unwrap_or_default()
}

#[derive(Default)]
struct Header {
    description: Option<String>,
    argument_hint: Option<String>,
    allowed_tools: Vec<String>,
}

/// Split a `---`-delimited key-value header from the body. Anything that is
/// not a recognized header is treated as body text.
fn parse_header(raw: &str) -> (Header, String) {
    if !raw.starts_with("---\n") {
        return (Header::default(), raw.to_string());
    }
    let after_start = &raw[4..];
    let end = match after_start.find("\n---") {
        Some(pos) => pos,
        None => return (Header::default(), raw.to_string()),
    };

    let header_str = &after_start[..end];
    let body = after_start[end + 4..].trim_start().to_string();

    let mut header = Header::default();
    for line in header_str.lines() {
        let line = line.trim();
        if let Some(desc) = line.strip_prefix("description:") {
            header.description = Some(desc.trim().trim_matches('"').to_string());
        } else if let Some(hint) = line.strip_prefix("argument-hint:") {
            header.argument_hint = Some(hint.trim().trim_matches('"').to_string());
        } else if let Some(tools) = line.strip_prefix("allowed-tools:") {
            header.allowed_tools = parse_tool_list(tools);
        }
    }
    (header, body)
}

/// Tool lists come as `[a, b]` or as a bare comma-separated line. Grants may
/// themselves contain commas inside parentheses, e.g. `Bash(git add *)`, so
/// splitting respects paren depth.
fn parse_tool_list(value: &str) -> Vec<String> {
    let trimmed = value.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);

    let mut tools = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in inner.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                tools.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    tools.push(current);

    tools
        .into_iter()
        .map(|t| t.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
