//! Upstream agent adapter that drives the agent CLI as a subprocess.
//!
//! The CLI is invoked in streaming JSON mode; each stdout line is one JSON
//! message, forwarded verbatim. Cancellation kills the child process.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use relay_core::{AgentClient, AgentError, AgentMessage, MessageStream, QueryOptions};

const MESSAGE_QUEUE: usize = 64;

/// Configuration for the CLI adapter.
#[derive(Clone)]
pub struct CliAgentConfig {
    /// Program name or path of the agent binary.
    pub program: String,
    /// Upstream API credential, passed through to the child's environment.
    pub api_key: Option<SecretString>,
}

impl CliAgentConfig {
    /// Build from the environment. A missing credential is a warning, not an
    /// error: queries fail lazily when the upstream rejects them.
    pub fn from_env() -> Self {
        let program =
            std::env::var("RELAY_AGENT_BIN").unwrap_or_else(|_| "claude".to_string());
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .map(SecretString::from);
        if api_key.is_none() {
            tracing::warn!("ANTHROPIC_API_KEY not set; upstream queries will fail");
        }
        Self { program, api_key }
    }
}

/// Production [`AgentClient`] backed by the agent CLI.
pub struct CliAgent {
    config: CliAgentConfig,
}

impl CliAgent {
    pub fn new(config: CliAgentConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(CliAgentConfig::from_env())
    }

    /// Translate query options into CLI arguments.
    pub fn build_args(prompt: &str, options: &QueryOptions) -> Vec<String> {
        // stream-json output in print mode requires --verbose.
        let mut args = vec![
            "-p".to_string(),
            prompt.to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--max-turns".to_string(),
            options.max_turns.to_string(),
        ];
        if !options.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(options.allowed_tools.join(","));
        }
        if !options.disallowed_tools.is_empty() {
            args.push("--disallowedTools".to_string());
            args.push(options.disallowed_tools.join(","));
        }
        if let Some(mode) = &options.permission_mode {
            args.push("--permission-mode".to_string());
            args.push(mode.as_flag().to_string());
        }
        if let Some(model) = &options.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        if let Some(system_prompt) = &options.system_prompt {
            args.push("--system-prompt".to_string());
            args.push(system_prompt.clone());
        }
        if let Some(resume) = &options.resume_session_id {
            args.push("--resume".to_string());
            args.push(resume.clone());
        } else if options.continue_session {
            args.push("--continue".to_string());
        }
        args
    }
}

#[async_trait]
impl AgentClient for CliAgent {
    async fn query(
        &self,
        prompt: &str,
        options: &QueryOptions,
        cancel: CancellationToken,
    ) -> Result<MessageStream, AgentError> {
        let args = Self::build_args(prompt, options);

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }
        if let Some(key) = &self.config.api_key {
            cmd.env("ANTHROPIC_API_KEY", key.expose_secret());
        }

        let mut child = cmd.spawn().map_err(|e| AgentError::Spawn(e.to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Protocol("child stdout not captured".into()))?;

        tracing::info!(program = %self.config.program, "Spawned upstream agent");

        let (tx, rx) = mpsc::channel(MESSAGE_QUEUE);
        tokio::spawn(pump_child(child, stdout, tx, cancel));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Forward NDJSON stdout lines into the message channel until EOF, error,
/// cancellation, or receiver drop.
async fn pump_child(
    mut child: Child,
    stdout: ChildStdout,
    tx: mpsc::Sender<Result<AgentMessage, AgentError>>,
    cancel: CancellationToken,
) {
    let mut lines = BufReader::new(stdout).lines();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                let _ = tx.send(Err(AgentError::Interrupted)).await;
                return;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<serde_json::Value>(line) {
                        Ok(value) => {
                            if tx.send(Ok(AgentMessage::new(value))).await.is_err() {
                                // Receiver gone; stop the child.
                                let _ = child.start_kill();
                                let _ = child.wait().await;
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Skipping malformed upstream line");
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = tx.send(Err(AgentError::Io(e))).await;
                    let _ = child.wait().await;
                    return;
                }
            }
        }
    }

    match child.wait().await {
        Ok(status) if status.success() => {}
        Ok(status) => {
            let _ = tx
                .send(Err(AgentError::Upstream(format!(
                    "agent exited with {status}"
                ))))
                .await;
        }
        Err(e) => {
            let _ = tx.send(Err(AgentError::Io(e))).await;
        }
    }
}
