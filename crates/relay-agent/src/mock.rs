//! Scripted [`AgentClient`] for tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use relay_core::{AgentClient, AgentError, AgentMessage, MessageStream, QueryOptions};

/// One scripted response to a query.
pub enum MockTurn {
    /// Emit these payloads in order, then end cleanly.
    Messages(Vec<serde_json::Value>),
    /// End the stream with an error after any leading payloads.
    Error(Vec<serde_json::Value>, AgentError),
    /// Pause between payloads, so tests can interleave an interrupt.
    Delayed(Vec<serde_json::Value>, Duration),
}

struct Inner {
    turns: Vec<MockTurn>,
    prompts: Vec<String>,
}

/// Agent double that replays a fixed script of turns. Each call to `query`
/// consumes the next turn; extra calls get an empty stream.
#[derive(Clone)]
pub struct MockAgent {
    inner: Arc<Mutex<Inner>>,
}

impl MockAgent {
    pub fn new(turns: Vec<MockTurn>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                turns,
                prompts: Vec::new(),
            })),
        }
    }

    /// Single turn emitting the given payloads.
    pub fn with_messages(payloads: Vec<serde_json::Value>) -> Self {
        Self::new(vec![MockTurn::Messages(payloads)])
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().prompts.len()
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.inner.lock().prompts.clone()
    }
}

#[async_trait]
impl AgentClient for MockAgent {
    async fn query(
        &self,
        prompt: &str,
        _options: &QueryOptions,
        cancel: CancellationToken,
    ) -> Result<MessageStream, AgentError> {
        let turn = {
            let mut inner = self.inner.lock();
            inner.prompts.push(prompt.to_string());
            if inner.turns.is_empty() {
                None
            } else {
                Some(inner.turns.remove(0))
            }
        };

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            match turn {
                None => {}
                Some(MockTurn::Messages(payloads)) => {
                    for p in payloads {
                        if tx.send(Ok(AgentMessage::new(p))).await.is_err() {
                            return;
                        }
                    }
                }
                Some(MockTurn::Error(payloads, err)) => {
                    for p in payloads {
                        if tx.send(Ok(AgentMessage::new(p))).await.is_err() {
                            return;
                        }
                    }
                    let _ = tx.send(Err(err)).await;
                }
                Some(MockTurn::Delayed(payloads, delay)) => {
                    for p in payloads {
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                let _ = tx.send(Err(AgentError::Interrupted)).await;
                                return;
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                        if tx.send(Ok(AgentMessage::new(p))).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
