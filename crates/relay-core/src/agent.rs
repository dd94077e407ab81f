use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::errors::AgentError;
use crate::message::AgentMessage;
use crate::options::QueryOptions;

/// A cancelable asynchronous sequence of upstream messages.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<AgentMessage, AgentError>> + Send>>;

/// The upstream prompt-processing capability.
///
/// One prompt in, one ordered message sequence out. Implementations must honor
/// the cancellation token cooperatively: after it fires, the stream should end
/// promptly, best-effort (some transports cannot stop mid-item).
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn query(
        &self,
        prompt: &str,
        options: &QueryOptions,
        cancel: CancellationToken,
    ) -> Result<MessageStream, AgentError>;
}
