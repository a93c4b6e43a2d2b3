use async_trait::async_trait;

use crate::{
    Result,
    message::{Destination, MessageHandle, SourceMessage, TextFormat, TopicHandle},
};

/// Send side of a messaging transport. Each messaging platform implements this.
///
/// Every method is a suspension point; timeouts are the implementation's
/// responsibility.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a text message and return the handle of the posted message.
    async fn send_text(
        &self,
        to: Destination,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageHandle>;

    /// Copy an existing message verbatim (media included) to `to`.
    async fn copy_message(&self, to: Destination, source: &SourceMessage)
    -> Result<MessageHandle>;

    /// Create a sub-channel in the operator group. `name` is already truncated
    /// to the platform limit by the caller.
    async fn create_topic(&self, name: &str) -> Result<TopicHandle>;
}
