use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request-scoped correlation identifiers threaded through every topic event.
///
/// The scheduler never interprets these values; they are copied verbatim into
/// each recorded [`TopicEvent`](crate::event_store::TopicEvent) so that audit
/// trails can be sliced by conversation or by individual request. A workflow
/// instance carries one conversation across many `execute` calls, each call
/// typically minting a fresh execution id via [`ExecutionContext::next_turn`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Stable id for the whole conversation.
    pub conversation_id: String,
    /// Id for one `execute`/`execute_blocking` invocation.
    pub execution_id: String,
    /// Id correlating the caller's originating request.
    pub assistant_request_id: String,
}

impl ExecutionContext {
    /// Creates a context for a conversation, minting fresh execution and
    /// request ids.
    #[must_use]
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            execution_id: Uuid::new_v4().to_string(),
            assistant_request_id: Uuid::new_v4().to_string(),
        }
    }

    /// Creates a context from caller-supplied ids.
    ///
    /// Useful when ids originate upstream (or in tests asserting exact event
    /// payloads).
    #[must_use]
    pub fn with_ids(
        conversation_id: impl Into<String>,
        execution_id: impl Into<String>,
        assistant_request_id: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            execution_id: execution_id.into(),
            assistant_request_id: assistant_request_id.into(),
        }
    }

    /// Derives a context for the next turn of the same conversation: the
    /// conversation id is kept, execution and request ids are re-minted.
    #[must_use]
    pub fn next_turn(&self) -> Self {
        Self::new(self.conversation_id.clone())
    }
}
