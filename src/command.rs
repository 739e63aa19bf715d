//! The unit of work a node performs on its matched input.
//!
//! Commands are the seam between the scheduler and the outside world: a
//! model client, a function tool, a local transform. The scheduler treats
//! them as stateless collaborators — a command receives the execution
//! context and the matched batch, and returns either one message or a lazy
//! stream of partial messages. Everything else (readiness, consumption,
//! routing) stays on the scheduler's side of the seam.

use async_trait::async_trait;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use miette::Diagnostic;
use thiserror::Error;

use crate::context::ExecutionContext;
use crate::message::Message;
use crate::tools::ToolError;

/// Errors surfaced by a command run.
///
/// Any variant aborts the firing node's attempt: the node's input stays
/// unconsumed, nothing is published, and the error reaches the `execute`
/// caller wrapped in [`WorkflowError::Command`](crate::workflow::WorkflowError).
/// Retry policy belongs to the caller or the collaborator, never to the
/// scheduling loop.
#[derive(Debug, Error, Diagnostic)]
pub enum CommandError {
    /// An external collaborator (model endpoint, service) failed.
    #[error("collaborator call failed ({collaborator}): {message}")]
    #[diagnostic(
        code(topicloom::command::collaborator),
        help("check the collaborator's availability and credentials, then re-run the turn")
    )]
    Collaborator {
        /// Which collaborator failed, e.g. "chat_completions".
        collaborator: &'static str,
        /// Collaborator-reported failure detail.
        message: String,
    },

    /// Function-tool dispatch failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Tool(#[from] ToolError),

    /// A payload could not be decoded.
    #[error("payload decoding failed: {0}")]
    #[diagnostic(
        code(topicloom::command::serde),
        help("the collaborator returned a payload that does not match the expected schema")
    )]
    Serde(#[from] serde_json::Error),
}

/// A lazy sequence of partial messages from a streaming command.
///
/// Each item becomes its own single-message batch on the publishing side;
/// an `Err` item aborts the firing with the node's input unconsumed.
pub type CommandStream = BoxStream<'static, Result<Message, CommandError>>;

/// What a command produced: one message, or a stream of partials.
pub enum CommandOutput {
    /// A single complete response.
    Single(Message),
    /// Partial responses delivered as they are produced.
    Stream(CommandStream),
}

impl CommandOutput {
    /// Wraps a complete response.
    #[must_use]
    pub fn single(message: Message) -> Self {
        Self::Single(message)
    }

    /// Boxes a stream of partial responses.
    #[must_use]
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Message, CommandError>> + Send + 'static,
    {
        Self::Stream(stream.boxed())
    }
}

impl std::fmt::Debug for CommandOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandOutput::Single(message) => f.debug_tuple("Single").field(message).finish(),
            CommandOutput::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// The collaborator contract: transform a batch of input messages.
///
/// Implementations must be stateless with respect to the scheduler — the
/// input is borrowed for the duration of the call, so retaining it requires
/// an explicit clone, and nothing about topics or offsets is visible here.
/// A command that calls out to a model or tool awaits at that boundary;
/// those awaits are the only suspension points in a scheduling pass.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use topicloom::command::{Command, CommandError, CommandOutput};
/// use topicloom::context::ExecutionContext;
/// use topicloom::message::Message;
///
/// /// Upper-cases the final input message.
/// struct ShoutCommand;
///
/// #[async_trait]
/// impl Command for ShoutCommand {
///     async fn run(
///         &self,
///         _ctx: &ExecutionContext,
///         input: &[Message],
///     ) -> Result<CommandOutput, CommandError> {
///         let text = input.last().map(|m| m.text().to_uppercase()).unwrap_or_default();
///         Ok(CommandOutput::single(Message::assistant(text)))
///     }
/// }
/// ```
#[async_trait]
pub trait Command: Send + Sync {
    /// Runs the command against the matched input batch.
    async fn run(
        &self,
        ctx: &ExecutionContext,
        input: &[Message],
    ) -> Result<CommandOutput, CommandError>;
}

#[async_trait]
impl<T: Command + ?Sized> Command for std::sync::Arc<T> {
    async fn run(
        &self,
        ctx: &ExecutionContext,
        input: &[Message],
    ) -> Result<CommandOutput, CommandError> {
        (**self).run(ctx, input).await
    }
}
