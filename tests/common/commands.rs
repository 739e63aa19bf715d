#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_stream::stream;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use topicloom::command::{Command, CommandError, CommandOutput};
use topicloom::context::ExecutionContext;
use topicloom::message::{Message, ToolCall};

/// Replies with the text of the final input message, as the assistant.
#[derive(Debug, Clone)]
pub struct EchoCommand;

#[async_trait]
impl Command for EchoCommand {
    async fn run(
        &self,
        _ctx: &ExecutionContext,
        input: &[Message],
    ) -> Result<CommandOutput, CommandError> {
        let text = input.last().map(Message::text).unwrap_or_default();
        Ok(CommandOutput::single(Message::assistant(text)))
    }
}

/// Always replies with the same canned text.
#[derive(Debug, Clone)]
pub struct StaticCommand {
    pub reply: &'static str,
}

impl StaticCommand {
    pub fn new(reply: &'static str) -> Self {
        Self { reply }
    }
}

#[async_trait]
impl Command for StaticCommand {
    async fn run(
        &self,
        _ctx: &ExecutionContext,
        _input: &[Message],
    ) -> Result<CommandOutput, CommandError> {
        Ok(CommandOutput::single(Message::assistant(self.reply)))
    }
}

/// Pops the next scripted reply per firing; panics when the script runs dry.
pub struct ScriptedCommand {
    script: Mutex<VecDeque<Message>>,
}

impl ScriptedCommand {
    pub fn new(script: Vec<Message>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }
}

#[async_trait]
impl Command for ScriptedCommand {
    async fn run(
        &self,
        _ctx: &ExecutionContext,
        _input: &[Message],
    ) -> Result<CommandOutput, CommandError> {
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted command fired more often than scripted");
        Ok(CommandOutput::single(next))
    }
}

/// Emits an assistant message carrying exactly one tool call.
#[derive(Debug, Clone)]
pub struct ToolCallCommand {
    pub tool: &'static str,
    pub arguments: &'static str,
}

#[async_trait]
impl Command for ToolCallCommand {
    async fn run(
        &self,
        _ctx: &ExecutionContext,
        _input: &[Message],
    ) -> Result<CommandOutput, CommandError> {
        let msg =
            Message::assistant("").with_tool_calls(vec![ToolCall::new(self.tool, self.arguments)]);
        Ok(CommandOutput::single(msg))
    }
}

/// Fails the first `n` firings, then behaves like [`EchoCommand`].
pub struct FlakyCommand {
    failures_left: AtomicUsize,
}

impl FlakyCommand {
    pub fn failing(times: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
        }
    }
}

#[async_trait]
impl Command for FlakyCommand {
    async fn run(
        &self,
        _ctx: &ExecutionContext,
        input: &[Message],
    ) -> Result<CommandOutput, CommandError> {
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(CommandError::Collaborator {
                collaborator: "flaky_model",
                message: format!("transient failure ({remaining} left)"),
            });
        }
        let text = input.last().map(Message::text).unwrap_or_default();
        Ok(CommandOutput::single(Message::assistant(text)))
    }
}

/// Streams each chunk as its own assistant message.
#[derive(Debug, Clone)]
pub struct StreamingCommand {
    pub chunks: Vec<&'static str>,
}

impl StreamingCommand {
    pub fn new(chunks: Vec<&'static str>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl Command for StreamingCommand {
    async fn run(
        &self,
        _ctx: &ExecutionContext,
        _input: &[Message],
    ) -> Result<CommandOutput, CommandError> {
        let chunks = self.chunks.clone();
        Ok(CommandOutput::stream(stream! {
            for chunk in chunks {
                yield Ok(Message::assistant(chunk));
            }
        }))
    }
}

/// Streams one chunk, then fails mid-stream.
#[derive(Debug, Clone)]
pub struct BrokenStreamCommand;

#[async_trait]
impl Command for BrokenStreamCommand {
    async fn run(
        &self,
        _ctx: &ExecutionContext,
        _input: &[Message],
    ) -> Result<CommandOutput, CommandError> {
        Ok(CommandOutput::stream(stream! {
            yield Ok(Message::assistant("partial"));
            yield Err(CommandError::Collaborator {
                collaborator: "streaming_model",
                message: "connection dropped".into(),
            });
        }))
    }
}

/// Echoes, and cancels the given token as a side effect of firing.
#[derive(Debug, Clone)]
pub struct CancellingCommand {
    pub token: CancellationToken,
}

#[async_trait]
impl Command for CancellingCommand {
    async fn run(
        &self,
        _ctx: &ExecutionContext,
        input: &[Message],
    ) -> Result<CommandOutput, CommandError> {
        self.token.cancel();
        let text = input.last().map(Message::text).unwrap_or_default();
        Ok(CommandOutput::single(Message::assistant(text)))
    }
}
