use async_trait::async_trait;

use crate::command::{Command, CommandError, CommandOutput};
use crate::context::ExecutionContext;
use crate::message::Message;
use crate::tools::registry::{ToolError, ToolRegistry};

/// The built-in function-dispatch command.
///
/// Resolves the input batch's final message's *first* tool call against the
/// registry, decodes its arguments, and wraps the tool's text result in a
/// tool-role [`Message`]. Additional tool calls on the same message are
/// ignored; a collaborator wanting parallel calls publishes them as separate
/// messages.
///
/// Dispatch failures are typed ([`ToolError`]) and flow to the scheduler as
/// [`CommandError::Tool`], aborting the firing with the node's input left
/// unconsumed.
pub struct ToolDispatchCommand {
    registry: ToolRegistry,
}

impl ToolDispatchCommand {
    /// Builds the command around an explicitly supplied registry.
    #[must_use]
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// The registry this command dispatches against.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

#[async_trait]
impl Command for ToolDispatchCommand {
    async fn run(
        &self,
        _ctx: &ExecutionContext,
        input: &[Message],
    ) -> Result<CommandOutput, CommandError> {
        let call = input
            .last()
            .and_then(Message::first_tool_call)
            .ok_or(ToolError::MissingToolCall)?;
        let tool = self
            .registry
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound {
                name: call.name.clone(),
            })?;
        let arguments = call.parse_arguments().map_err(|source| ToolError::Parse {
            name: call.name.clone(),
            source,
        })?;
        tracing::debug!(tool = %call.name, "dispatching tool call");
        let result = tool.invoke(&arguments).await?;
        Ok(CommandOutput::single(Message::tool(result)))
    }
}

impl std::fmt::Debug for ToolDispatchCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatchCommand")
            .field("tools", &self.registry.names())
            .finish()
    }
}
