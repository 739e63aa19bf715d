use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Errors raised while dispatching a function-tool call.
///
/// All of these surface to the scheduler as
/// [`CommandError::Tool`](crate::command::CommandError) — a failed dispatch
/// is a collaborator failure like any other.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    /// The requested tool name is not in the registry.
    #[error("no tool registered under '{name}'")]
    #[diagnostic(
        code(topicloom::tools::not_found),
        help("register the tool on the ToolRegistry handed to ToolDispatchCommand")
    )]
    NotFound {
        /// The unmatched tool-call name.
        name: String,
    },

    /// The tool-call arguments were not a JSON object.
    #[error("arguments for tool '{name}' are not a JSON object")]
    #[diagnostic(
        code(topicloom::tools::parse),
        help("tool-call arguments must decode as a JSON object of named parameters")
    )]
    Parse {
        /// The tool whose arguments failed to decode.
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// The dispatching node's input batch carried no tool call.
    #[error("input batch carries no tool call to dispatch")]
    #[diagnostic(
        code(topicloom::tools::missing_tool_call),
        help("route only tool-call-bearing messages to this node, e.g. with a tool_call_named condition")
    )]
    MissingToolCall,

    /// The tool itself failed while running.
    #[error("tool '{name}' failed: {message}")]
    #[diagnostic(code(topicloom::tools::failed))]
    Failed {
        /// The failing tool.
        name: String,
        /// Tool-reported failure detail.
        message: String,
    },
}

/// A named, schema-described callable invocable by the dispatch command.
///
/// Tools are collaborators: the engine knows their name, description, and
/// parameter schema (enough to advertise them to a model), and calls
/// [`invoke`](FunctionTool::invoke) with the decoded argument object when a
/// matching tool call arrives.
#[async_trait]
pub trait FunctionTool: Send + Sync {
    /// Unique name matched against incoming tool-call names.
    fn name(&self) -> &str;

    /// Human/model-readable description of what the tool does.
    fn description(&self) -> &str {
        ""
    }

    /// JSON schema of the tool's parameters.
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    /// Runs the tool against decoded arguments, returning its text result.
    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<String, ToolError>;
}

/// An explicit name→tool mapping handed to the dispatch command.
///
/// Never ambient: whoever builds the workflow constructs the registry and
/// passes it into [`ToolDispatchCommand::new`](crate::tools::ToolDispatchCommand::new).
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use serde_json::{Map, Value};
/// use topicloom::tools::{FunctionTool, ToolError, ToolRegistry};
///
/// struct Greet;
///
/// #[async_trait]
/// impl FunctionTool for Greet {
///     fn name(&self) -> &str {
///         "greet"
///     }
///     async fn invoke(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
///         let who = args.get("who").and_then(Value::as_str).unwrap_or("world");
///         Ok(format!("hello, {who}"))
///     }
/// }
///
/// let registry = ToolRegistry::new().with_tool(Greet);
/// assert!(registry.contains("greet"));
/// ```
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: FxHashMap<String, Arc<dyn FunctionTool>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under its own name, replacing any previous entry.
    pub fn register<T: FunctionTool + 'static>(&mut self, tool: T) {
        let tool: Arc<dyn FunctionTool> = Arc::new(tool);
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Fluent form of [`register`](ToolRegistry::register).
    #[must_use]
    pub fn with_tool<T: FunctionTool + 'static>(mut self, tool: T) -> Self {
        self.register(tool);
        self
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn FunctionTool>> {
        self.tools.get(name).cloned()
    }

    /// True when a tool is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted for deterministic output.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// True when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions suitable for advertising the tools to a model
    /// collaborator, sorted by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<Value> {
        let mut entries: Vec<(&str, &Arc<dyn FunctionTool>)> = self
            .tools
            .iter()
            .map(|(name, tool)| (name.as_str(), tool))
            .collect();
        entries.sort_unstable_by_key(|(name, _)| *name);
        entries
            .into_iter()
            .map(|(_, tool)| {
                json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema(),
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
