use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
///
/// Serialized in lowercase (`"user"`, `"assistant"`, `"tool"`, `"system"`)
/// to match the wire conventions of chat-completion providers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Input from the end user.
    #[default]
    User,
    /// A model-generated response.
    Assistant,
    /// Output of a function tool invocation.
    Tool,
    /// A system prompt or instruction.
    System,
}

impl Role {
    /// The lowercase string form, matching the serialized representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to invoke a named function tool.
///
/// `arguments` holds the raw JSON text exactly as produced by the model
/// collaborator; it is decoded lazily by whoever dispatches the call, so a
/// malformed payload surfaces as a typed dispatch error instead of poisoning
/// the message itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke.
    pub name: String,
    /// Raw JSON text of the call arguments.
    pub arguments: String,
}

impl ToolCall {
    /// Creates a tool call request.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Decodes `arguments` as a JSON object.
    pub fn parse_arguments(&self) -> Result<serde_json::Map<String, serde_json::Value>, serde_json::Error> {
        serde_json::from_str(&self.arguments)
    }
}

/// An immutable message flowing through the topic graph.
///
/// Messages are the payload unit of every topic batch: the caller's input,
/// each node's command output, tool results, and the final answer are all
/// `Message` values. Once published to a topic a message is never mutated;
/// the owning batch holds it for the lifetime of the workflow instance.
///
/// # Examples
///
/// ```
/// use topicloom::message::{Message, Role, ToolCall};
///
/// let user_msg = Message::user("What is the weather?");
/// assert_eq!(user_msg.role, Role::User);
/// assert_eq!(user_msg.text(), "What is the weather?");
///
/// // An assistant turn requesting a tool invocation.
/// let call = Message::assistant("").with_tool_calls(vec![ToolCall::new(
///     "lookup_weather",
///     r#"{"city": "Lisbon"}"#,
/// )]);
/// assert_eq!(call.first_tool_call().map(|tc| tc.name.as_str()), Some("lookup_weather"));
/// ```
///
/// # Serialization
///
/// Messages implement `Serialize`/`Deserialize`; empty tool-call lists are
/// omitted from the JSON form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message.
    pub role: Role,
    /// Text content, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool invocations requested by this message, in call order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    /// Creates a message with the given role and content.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Creates a tool-result message.
    #[must_use]
    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    /// Attaches tool-call requests, replacing any existing ones.
    #[must_use]
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// The text content, or `""` when absent.
    #[must_use]
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// The first tool call requested by this message, if any.
    ///
    /// Routing conditions use this accessor instead of indexing so that
    /// plain-text messages never panic a predicate.
    #[must_use]
    pub fn first_tool_call(&self) -> Option<&ToolCall> {
        self.tool_calls.first()
    }

    /// Returns true if this message requests at least one tool invocation.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Convenience constructors set the expected role and content.
    fn convenience_constructors() {
        let user_msg = Message::user("Hello");
        assert_eq!(user_msg.role, Role::User);
        assert_eq!(user_msg.text(), "Hello");

        let assistant_msg = Message::assistant("Hi there!");
        assert_eq!(assistant_msg.role, Role::Assistant);

        let tool_msg = Message::tool("42");
        assert_eq!(tool_msg.role, Role::Tool);

        let system_msg = Message::system("You are helpful");
        assert_eq!(system_msg.role, Role::System);
    }

    #[test]
    /// A plain message exposes no tool calls through the defensive accessors.
    fn plain_message_has_no_tool_calls() {
        let msg = Message::assistant("just text");
        assert!(!msg.has_tool_calls());
        assert!(msg.first_tool_call().is_none());
    }

    #[test]
    /// Tool calls preserve order and the first-call accessor sees the head.
    fn tool_call_ordering() {
        let msg = Message::assistant("").with_tool_calls(vec![
            ToolCall::new("first", "{}"),
            ToolCall::new("second", "{}"),
        ]);
        assert!(msg.has_tool_calls());
        assert_eq!(msg.first_tool_call().map(|tc| tc.name.as_str()), Some("first"));
        assert_eq!(msg.tool_calls.len(), 2);
    }

    #[test]
    /// Arguments decode as a JSON object and reject non-object payloads.
    fn tool_call_argument_parsing() {
        let ok = ToolCall::new("register", r#"{"name": "Ada", "age": 36}"#);
        let args = ok.parse_arguments().expect("object arguments should parse");
        assert_eq!(args.get("name").and_then(|v| v.as_str()), Some("Ada"));

        let bad = ToolCall::new("register", "not json");
        assert!(bad.parse_arguments().is_err());

        let non_object = ToolCall::new("register", "[1, 2, 3]");
        assert!(non_object.parse_arguments().is_err());
    }

    #[test]
    /// Roles serialize lowercase and messages round-trip through JSON.
    fn serialization() {
        let original = Message::assistant("calling").with_tool_calls(vec![ToolCall::new(
            "lookup",
            r#"{"q": "x"}"#,
        )]);
        let json = serde_json::to_string(&original).expect("serialization failed");
        assert!(json.contains(r#""role":"assistant""#));
        let parsed: Message = serde_json::from_str(&json).expect("deserialization failed");
        assert_eq!(original, parsed);

        // Empty tool-call lists are omitted from the wire form.
        let plain = serde_json::to_string(&Message::user("hi")).expect("serialization failed");
        assert!(!plain.contains("tool_calls"));
        let back: Message = serde_json::from_str(&plain).expect("deserialization failed");
        assert!(back.tool_calls.is_empty());
    }
}
