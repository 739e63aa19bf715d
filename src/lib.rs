//! # Topicloom: Topic-driven Agent Workflow Orchestration
//!
//! Topicloom is a framework for building event-driven agent workflows:
//! nodes subscribe to topics with boolean expressions, transform message
//! batches through commands, and publish onward, while every publish and
//! consume lands in an append-only event store for audit and replay.
//!
//! ## Core Concepts
//!
//! - **Topics**: Named append-only logs of message batches, with optional
//!   routing conditions on the payload
//! - **Nodes**: Units of work gated by AND/OR subscription expressions over
//!   topics
//! - **Commands**: The work itself — one message out, or a stream of chunks
//! - **Workflow**: Deterministic pass-based scheduling until the graph
//!   settles, suspends for a human, or hits its pass budget
//! - **Events**: Every publish and consume recorded centrally, in order
//!
//! ## Quick Start
//!
//! ### Working with Messages
//!
//! Messages are the only payload topics carry. Use the role constructors:
//!
//! ```
//! use topicloom::message::{Message, Role, ToolCall};
//!
//! let user_msg = Message::user("What's the weather like?");
//! let assistant_msg = Message::assistant("Let me check.");
//! let system_msg = Message::system("You are a weather assistant.");
//!
//! // Assistant messages can carry tool calls for downstream dispatch
//! let call = ToolCall::new("lookup_weather", r#"{"city": "Lisbon"}"#);
//! let with_call = Message::assistant("").with_tool_calls(vec![call]);
//!
//! assert_eq!(user_msg.role, Role::User);
//! assert!(with_call.has_tool_calls());
//! ```
//!
//! ### Building and Running a Workflow
//!
//! A workflow is nodes wired through topics. Caller input lands on the
//! reserved input topic; whatever reaches the reserved output topic is the
//! answer.
//!
//! ```
//! use async_trait::async_trait;
//! use topicloom::command::{Command, CommandError, CommandOutput};
//! use topicloom::context::ExecutionContext;
//! use topicloom::message::Message;
//! use topicloom::node::Node;
//! use topicloom::topics::Topic;
//! use topicloom::workflow::Workflow;
//!
//! struct Greet;
//!
//! #[async_trait]
//! impl Command for Greet {
//!     async fn run(
//!         &self,
//!         _ctx: &ExecutionContext,
//!         input: &[Message],
//!     ) -> Result<CommandOutput, CommandError> {
//!         let name = input.last().map(|m| m.text()).unwrap_or("stranger");
//!         Ok(CommandOutput::single(Message::assistant(format!("Hello, {name}!"))))
//!     }
//! }
//!
//! let input = Topic::workflow_input();
//! let output = Topic::workflow_output();
//! let mut workflow = Workflow::builder("greeter")
//!     .node(
//!         Node::builder()
//!             .name("greet")
//!             .subscribe(&input)
//!             .command(Greet)
//!             .publish_to(&output)
//!             .build()
//!             .expect("complete node definition"),
//!     )
//!     .build()
//!     .expect("valid graph");
//!
//! let ctx = ExecutionContext::new("demo");
//! let outcome = workflow
//!     .execute_blocking(&ctx, vec![Message::user("Ada")])
//!     .expect("execution succeeds");
//! assert_eq!(outcome.messages()[0].text(), "Hello, Ada!");
//! ```
//!
//! ### Human in the Loop
//!
//! Publish to [`topics::HUMAN_REQUEST_TOPIC`] (or any topic registered via
//! [`workflow::WorkflowBuilder::human_request_topic`]) and the turn ends
//! [`Suspended`](workflow::ExecutionOutcome::Suspended) with the request
//! batch. Topic state survives between calls: pass the human's reply as the
//! next input and the graph picks up exactly where it stopped.
//!
//! ## Module Guide
//!
//! - [`message`] - Conversation messages, roles, and tool-call payloads
//! - [`context`] - Per-invocation identity threaded through commands and events
//! - [`topics`] - Topics, routing conditions, subscription expressions, logs
//! - [`command`] - The unit-of-work trait and its single/stream output forms
//! - [`tools`] - Function-tool registry and the built-in dispatch command
//! - [`node`] - Subscription + command + publish targets
//! - [`workflow`] - Graph assembly, validation, and the scheduling loop
//! - [`event_store`] - Append-only publish/consume log shared by every topic
//! - [`telemetry`] - Optional tracing and panic-report setup

pub mod command;
pub mod context;
pub mod event_store;
pub mod message;
pub mod node;
pub mod telemetry;
pub mod tools;
pub mod topics;
pub mod workflow;
