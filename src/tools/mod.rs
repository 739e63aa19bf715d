//! Function tools and the built-in dispatch command.
//!
//! A [`FunctionTool`] is a named callable with a parameter schema; a
//! [`ToolRegistry`] maps names to tools; [`ToolDispatchCommand`] is the
//! built-in [`Command`](crate::command::Command) that resolves an incoming
//! tool call against the registry and runs it. The registry is always passed
//! in explicitly — tools are never discovered through ambient state.

pub mod dispatch;
pub mod registry;

pub use dispatch::ToolDispatchCommand;
pub use registry::{FunctionTool, ToolError, ToolRegistry};
