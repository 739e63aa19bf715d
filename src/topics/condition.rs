//! Typed routing predicates over message batches.
//!
//! A topic may carry a condition deciding which batches are visible on it.
//! Conditions are pure, infallible predicates: they return `bool` and reach
//! into optional message fields only through presence-checked accessors, so a
//! plain-text answer hitting a tool-call-shaped condition evaluates to "not
//! satisfied" instead of crashing the firing node.

use std::sync::Arc;

use crate::message::Message;

/// A pure predicate deciding whether a topic accepts a batch.
///
/// Implementations must be deterministic for a given batch; the scheduler
/// may evaluate a condition several times (once per readiness check, once at
/// publish) and relies on every evaluation agreeing.
pub trait TopicCondition: Send + Sync {
    /// Returns true when the batch is visible on the topic.
    fn accepts(&self, batch: &[Message]) -> bool;
}

/// Shared handle to a condition, cloneable across topics and nodes.
pub type SharedCondition = Arc<dyn TopicCondition>;

impl<F> TopicCondition for F
where
    F: Fn(&[Message]) -> bool + Send + Sync,
{
    fn accepts(&self, batch: &[Message]) -> bool {
        self(batch)
    }
}

/// A condition accepting every batch.
///
/// Equivalent to a topic without a condition; useful when a call site wants
/// the acceptance policy spelled out.
#[must_use]
pub fn accept_all() -> SharedCondition {
    Arc::new(|_: &[Message]| true)
}

/// Lifts a predicate on the final message of a batch into a condition.
///
/// Topic conditions conventionally inspect only the last message (the most
/// recent turn); this adapter captures that convention. An empty batch never
/// matches.
#[must_use]
pub fn last_message<F>(predicate: F) -> SharedCondition
where
    F: Fn(&Message) -> bool + Send + Sync + 'static,
{
    Arc::new(move |batch: &[Message]| batch.last().is_some_and(&predicate))
}

/// Accepts batches whose final message's first tool call is named `name`.
///
/// Messages without tool calls do not match.
#[must_use]
pub fn tool_call_named(name: impl Into<String>) -> SharedCondition {
    let name = name.into();
    last_message(move |msg| msg.first_tool_call().is_some_and(|tc| tc.name == name))
}

/// Accepts batches whose final message's first tool call is named anything
/// but `name`.
///
/// Messages without tool calls do not match — so paired with
/// [`tool_call_named`] the two conditions are mutually exclusive and both
/// reject plain-text output, which then simply reaches neither target.
#[must_use]
pub fn tool_call_not_named(name: impl Into<String>) -> SharedCondition {
    let name = name.into();
    last_message(move |msg| msg.first_tool_call().is_some_and(|tc| tc.name != name))
}
