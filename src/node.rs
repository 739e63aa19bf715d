//! Nodes: the atomic unit of scheduling.
//!
//! A node binds three things: a subscription expression saying *when* it
//! fires, a command saying *what* it does, and an ordered list of publish
//! targets saying *where* its output goes. The scheduling loop asks each
//! node once per pass whether it can fire; everything else — readiness,
//! batch collection, consumption, conditional publishing — happens inside
//! [`Node::try_fire`].

use std::sync::Arc;

use futures_util::StreamExt;
use rustc_hash::FxHashMap;
use tracing::instrument;

use crate::command::{Command, CommandOutput};
use crate::context::ExecutionContext;
use crate::message::Message;
use crate::topics::{MatchedBatch, SubscriptionExpr, Topic, TopicLog};
use crate::workflow::{GraphError, WorkflowError};

/// What one firing did: the targets that accepted output, in publish order.
#[derive(Debug, Default)]
pub(crate) struct FireReport {
    /// `(topic name, offset)` per accepted publish.
    pub(crate) published: Vec<(String, usize)>,
}

/// A scheduling unit: subscription expression + command + publish targets.
///
/// Nodes are assembled with [`Node::builder`] and registered on a
/// [`WorkflowBuilder`](crate::workflow::WorkflowBuilder); registration order
/// is firing order among simultaneously ready nodes.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use topicloom::command::{Command, CommandError, CommandOutput};
/// use topicloom::context::ExecutionContext;
/// use topicloom::message::Message;
/// use topicloom::node::Node;
/// use topicloom::topics::Topic;
///
/// struct Reply;
///
/// #[async_trait]
/// impl Command for Reply {
///     async fn run(
///         &self,
///         _ctx: &ExecutionContext,
///         input: &[Message],
///     ) -> Result<CommandOutput, CommandError> {
///         let text = input.last().map(|m| m.text().to_string()).unwrap_or_default();
///         Ok(CommandOutput::single(Message::assistant(text)))
///     }
/// }
///
/// let input = Topic::workflow_input();
/// let output = Topic::workflow_output();
/// let node = Node::builder()
///     .name("reply")
///     .subscribe(&input)
///     .command(Reply)
///     .publish_to(&output)
///     .build()
///     .expect("complete node definition");
/// assert_eq!(node.name(), "reply");
/// ```
pub struct Node {
    name: String,
    subscription: SubscriptionExpr,
    command: Arc<dyn Command>,
    publish_to: Vec<Topic>,
}

impl Node {
    /// Starts assembling a node.
    #[must_use]
    pub fn builder() -> NodeBuilder {
        NodeBuilder::default()
    }

    /// The node's unique name; also its consumer id on subscribed topics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The subscription expression gating this node.
    #[must_use]
    pub fn subscription(&self) -> &SubscriptionExpr {
        &self.subscription
    }

    /// Publish targets in declaration order.
    #[must_use]
    pub fn publish_targets(&self) -> &[Topic] {
        &self.publish_to
    }

    /// Attempts one firing against the current topic state.
    ///
    /// Not ready → `Ok(None)`, nothing touched. Ready → collect the matched
    /// batches in deterministic order, run the command, and on success mark
    /// the contributing batches consumed and publish to every target whose
    /// condition accepts the output. A command error aborts the attempt with
    /// the inputs unconsumed and nothing published.
    ///
    /// Streaming commands invert the tail: each chunk is published as its
    /// own single-message batch as it arrives, and the inputs are marked
    /// consumed only after the stream ends cleanly, so a broken stream keeps
    /// the inputs replayable while already-published chunks stay committed.
    #[instrument(level = "debug", skip_all, fields(node = %self.name))]
    pub(crate) async fn try_fire(
        &self,
        ctx: &ExecutionContext,
        logs: &mut FxHashMap<String, TopicLog>,
    ) -> Result<Option<FireReport>, WorkflowError> {
        let Some(matched) = self.subscription.evaluate(logs, &self.name) else {
            return Ok(None);
        };
        let input: Vec<Message> = matched
            .iter()
            .flat_map(|m| m.messages.iter().cloned())
            .collect();
        tracing::debug!(
            batches = matched.len(),
            messages = input.len(),
            "node ready, running command"
        );

        let output = self
            .command
            .run(ctx, &input)
            .await
            .map_err(|source| WorkflowError::Command {
                node: self.name.clone(),
                source,
            })?;

        match output {
            CommandOutput::Single(message) => {
                self.consume_matched(ctx, logs, &matched);
                let published =
                    self.publish_output(ctx, logs, std::slice::from_ref(&message))?;
                Ok(Some(FireReport { published }))
            }
            CommandOutput::Stream(mut stream) => {
                let mut published = Vec::new();
                while let Some(item) = stream.next().await {
                    let chunk = item.map_err(|source| WorkflowError::Command {
                        node: self.name.clone(),
                        source,
                    })?;
                    published.extend(self.publish_output(
                        ctx,
                        logs,
                        std::slice::from_ref(&chunk),
                    )?);
                }
                self.consume_matched(ctx, logs, &matched);
                Ok(Some(FireReport { published }))
            }
        }
    }

    fn consume_matched(
        &self,
        ctx: &ExecutionContext,
        logs: &mut FxHashMap<String, TopicLog>,
        matched: &[MatchedBatch],
    ) {
        for batch in matched {
            if let Some(log) = logs.get_mut(&batch.topic) {
                log.mark_consumed(ctx, &self.name, batch.offset);
            }
        }
    }

    fn publish_output(
        &self,
        ctx: &ExecutionContext,
        logs: &mut FxHashMap<String, TopicLog>,
        output: &[Message],
    ) -> Result<Vec<(String, usize)>, WorkflowError> {
        let mut published = Vec::new();
        for target in &self.publish_to {
            if !target.accepts(output) {
                tracing::debug!(target = %target.name(), "target condition declined output");
                continue;
            }
            let Some(log) = logs.get_mut(target.name()) else {
                tracing::warn!(target = %target.name(), "publish target has no log; skipping");
                continue;
            };
            let offset = log.publish(ctx, &self.name, output.to_vec())?;
            published.push((target.name().to_string(), offset));
        }
        Ok(published)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let targets: Vec<&str> = self.publish_to.iter().map(Topic::name).collect();
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("subscription", &self.subscription.to_string())
            .field("publish_to", &targets)
            .finish()
    }
}

/// Fluent assembly of a [`Node`]; `build` validates completeness.
#[derive(Default)]
pub struct NodeBuilder {
    name: Option<String>,
    subscription: Option<SubscriptionExpr>,
    command: Option<Arc<dyn Command>>,
    publish_to: Vec<Topic>,
}

impl NodeBuilder {
    /// Sets the node's unique name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the subscription expression; a bare topic reads as a LEAF.
    #[must_use]
    pub fn subscribe(mut self, expr: impl Into<SubscriptionExpr>) -> Self {
        self.subscription = Some(expr.into());
        self
    }

    /// Sets the command the node runs when it fires.
    #[must_use]
    pub fn command<C: Command + 'static>(mut self, command: C) -> Self {
        self.command = Some(Arc::new(command));
        self
    }

    /// Appends a publish target; call order is dispatch order.
    #[must_use]
    pub fn publish_to(mut self, topic: &Topic) -> Self {
        self.publish_to.push(topic.clone());
        self
    }

    /// Validates and produces the node.
    pub fn build(self) -> Result<Node, GraphError> {
        let name = match self.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Err(GraphError::MissingName),
        };
        let subscription = self
            .subscription
            .ok_or_else(|| GraphError::MissingSubscription { node: name.clone() })?;
        let command = self
            .command
            .ok_or_else(|| GraphError::MissingCommand { node: name.clone() })?;
        Ok(Node {
            name,
            subscription,
            command,
            publish_to: self.publish_to,
        })
    }
}

impl std::fmt::Debug for NodeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeBuilder")
            .field("name", &self.name)
            .field("has_subscription", &self.subscription.is_some())
            .field("has_command", &self.command.is_some())
            .field("publish_to", &self.publish_to.len())
            .finish()
    }
}
