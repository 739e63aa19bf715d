use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::context::ExecutionContext;
use crate::event_store::{EventStore, TopicEvent};
use crate::message::Message;
use crate::topics::condition::SharedCondition;
use crate::topics::{HUMAN_REQUEST_TOPIC, INPUT_TOPIC, OUTPUT_TOPIC};

/// Errors raised at a topic publish call site.
#[derive(Debug, Error, Diagnostic)]
pub enum PublishError {
    /// An empty batch carries no routable payload and is rejected outright.
    #[error("empty batch rejected by topic '{topic}'")]
    #[diagnostic(
        code(topicloom::topics::empty_batch),
        help("publish at least one message; empty batches are never routable")
    )]
    EmptyBatch {
        /// The topic the publish was aimed at.
        topic: String,
    },
}

/// A declared topic: a unique name plus an optional routing condition.
///
/// `Topic` values are cheap to clone and are shared between the nodes that
/// subscribe to them and the nodes that publish to them; the workflow builder
/// collects every referenced `Topic` and materializes one [`TopicLog`] per
/// unique name. Two declarations of the same name must agree on the condition
/// (same shared handle, or both none) — the builder rejects conflicting
/// declarations.
///
/// # Examples
///
/// ```
/// use topicloom::topics::{Topic, tool_call_named};
///
/// let plain = Topic::new("extracted_info");
/// let gated = Topic::new("register_user").with_condition(tool_call_named("register_client"));
/// assert_eq!(plain.name(), "extracted_info");
/// assert!(gated.has_condition());
/// ```
#[derive(Clone)]
pub struct Topic {
    name: String,
    condition: Option<SharedCondition>,
}

impl Topic {
    /// Declares a topic that accepts every batch.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: None,
        }
    }

    /// The reserved topic caller input is published to.
    #[must_use]
    pub fn workflow_input() -> Self {
        Self::new(INPUT_TOPIC)
    }

    /// The reserved topic terminal answers are published to.
    #[must_use]
    pub fn workflow_output() -> Self {
        Self::new(OUTPUT_TOPIC)
    }

    /// The reserved topic that suspends the workflow when published to.
    #[must_use]
    pub fn human_request() -> Self {
        Self::new(HUMAN_REQUEST_TOPIC)
    }

    /// Attaches a routing condition.
    #[must_use]
    pub fn with_condition(mut self, condition: SharedCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// The unique topic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when a routing condition is attached.
    #[must_use]
    pub fn has_condition(&self) -> bool {
        self.condition.is_some()
    }

    pub(crate) fn condition(&self) -> Option<&SharedCondition> {
        self.condition.as_ref()
    }

    /// Whether this topic accepts a batch. No condition means accept all.
    #[must_use]
    pub fn accepts(&self, batch: &[Message]) -> bool {
        match &self.condition {
            Some(condition) => condition.accepts(batch),
            None => true,
        }
    }
}

impl std::fmt::Debug for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name)
            .field("condition", &self.condition.is_some())
            .finish()
    }
}

/// The runtime state of one topic: its append-only batch log and the
/// per-consumer read cursors.
///
/// Created by the workflow builder, one per unique declared name, and owned
/// exclusively by the workflow instance. Every publish and every cursor
/// advance is recorded in the shared [`EventStore`].
///
/// Read semantics: [`poll`](TopicLog::poll) is a pure peek — it scans from
/// the consumer's cursor and returns the first unread batch the topic's
/// condition accepts. Unread batches failing the condition are filtered, not
/// held: they can never be returned, and a later
/// [`mark_consumed`](TopicLog::mark_consumed) jumps the cursor past them
/// permanently.
pub struct TopicLog {
    spec: Topic,
    batches: Vec<Vec<Message>>,
    cursors: FxHashMap<String, usize>,
    store: Arc<EventStore>,
}

impl TopicLog {
    /// Materializes the runtime log for a declared topic.
    #[must_use]
    pub fn new(spec: Topic, store: Arc<EventStore>) -> Self {
        Self {
            spec,
            batches: Vec::new(),
            cursors: FxHashMap::default(),
            store,
        }
    }

    /// The topic name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    /// The declared spec this log was materialized from.
    #[must_use]
    pub fn spec(&self) -> &Topic {
        &self.spec
    }

    /// Number of batches ever published.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// True when nothing has been published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Appends a batch and records a publish event attributed to `publisher`.
    ///
    /// Returns the batch's offset in the log. The only rejection is an empty
    /// batch; condition gating happens on the read side (and, for node
    /// publishes, at dispatch).
    pub fn publish(
        &mut self,
        ctx: &ExecutionContext,
        publisher: &str,
        batch: Vec<Message>,
    ) -> Result<usize, PublishError> {
        if batch.is_empty() {
            return Err(PublishError::EmptyBatch {
                topic: self.spec.name().to_string(),
            });
        }
        let offset = self.batches.len();
        tracing::debug!(
            topic = %self.spec.name(),
            publisher = %publisher,
            offset,
            size = batch.len(),
            "publish"
        );
        self.store.append(TopicEvent::publish(
            ctx,
            self.spec.name(),
            publisher,
            offset,
            batch.clone(),
        ));
        self.batches.push(batch);
        Ok(offset)
    }

    /// Peeks at the next unread batch visible to `consumer`.
    ///
    /// Pure: never advances the cursor. Returns the offset alongside the
    /// batch so the caller can [`mark_consumed`](TopicLog::mark_consumed) it
    /// after a successful firing.
    #[must_use]
    pub fn poll(&self, consumer: &str) -> Option<(usize, &[Message])> {
        let cursor = self.cursor(consumer);
        self.batches
            .iter()
            .enumerate()
            .skip(cursor)
            .find(|(_, batch)| self.spec.accepts(batch))
            .map(|(offset, batch)| (offset, batch.as_slice()))
    }

    /// Advances `consumer`'s cursor just past `offset` and records a consume
    /// event carrying the consumed batch.
    ///
    /// Cursors only move forward: re-consuming an already-passed offset is a
    /// logged no-op, as is an offset beyond the log.
    pub fn mark_consumed(&mut self, ctx: &ExecutionContext, consumer: &str, offset: usize) {
        let Some(batch) = self.batches.get(offset) else {
            tracing::warn!(
                topic = %self.spec.name(),
                consumer = %consumer,
                offset,
                len = self.batches.len(),
                "mark_consumed past end of log ignored"
            );
            return;
        };
        let cursor = self.cursors.entry(consumer.to_string()).or_insert(0);
        if offset < *cursor {
            tracing::warn!(
                topic = %self.spec.name(),
                consumer = %consumer,
                offset,
                cursor = *cursor,
                "mark_consumed behind cursor ignored"
            );
            return;
        }
        *cursor = offset + 1;
        tracing::debug!(
            topic = %self.spec.name(),
            consumer = %consumer,
            offset,
            "consume"
        );
        self.store.append(TopicEvent::consume(
            ctx,
            self.spec.name(),
            consumer,
            offset,
            batch.clone(),
        ));
    }

    /// The consumer's cursor: index of the next unconsumed batch.
    #[must_use]
    pub fn cursor(&self, consumer: &str) -> usize {
        self.cursors.get(consumer).copied().unwrap_or(0)
    }

    pub(crate) fn batch_at(&self, offset: usize) -> Option<&[Message]> {
        self.batches.get(offset).map(Vec::as_slice)
    }
}

impl std::fmt::Debug for TopicLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicLog")
            .field("name", &self.spec.name())
            .field("batches", &self.batches.len())
            .field("cursors", &self.cursors)
            .finish()
    }
}
