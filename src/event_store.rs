//! Append-only audit log of topic activity.
//!
//! Every batch that lands on or leaves a topic is recorded here as a
//! [`TopicEvent`]. The log is the engine's source of truth for replay
//! counting: a fixed scenario always yields the same sequence of events, so
//! tests (and callers auditing a conversation) can assert exact counts and
//! ordering. The store is shared — one store typically serves many workflow
//! instances, each a separate conversation — and is handed to
//! [`WorkflowBuilder::event_store`](crate::workflow::WorkflowBuilder::event_store)
//! explicitly rather than living in ambient global state.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::message::Message;

/// Whether a batch landed on a topic or was consumed from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicEventKind {
    /// A batch was appended to a topic log.
    Publish,
    /// A consumer's cursor advanced past a batch.
    Consume,
}

/// One immutable audit record of topic activity.
///
/// `sequence` is stamped by the [`EventStore`] on append and is globally
/// monotone within the store; together with the embedded
/// [`ExecutionContext`] it gives a total order over everything a set of
/// workflows did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicEvent {
    /// Store-assigned global sequence number.
    pub sequence: u64,
    /// Publish or consume.
    pub kind: TopicEventKind,
    /// Correlation ids of the invocation that produced this event.
    pub context: ExecutionContext,
    /// The topic the batch landed on / left.
    pub topic_name: String,
    /// The actor: publishing node, consuming node, or the workflow itself.
    pub node_name: String,
    /// Batch index within the topic log.
    pub offset: usize,
    /// The batch payload.
    pub messages: Vec<Message>,
    /// Wall-clock time of the append.
    pub recorded_at: DateTime<Utc>,
}

impl TopicEvent {
    /// Builds a publish record. `sequence` is stamped on append.
    #[must_use]
    pub fn publish(
        context: &ExecutionContext,
        topic_name: impl Into<String>,
        node_name: impl Into<String>,
        offset: usize,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            sequence: 0,
            kind: TopicEventKind::Publish,
            context: context.clone(),
            topic_name: topic_name.into(),
            node_name: node_name.into(),
            offset,
            messages,
            recorded_at: Utc::now(),
        }
    }

    /// Builds a consume record. `sequence` is stamped on append.
    #[must_use]
    pub fn consume(
        context: &ExecutionContext,
        topic_name: impl Into<String>,
        node_name: impl Into<String>,
        offset: usize,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            sequence: 0,
            kind: TopicEventKind::Consume,
            context: context.clone(),
            topic_name: topic_name.into(),
            node_name: node_name.into(),
            offset,
            messages,
            recorded_at: Utc::now(),
        }
    }

    /// True for publish records.
    #[must_use]
    pub fn is_publish(&self) -> bool {
        self.kind == TopicEventKind::Publish
    }

    /// True for consume records.
    #[must_use]
    pub fn is_consume(&self) -> bool {
        self.kind == TopicEventKind::Consume
    }
}

struct StoreInner {
    events: Vec<TopicEvent>,
    subscribers: Vec<flume::Sender<TopicEvent>>,
}

/// Append-only, process-shareable event log.
///
/// Appends are safe from any number of workflow instances concurrently
/// (different conversations); the scheduling loop itself only ever appends,
/// never reads mid-firing. `clear` exists for test isolation and resets the
/// sequence counter, so a cleared store replays a scenario with identical
/// numbering.
///
/// # Examples
///
/// ```
/// use topicloom::context::ExecutionContext;
/// use topicloom::event_store::{EventStore, TopicEvent};
/// use topicloom::message::Message;
///
/// let store = EventStore::new();
/// let ctx = ExecutionContext::new("conv");
/// let seq = store.append(TopicEvent::publish(
///     &ctx,
///     "workflow_input",
///     "demo",
///     0,
///     vec![Message::user("hi")],
/// ));
/// assert_eq!(seq, 0);
/// assert_eq!(store.len(), 1);
/// ```
pub struct EventStore {
    inner: Mutex<StoreInner>,
}

impl EventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                events: Vec::new(),
                subscribers: Vec::new(),
            }),
        }
    }

    /// Creates an empty store behind an [`Arc`], ready to share across
    /// workflows.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Appends an event, stamping and returning its global sequence number.
    ///
    /// Live subscribers receive a copy; disconnected subscribers are pruned.
    pub fn append(&self, mut event: TopicEvent) -> u64 {
        let mut inner = self.inner.lock().expect("event store poisoned");
        let sequence = inner.events.len() as u64;
        event.sequence = sequence;
        let before = inner.subscribers.len();
        inner
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
        let pruned = before - inner.subscribers.len();
        if pruned > 0 {
            tracing::debug!(pruned, "pruned disconnected event subscribers");
        }
        inner.events.push(event);
        sequence
    }

    /// Snapshot of all recorded events in sequence order.
    #[must_use]
    pub fn get_events(&self) -> Vec<TopicEvent> {
        self.inner.lock().expect("event store poisoned").events.clone()
    }

    /// Events belonging to one conversation, in sequence order.
    #[must_use]
    pub fn conversation_events(&self, conversation_id: &str) -> Vec<TopicEvent> {
        self.inner
            .lock()
            .expect("event store poisoned")
            .events
            .iter()
            .filter(|e| e.context.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("event store poisoned").events.len()
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all recorded events and restarts sequence numbering at zero.
    ///
    /// Test/debug only; live subscribers stay attached.
    pub fn clear(&self) {
        self.inner.lock().expect("event store poisoned").events.clear();
    }

    /// Subscribes to events appended from now on.
    ///
    /// Returns an unbounded receiver fed a copy of every subsequent append —
    /// the live-observation path for streaming publishes. Dropping the
    /// receiver detaches it on the next append.
    #[must_use]
    pub fn subscribe(&self) -> flume::Receiver<TopicEvent> {
        let (tx, rx) = flume::unbounded();
        self.inner
            .lock()
            .expect("event store poisoned")
            .subscribers
            .push(tx);
        rx
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().expect("event store poisoned");
        f.debug_struct("EventStore")
            .field("events", &inner.events.len())
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}
