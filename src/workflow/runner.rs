use std::io;
use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::command::CommandError;
use crate::context::ExecutionContext;
use crate::event_store::EventStore;
use crate::message::Message;
use crate::node::Node;
use crate::topics::{INPUT_TOPIC, OUTPUT_TOPIC, PublishError, TopicLog};
use crate::workflow::builder::WorkflowBuilder;
use crate::workflow::config::WorkflowConfig;

/// Execution-time failures.
///
/// Structural problems never appear here; they are caught by
/// [`WorkflowBuilder::build`](crate::workflow::WorkflowBuilder::build) as
/// [`GraphError`](crate::workflow::GraphError)s before a workflow exists.
#[derive(Debug, Error, Diagnostic)]
pub enum WorkflowError {
    /// A node's command failed.
    ///
    /// The node's input batches stay unconsumed, so the same invocation can
    /// be retried once the collaborator recovers.
    #[error("node '{node}' failed")]
    #[diagnostic(
        code(topicloom::workflow::command),
        help("the node's inputs stay unconsumed; fix the collaborator and re-run")
    )]
    Command {
        /// The node whose command failed.
        node: String,
        /// The underlying command failure.
        #[source]
        source: CommandError,
    },

    /// A publish was rejected by a topic.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Publish(#[from] PublishError),

    /// The scheduling loop hit its pass budget without settling.
    #[error("workflow did not settle within {limit} passes")]
    #[diagnostic(
        code(topicloom::workflow::pass_limit),
        help("raise WorkflowConfig::max_passes, or break the publish cycle feeding the loop")
    )]
    PassLimitExceeded {
        /// The configured budget.
        limit: usize,
    },

    /// The cancellation token fired before or between passes.
    #[error("workflow execution cancelled")]
    #[diagnostic(code(topicloom::workflow::cancelled))]
    Cancelled,

    /// The blocking facade could not build its private runtime.
    #[error("could not build the blocking runtime")]
    #[diagnostic(code(topicloom::workflow::blocking_runtime))]
    BlockingRuntime(#[source] io::Error),
}

/// How one invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The graph settled; these are the batches drained from the output
    /// topic, flattened in publish order. Empty when no output was produced
    /// this turn.
    Completed(Vec<Message>),
    /// A node published to a human-request topic and the workflow stopped
    /// mid-pass. Present the messages to a human, then call
    /// [`Workflow::execute`] again with their reply.
    Suspended {
        /// The human-request topic that was published to.
        topic: String,
        /// The published request batch.
        messages: Vec<Message>,
    },
}

impl ExecutionOutcome {
    /// The carried messages: drained output, or the suspension request.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        match self {
            ExecutionOutcome::Completed(messages) => messages,
            ExecutionOutcome::Suspended { messages, .. } => messages,
        }
    }

    /// Consumes the outcome, yielding the carried messages.
    #[must_use]
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            ExecutionOutcome::Completed(messages) => messages,
            ExecutionOutcome::Suspended { messages, .. } => messages,
        }
    }

    /// True for [`ExecutionOutcome::Completed`].
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed(_))
    }

    /// True for [`ExecutionOutcome::Suspended`].
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, ExecutionOutcome::Suspended { .. })
    }
}

/// A validated, executable workflow instance.
///
/// Owns the topic logs and read cursors, so state persists across
/// [`execute`](Workflow::execute) calls: a turn that ends
/// [`Suspended`](ExecutionOutcome::Suspended) resumes exactly where it
/// stopped when the caller comes back with the human reply as the next
/// input. All scheduling is single-threaded and driven by node registration
/// order, which makes a run a pure function of inputs and graph shape.
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
/// use topicloom::workflow::Workflow;
///
/// struct Shout;
///
/// #[async_trait]
/// impl Command for Shout {
///     async fn run(
///         &self,
///         _ctx: &ExecutionContext,
///         input: &[Message],
///     ) -> Result<CommandOutput, CommandError> {
///         let text = input.last().map(|m| m.text().to_uppercase()).unwrap_or_default();
///         Ok(CommandOutput::single(Message::assistant(text)))
///     }
/// }
///
/// let input = Topic::workflow_input();
/// let output = Topic::workflow_output();
/// let mut workflow = Workflow::builder("shouter")
///     .node(
///         Node::builder()
///             .name("shout")
///             .subscribe(&input)
///             .command(Shout)
///             .publish_to(&output)
///             .build()
///             .expect("complete node definition"),
///     )
///     .build()
///     .expect("valid graph");
///
/// let ctx = ExecutionContext::new("demo");
/// let outcome = workflow
///     .execute_blocking(&ctx, vec![Message::user("hello")])
///     .expect("execution succeeds");
/// assert_eq!(outcome.messages()[0].text(), "HELLO");
/// ```
pub struct Workflow {
    name: String,
    nodes: Vec<Node>,
    logs: FxHashMap<String, TopicLog>,
    human_topics: FxHashSet<String>,
    event_store: Arc<EventStore>,
    config: WorkflowConfig,
    cancellation: CancellationToken,
}

impl Workflow {
    /// Starts a workflow definition; see [`WorkflowBuilder`].
    #[must_use]
    pub fn builder(name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder::new(name)
    }

    pub(crate) fn from_parts(
        name: String,
        nodes: Vec<Node>,
        logs: FxHashMap<String, TopicLog>,
        human_topics: FxHashSet<String>,
        event_store: Arc<EventStore>,
        config: WorkflowConfig,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            name,
            nodes,
            logs,
            human_topics,
            event_store,
            config,
            cancellation,
        }
    }

    /// The workflow name; also the actor recorded for caller-side events.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The event store every topic in this workflow records into.
    #[must_use]
    pub fn event_store(&self) -> &Arc<EventStore> {
        &self.event_store
    }

    /// The effective scheduling configuration.
    #[must_use]
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// A clone of the cancellation token; cancel it from anywhere to stop
    /// the workflow at the next pass boundary.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Read access to one topic's log, mainly for inspection in tests.
    #[must_use]
    pub fn topic(&self, name: &str) -> Option<&TopicLog> {
        self.logs.get(name)
    }

    /// Runs one turn: publish `input` to the input topic, then fire ready
    /// nodes in registration order, pass after pass, until the graph settles
    /// or a human-request publish suspends it.
    ///
    /// An empty `input` publishes nothing and just resumes pending work —
    /// useful after a suspension whose reply routes elsewhere. Errors leave
    /// the failing node's inputs unconsumed, so calling again retries the
    /// same firing.
    #[instrument(
        level = "info",
        skip_all,
        fields(workflow = %self.name, conversation = %ctx.conversation_id)
    )]
    pub async fn execute(
        &mut self,
        ctx: &ExecutionContext,
        input: Vec<Message>,
    ) -> Result<ExecutionOutcome, WorkflowError> {
        if self.cancellation.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }
        if !input.is_empty() {
            if let Some(log) = self.logs.get_mut(INPUT_TOPIC) {
                log.publish(ctx, &self.name, input)?;
            }
        } else {
            tracing::debug!("no new input; resuming pending work only");
        }

        let mut passes = 0usize;
        loop {
            if self.cancellation.is_cancelled() {
                return Err(WorkflowError::Cancelled);
            }
            if passes >= self.config.max_passes {
                return Err(WorkflowError::PassLimitExceeded {
                    limit: self.config.max_passes,
                });
            }
            passes += 1;

            let mut fired = 0usize;
            let mut suspension: Option<(String, usize)> = None;
            for node in &self.nodes {
                let Some(report) = node.try_fire(ctx, &mut self.logs).await? else {
                    continue;
                };
                fired += 1;
                let human_hit = report
                    .published
                    .into_iter()
                    .find(|(topic, _)| self.human_topics.contains(topic));
                if let Some((topic, offset)) = human_hit {
                    suspension = Some((topic, offset));
                    break;
                }
            }

            if let Some((topic, offset)) = suspension {
                return Ok(self.suspend(ctx, topic, offset));
            }
            if fired == 0 {
                tracing::debug!(passes, "workflow settled");
                break;
            }
        }

        let output = self.drain_output(ctx);
        Ok(ExecutionOutcome::Completed(output))
    }

    /// Synchronous facade over [`execute`](Workflow::execute), driving it on
    /// a private current-thread runtime.
    ///
    /// Must not be called from inside an async runtime; use
    /// [`execute`](Workflow::execute) there instead.
    pub fn execute_blocking(
        &mut self,
        ctx: &ExecutionContext,
        input: Vec<Message>,
    ) -> Result<ExecutionOutcome, WorkflowError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(WorkflowError::BlockingRuntime)?;
        runtime.block_on(self.execute(ctx, input))
    }

    /// Hands the human-request batch to the caller and stops the turn.
    ///
    /// The batch is marked consumed by the workflow itself: it has been
    /// delivered, and a later resume must not trip over it again.
    fn suspend(
        &mut self,
        ctx: &ExecutionContext,
        topic: String,
        offset: usize,
    ) -> ExecutionOutcome {
        let messages = match self.logs.get_mut(&topic) {
            Some(log) => {
                let batch = log.batch_at(offset).map(<[Message]>::to_vec).unwrap_or_default();
                log.mark_consumed(ctx, &self.name, offset);
                batch
            }
            None => Vec::new(),
        };
        tracing::info!(topic = %topic, offset, "suspended for human input");
        ExecutionOutcome::Suspended { topic, messages }
    }

    /// Drains every unread output batch under the workflow's own cursor,
    /// recording a consume event per batch.
    fn drain_output(&mut self, ctx: &ExecutionContext) -> Vec<Message> {
        let Some(log) = self.logs.get_mut(OUTPUT_TOPIC) else {
            return Vec::new();
        };
        let mut drained = Vec::new();
        while let Some((offset, batch)) = log.poll(&self.name) {
            let messages = batch.to_vec();
            log.mark_consumed(ctx, &self.name, offset);
            drained.extend(messages);
        }
        drained
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nodes: Vec<&str> = self.nodes.iter().map(Node::name).collect();
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("nodes", &nodes)
            .field("topics", &self.logs.len())
            .field("max_passes", &self.config.max_passes)
            .finish()
    }
}
