use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::event_store::EventStore;
use crate::node::Node;
use crate::topics::{HUMAN_REQUEST_TOPIC, INPUT_TOPIC, OUTPUT_TOPIC, Topic, TopicLog};
use crate::workflow::config::WorkflowConfig;
use crate::workflow::runner::Workflow;

/// Graph configuration problems, all raised at build time.
///
/// A workflow that builds never raises one of these mid-execution; the
/// builder front-loads every structural check so execution-time failures are
/// limited to collaborator errors.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// A node definition had no (or a blank) name.
    #[error("node definition is missing a name")]
    #[diagnostic(
        code(topicloom::graph::missing_name),
        help("give every node a unique, non-empty name")
    )]
    MissingName,

    /// A node definition had no subscription expression.
    #[error("node '{node}' has no subscription expression")]
    #[diagnostic(
        code(topicloom::graph::missing_subscription),
        help("a node with nothing to subscribe to can never fire")
    )]
    MissingSubscription {
        /// The incomplete node.
        node: String,
    },

    /// A node definition had no command.
    #[error("node '{node}' has no command")]
    #[diagnostic(
        code(topicloom::graph::missing_command),
        help("attach the unit of work with NodeBuilder::command")
    )]
    MissingCommand {
        /// The incomplete node.
        node: String,
    },

    /// The workflow was built with zero nodes.
    #[error("workflow '{workflow}' has no nodes")]
    #[diagnostic(code(topicloom::graph::empty_workflow))]
    EmptyWorkflow {
        /// The workflow being built.
        workflow: String,
    },

    /// Two nodes were registered under the same name.
    #[error("duplicate node name '{node}'")]
    #[diagnostic(
        code(topicloom::graph::duplicate_node),
        help("node names double as consumer ids; they must be unique")
    )]
    DuplicateNode {
        /// The colliding name.
        node: String,
    },

    /// One topic name was declared with two different conditions.
    #[error("topic '{topic}' declared with conflicting conditions")]
    #[diagnostic(
        code(topicloom::graph::topic_conflict),
        help("clone one shared Topic value everywhere instead of re-declaring the name")
    )]
    TopicConflict {
        /// The conflicting topic name.
        topic: String,
    },

    /// A subscription references a topic nothing ever publishes.
    #[error("node '{node}' subscribes to topic '{topic}', which nothing publishes")]
    #[diagnostic(
        code(topicloom::graph::dangling_subscription),
        help("add a publisher for the topic or drop the subscription leaf")
    )]
    DanglingSubscription {
        /// The subscribing node.
        node: String,
        /// The unpublished topic.
        topic: String,
    },

    /// No node subscribes to the workflow input topic.
    #[error("no node subscribes to the input topic '{topic}'")]
    #[diagnostic(
        code(topicloom::graph::no_input_subscriber),
        help("caller input would sit unread forever; subscribe at least one node to it")
    )]
    NoInputSubscriber {
        /// The input topic name.
        topic: String,
    },

    /// No node publishes to the output topic or any human-request topic.
    #[error("no node publishes to the output topic or a human-request topic")]
    #[diagnostic(
        code(topicloom::graph::no_terminal_publisher),
        help("every invocation would end empty; publish somewhere terminal")
    )]
    NoTerminalPublisher,

    /// A node re-triggers itself through an unconditioned topic.
    #[error("node '{node}' re-triggers itself through unconditioned topic '{topic}'")]
    #[diagnostic(
        code(topicloom::graph::unguarded_self_loop),
        help("gate the topic with a condition, or break the loop; as written the node would fire forever")
    )]
    UnguardedSelfLoop {
        /// The self-feeding node.
        node: String,
        /// The ungated topic.
        topic: String,
    },
}

/// Assembles and validates a [`Workflow`].
///
/// Topics are never registered directly: the builder collects every `Topic`
/// referenced by the registered nodes (subscriptions and publish targets),
/// checks the declarations agree, and materializes one log per unique name.
/// Node registration order is firing order among simultaneously ready nodes,
/// so it is part of the workflow's observable semantics.
///
/// # Examples
///
/// See the crate-level quick start; a minimal graph is one node subscribed
/// to [`Topic::workflow_input`] publishing to [`Topic::workflow_output`].
#[derive(Debug, Default)]
pub struct WorkflowBuilder {
    name: String,
    nodes: Vec<Node>,
    event_store: Option<Arc<EventStore>>,
    config: Option<WorkflowConfig>,
    extra_human_topics: Vec<String>,
    cancellation: Option<CancellationToken>,
}

impl WorkflowBuilder {
    /// Starts a workflow definition under the given name.
    ///
    /// The name doubles as the event-log actor for caller-side publishes and
    /// consumes (input publishing, output draining).
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Registers the next node; call order fixes firing order.
    #[must_use]
    pub fn node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Uses a shared event store instead of a private one.
    #[must_use]
    pub fn event_store(mut self, store: Arc<EventStore>) -> Self {
        self.event_store = Some(store);
        self
    }

    /// Overrides the default [`WorkflowConfig`].
    #[must_use]
    pub fn config(mut self, config: WorkflowConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Marks an additional topic name as human-request (suspending).
    ///
    /// [`HUMAN_REQUEST_TOPIC`] always counts; this adds more.
    #[must_use]
    pub fn human_request_topic(mut self, name: impl Into<String>) -> Self {
        self.extra_human_topics.push(name.into());
        self
    }

    /// Installs an externally owned cancellation token.
    #[must_use]
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Validates the graph and materializes the workflow.
    pub fn build(self) -> Result<Workflow, GraphError> {
        let WorkflowBuilder {
            name,
            nodes,
            event_store,
            config,
            extra_human_topics,
            cancellation,
        } = self;

        if nodes.is_empty() {
            return Err(GraphError::EmptyWorkflow { workflow: name });
        }

        let mut seen = FxHashSet::default();
        for node in &nodes {
            if !seen.insert(node.name()) {
                return Err(GraphError::DuplicateNode {
                    node: node.name().to_string(),
                });
            }
        }

        let mut declared: FxHashMap<String, Topic> = FxHashMap::default();
        for node in &nodes {
            for topic in node
                .subscription()
                .topics()
                .into_iter()
                .chain(node.publish_targets())
            {
                declare(&mut declared, topic)?;
            }
        }

        let input_subscribed = nodes.iter().any(|n| {
            n.subscription()
                .topics()
                .iter()
                .any(|t| t.name() == INPUT_TOPIC)
        });
        if !input_subscribed {
            return Err(GraphError::NoInputSubscriber {
                topic: INPUT_TOPIC.to_string(),
            });
        }

        let mut human_topics: FxHashSet<String> = extra_human_topics.into_iter().collect();
        human_topics.insert(HUMAN_REQUEST_TOPIC.to_string());

        let has_terminal = nodes.iter().any(|n| {
            n.publish_targets()
                .iter()
                .any(|t| t.name() == OUTPUT_TOPIC || human_topics.contains(t.name()))
        });
        if !has_terminal {
            return Err(GraphError::NoTerminalPublisher);
        }

        let published: FxHashSet<&str> = nodes
            .iter()
            .flat_map(|n| n.publish_targets().iter().map(Topic::name))
            .collect();
        for node in &nodes {
            for topic in node.subscription().topics() {
                if topic.name() != INPUT_TOPIC && !published.contains(topic.name()) {
                    return Err(GraphError::DanglingSubscription {
                        node: node.name().to_string(),
                        topic: topic.name().to_string(),
                    });
                }
            }
        }

        for node in &nodes {
            for target in node.publish_targets() {
                if !target.has_condition() && node.subscription().satisfiable_alone(target.name())
                {
                    return Err(GraphError::UnguardedSelfLoop {
                        node: node.name().to_string(),
                        topic: target.name().to_string(),
                    });
                }
            }
        }

        warn_dead_end_targets(&nodes, &human_topics);
        warn_unconditioned_cycles(&nodes);

        declared
            .entry(INPUT_TOPIC.to_string())
            .or_insert_with(Topic::workflow_input);
        declared
            .entry(OUTPUT_TOPIC.to_string())
            .or_insert_with(Topic::workflow_output);

        let store = event_store.unwrap_or_else(EventStore::shared);
        let logs: FxHashMap<String, TopicLog> = declared
            .into_iter()
            .map(|(topic_name, spec)| (topic_name, TopicLog::new(spec, Arc::clone(&store))))
            .collect();

        Ok(Workflow::from_parts(
            name,
            nodes,
            logs,
            human_topics,
            store,
            config.unwrap_or_default(),
            cancellation.unwrap_or_default(),
        ))
    }
}

fn declare(declared: &mut FxHashMap<String, Topic>, topic: &Topic) -> Result<(), GraphError> {
    match declared.get(topic.name()) {
        None => {
            declared.insert(topic.name().to_string(), topic.clone());
            Ok(())
        }
        Some(existing) => {
            let compatible = match (existing.condition(), topic.condition()) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            };
            if compatible {
                Ok(())
            } else {
                Err(GraphError::TopicConflict {
                    topic: topic.name().to_string(),
                })
            }
        }
    }
}

/// A target no node subscribes to is legal (messages park there) but usually
/// a wiring mistake, unless it is one of the workflow-facing topics.
fn warn_dead_end_targets(nodes: &[Node], human_topics: &FxHashSet<String>) {
    let subscribed: FxHashSet<&str> = nodes
        .iter()
        .flat_map(|n| {
            n.subscription()
                .topics()
                .into_iter()
                .map(Topic::name)
                .collect::<Vec<_>>()
        })
        .collect();
    for node in nodes {
        for target in node.publish_targets() {
            let name = target.name();
            if name != OUTPUT_TOPIC && !human_topics.contains(name) && !subscribed.contains(name)
            {
                tracing::warn!(
                    node = %node.name(),
                    topic = %name,
                    "publish target has no subscriber and is not workflow-facing"
                );
            }
        }
    }
}

/// Flags cycles that run entirely through unconditioned topics.
///
/// These are not build errors: an AND join inside the cycle can stall it
/// legitimately, so only the pass limit can judge at runtime. The warning
/// points at the wiring before that happens.
fn warn_unconditioned_cycles(nodes: &[Node]) {
    let mut subscribers: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
    for (idx, node) in nodes.iter().enumerate() {
        for topic in node.subscription().topics() {
            subscribers.entry(topic.name()).or_default().push(idx);
        }
    }
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (idx, node) in nodes.iter().enumerate() {
        for target in node.publish_targets() {
            if target.has_condition() {
                continue;
            }
            if let Some(subs) = subscribers.get(target.name()) {
                adjacency[idx].extend(subs.iter().copied());
            }
        }
    }

    // Iterative DFS with tri-state marks; report the first back edge found.
    const UNSEEN: u8 = 0;
    const ACTIVE: u8 = 1;
    const DONE: u8 = 2;
    let mut marks = vec![UNSEEN; nodes.len()];
    for root in 0..nodes.len() {
        if marks[root] != UNSEEN {
            continue;
        }
        let mut stack = vec![(root, 0usize)];
        marks[root] = ACTIVE;
        while let Some(frame) = stack.last().copied() {
            let (node, next) = frame;
            if next < adjacency[node].len() {
                let target = adjacency[node][next];
                if let Some(frame) = stack.last_mut() {
                    frame.1 += 1;
                }
                match marks[target] {
                    UNSEEN => {
                        marks[target] = ACTIVE;
                        stack.push((target, 0));
                    }
                    ACTIVE => {
                        let path: Vec<&str> = stack
                            .iter()
                            .skip_while(|(n, _)| *n != target)
                            .map(|(n, _)| nodes[*n].name())
                            .collect();
                        tracing::warn!(
                            cycle = %path.join(" -> "),
                            "unconditioned publish cycle; termination relies on the pass limit"
                        );
                        return;
                    }
                    _ => {}
                }
            } else {
                marks[node] = DONE;
                stack.pop();
            }
        }
    }
}
