#![allow(dead_code)]

use topicloom::context::ExecutionContext;
use topicloom::event_store::{EventStore, TopicEvent, TopicEventKind};
use topicloom::node::Node;
use topicloom::topics::Topic;
use topicloom::workflow::Workflow;

use super::commands::EchoCommand;

/// A context with fixed ids so event payloads are fully deterministic.
pub fn ctx() -> ExecutionContext {
    ExecutionContext::with_ids("conv-test", "exec-test", "req-test")
}

/// Single echo node wired input -> output.
pub fn echo_workflow(name: &str) -> Workflow {
    let input = Topic::workflow_input();
    let output = Topic::workflow_output();
    Workflow::builder(name)
        .node(
            Node::builder()
                .name("echo")
                .subscribe(&input)
                .command(EchoCommand)
                .publish_to(&output)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

/// Linear chain of `len` echo nodes threaded through intermediate topics.
///
/// `len` must be at least 1; the last node publishes to the output topic.
pub fn chain_workflow(name: &str, len: usize) -> Workflow {
    assert!(len >= 1, "a chain needs at least one node");
    let output = Topic::workflow_output();
    let mut builder = Workflow::builder(name);
    let mut upstream = Topic::workflow_input();
    for i in 0..len {
        let downstream = if i + 1 == len {
            output.clone()
        } else {
            Topic::new(format!("stage_{i}"))
        };
        builder = builder.node(
            Node::builder()
                .name(format!("echo_{i}"))
                .subscribe(&upstream)
                .command(EchoCommand)
                .publish_to(&downstream)
                .build()
                .unwrap(),
        );
        upstream = downstream;
    }
    builder.build().unwrap()
}

/// Compact audit shape of every recorded event: (kind, topic, actor, offset).
pub fn event_shapes(store: &EventStore) -> Vec<(TopicEventKind, String, String, usize)> {
    store
        .get_events()
        .into_iter()
        .map(|e| (e.kind, e.topic_name, e.node_name, e.offset))
        .collect()
}

pub fn assert_event(event: &TopicEvent, kind: TopicEventKind, topic: &str, actor: &str) {
    assert_eq!(
        event.kind, kind,
        "kind mismatch at sequence {}",
        event.sequence
    );
    assert_eq!(
        event.topic_name, topic,
        "topic mismatch at sequence {}",
        event.sequence
    );
    assert_eq!(
        event.node_name, actor,
        "actor mismatch at sequence {}",
        event.sequence
    );
}
