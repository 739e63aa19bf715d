mod common;

use common::*;
use topicloom::event_store::TopicEventKind::{Consume, Publish};
use topicloom::message::Message;
use topicloom::node::Node;
use topicloom::topics::{INPUT_TOPIC, OUTPUT_TOPIC, Topic};
use topicloom::workflow::{ExecutionOutcome, Workflow, WorkflowError};

#[tokio::test]
async fn stream_chunks_arrive_as_separate_batches() {
    let input = Topic::workflow_input();
    let output = Topic::workflow_output();
    let mut wf = Workflow::builder("streamy")
        .node(
            Node::builder()
                .name("streamer")
                .subscribe(&input)
                .command(StreamingCommand::new(vec!["thinking", "about", "it"]))
                .publish_to(&output)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let outcome = wf.execute(&ctx(), vec![Message::user("go")]).await.unwrap();
    let ExecutionOutcome::Completed(messages) = outcome else {
        panic!("expected completion, got: {outcome:?}");
    };
    let texts: Vec<&str> = messages.iter().map(Message::text).collect();
    assert_eq!(texts, vec!["thinking", "about", "it"]);

    // Chunks publish as they arrive; the input is consumed only once the
    // stream ends cleanly.
    let events = wf.event_store().get_events();
    assert_eq!(events.len(), 8);
    assert_event(&events[0], Publish, INPUT_TOPIC, "streamy");
    assert_event(&events[1], Publish, OUTPUT_TOPIC, "streamer");
    assert_event(&events[2], Publish, OUTPUT_TOPIC, "streamer");
    assert_event(&events[3], Publish, OUTPUT_TOPIC, "streamer");
    assert_event(&events[4], Consume, INPUT_TOPIC, "streamer");
    assert_event(&events[5], Consume, OUTPUT_TOPIC, "streamy");
    assert_eq!(events[1].offset, 0);
    assert_eq!(events[3].offset, 2);
}

#[tokio::test]
async fn stream_chunks_feed_downstream_one_batch_per_firing() {
    let input = Topic::workflow_input();
    let mid = Topic::new("mid");
    let output = Topic::workflow_output();
    let mut wf = Workflow::builder("pipeline")
        .node(
            Node::builder()
                .name("streamer")
                .subscribe(&input)
                .command(StreamingCommand::new(vec!["one", "two", "three"]))
                .publish_to(&mid)
                .build()
                .unwrap(),
        )
        .node(
            Node::builder()
                .name("formatter")
                .subscribe(&mid)
                .command(EchoCommand)
                .publish_to(&output)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let outcome = wf.execute(&ctx(), vec![Message::user("go")]).await.unwrap();
    let texts: Vec<&str> = outcome.messages().iter().map(Message::text).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);

    // The formatter works the backlog down one batch per pass.
    assert_eq!(wf.topic("mid").unwrap().cursor("formatter"), 3);
    assert_eq!(wf.event_store().len(), 14);
}

#[tokio::test]
async fn broken_stream_keeps_inputs_replayable_and_chunks_committed() {
    let input = Topic::workflow_input();
    let output = Topic::workflow_output();
    let mut wf = Workflow::builder("cutoff")
        .node(
            Node::builder()
                .name("streamer")
                .subscribe(&input)
                .command(BrokenStreamCommand)
                .publish_to(&output)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let err = wf
        .execute(&ctx(), vec![Message::user("go")])
        .await
        .expect_err("the stream drops mid-way");
    match err {
        WorkflowError::Command { node, .. } => assert_eq!(node, "streamer"),
        other => panic!("expected command error, got: {other:?}"),
    }

    // What made it out stays committed; the input batch was never consumed.
    let events = wf.event_store().get_events();
    assert_eq!(events.len(), 2);
    assert_event(&events[0], Publish, INPUT_TOPIC, "cutoff");
    assert_event(&events[1], Publish, OUTPUT_TOPIC, "streamer");
    assert_eq!(wf.topic(OUTPUT_TOPIC).unwrap().len(), 1);
    assert_eq!(wf.topic(INPUT_TOPIC).unwrap().cursor("streamer"), 0);
}
