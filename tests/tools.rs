mod common;

use async_trait::async_trait;
use common::*;
use serde_json::{Map, Value, json};
use topicloom::command::{Command, CommandError};
use topicloom::message::{Message, Role};
use topicloom::node::Node;
use topicloom::tools::{FunctionTool, ToolDispatchCommand, ToolError, ToolRegistry};
use topicloom::topics::Topic;
use topicloom::workflow::{Workflow, WorkflowError};

struct Adder;

#[async_trait]
impl FunctionTool for Adder {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "adds two integers"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "a": {"type": "integer"},
                "b": {"type": "integer"},
            },
            "required": ["a", "b"],
        })
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let term = |key: &str| {
            args.get(key)
                .and_then(Value::as_i64)
                .ok_or_else(|| ToolError::Failed {
                    name: "add".into(),
                    message: format!("missing integer argument '{key}'"),
                })
        };
        Ok((term("a")? + term("b")?).to_string())
    }
}

/// Model node emits a fixed tool call; dispatcher node resolves it.
fn dispatch_workflow(model: impl Command + 'static) -> Workflow {
    let input = Topic::workflow_input();
    let calls = Topic::new("tool_calls");
    let output = Topic::workflow_output();
    Workflow::builder("tooling")
        .node(
            Node::builder()
                .name("model")
                .subscribe(&input)
                .command(model)
                .publish_to(&calls)
                .build()
                .unwrap(),
        )
        .node(
            Node::builder()
                .name("dispatcher")
                .subscribe(&calls)
                .command(ToolDispatchCommand::new(ToolRegistry::new().with_tool(Adder)))
                .publish_to(&output)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

fn dispatch_error(err: WorkflowError) -> ToolError {
    match err {
        WorkflowError::Command {
            node,
            source: CommandError::Tool(tool_err),
        } => {
            assert_eq!(node, "dispatcher");
            tool_err
        }
        other => panic!("expected a dispatcher tool error, got: {other:?}"),
    }
}

#[tokio::test]
async fn dispatch_runs_the_named_tool() {
    let mut wf = dispatch_workflow(ToolCallCommand {
        tool: "add",
        arguments: r#"{"a": 2, "b": 3}"#,
    });
    let outcome = wf
        .execute(&ctx(), vec![Message::user("what is 2 + 3?")])
        .await
        .unwrap();

    let messages = outcome.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::Tool);
    assert_eq!(messages[0].text(), "5");
    assert_eq!(wf.event_store().len(), 6);
}

#[tokio::test]
async fn unknown_tool_surfaces_not_found() {
    let mut wf = dispatch_workflow(ToolCallCommand {
        tool: "vanish",
        arguments: "{}",
    });
    let err = wf
        .execute(&ctx(), vec![Message::user("go")])
        .await
        .expect_err("no such tool");
    match dispatch_error(err) {
        ToolError::NotFound { name } => assert_eq!(name, "vanish"),
        other => panic!("expected NotFound, got: {other:?}"),
    }
    // The failed firing consumed nothing: the call batch is still replayable.
    assert_eq!(wf.topic("tool_calls").unwrap().cursor("dispatcher"), 0);
    assert_eq!(wf.event_store().len(), 3);
}

#[tokio::test]
async fn malformed_arguments_surface_parse() {
    let mut wf = dispatch_workflow(ToolCallCommand {
        tool: "add",
        arguments: "5",
    });
    let err = wf
        .execute(&ctx(), vec![Message::user("go")])
        .await
        .expect_err("arguments are not an object");
    match dispatch_error(err) {
        ToolError::Parse { name, .. } => assert_eq!(name, "add"),
        other => panic!("expected Parse, got: {other:?}"),
    }
}

#[tokio::test]
async fn plain_text_input_surfaces_missing_tool_call() {
    let mut wf = dispatch_workflow(StaticCommand::new("no call here"));
    let err = wf
        .execute(&ctx(), vec![Message::user("go")])
        .await
        .expect_err("nothing to dispatch");
    assert!(matches!(dispatch_error(err), ToolError::MissingToolCall));
}

#[tokio::test]
async fn tool_failure_surfaces_failed() {
    let mut wf = dispatch_workflow(ToolCallCommand {
        tool: "add",
        arguments: r#"{"a": 2}"#,
    });
    let err = wf
        .execute(&ctx(), vec![Message::user("go")])
        .await
        .expect_err("tool rejects partial arguments");
    match dispatch_error(err) {
        ToolError::Failed { name, message } => {
            assert_eq!(name, "add");
            assert!(message.contains("'b'"), "unexpected message: {message}");
        }
        other => panic!("expected Failed, got: {other:?}"),
    }
}
