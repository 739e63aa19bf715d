//! Topics: named, append-only logs of message batches with routing
//! conditions and per-consumer read cursors.
//!
//! Topics are the only communication channel in the engine. Nodes subscribe
//! to boolean combinations of topics ([`SubscriptionExpr`]), and publish
//! their output to topics whose conditions accept it. Three reserved names
//! give a workflow its outer surface:
//!
//! - [`INPUT_TOPIC`] — caller input lands here at the start of every
//!   invocation;
//! - [`OUTPUT_TOPIC`] — batches published here are the invocation's final
//!   answer;
//! - [`HUMAN_REQUEST_TOPIC`] — a publish here suspends the invocation and
//!   hands the batch back to the caller as a request for human input.
//!
//! # Examples
//!
//! ```
//! use topicloom::topics::{SubscriptionExpr, Topic, tool_call_named};
//!
//! let input = Topic::workflow_input();
//! let human = Topic::human_request();
//! let register = Topic::new("register_user").with_condition(tool_call_named("register_client"));
//!
//! // A node could subscribe to either entry path:
//! let subscription = SubscriptionExpr::topic(&input).or(&human);
//! assert!(register.has_condition());
//! assert_eq!(subscription.topics().len(), 2);
//! ```

pub mod condition;
pub mod subscription;
pub mod topic;

pub use condition::{
    SharedCondition, TopicCondition, accept_all, last_message, tool_call_named,
    tool_call_not_named,
};
pub use subscription::{MatchedBatch, SubscriptionExpr};
pub use topic::{PublishError, Topic, TopicLog};

/// Reserved name of the workflow's input topic.
pub const INPUT_TOPIC: &str = "workflow_input";

/// Reserved name of the workflow's output topic.
pub const OUTPUT_TOPIC: &str = "workflow_output";

/// Reserved name of the default human-request topic.
pub const HUMAN_REQUEST_TOPIC: &str = "human_request";
