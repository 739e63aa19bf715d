use rustc_hash::FxHashMap;

use crate::message::Message;
use crate::topics::topic::{Topic, TopicLog};

/// One topic batch matched during readiness evaluation.
///
/// Carries the originating topic and offset so the owning node can mark the
/// batch consumed after its command succeeds.
#[derive(Clone, Debug)]
pub struct MatchedBatch {
    /// Topic the batch was read from.
    pub topic: String,
    /// Offset of the batch within that topic's log.
    pub offset: usize,
    /// The batch payload.
    pub messages: Vec<Message>,
}

/// Boolean composition over topics, deciding when a node is ready to fire.
///
/// A `LEAF` is ready when its topic has an unread batch passing the topic's
/// condition. `AND` is ready when both children are ready in the same tick —
/// no partial joins. `OR` is ready when either child is; branches are tried
/// left to right and only the first ready branch contributes input, so a node
/// never merges two OR branches into one firing.
///
/// Evaluation is a pure peek: it never advances cursors. Consumption happens
/// only when the owning node actually fires.
///
/// # Examples
///
/// ```
/// use topicloom::topics::{SubscriptionExpr, Topic};
///
/// let input = Topic::workflow_input();
/// let human = Topic::human_request();
/// let either = SubscriptionExpr::topic(&input).or(&human);
/// assert_eq!(either.to_string(), "(workflow_input OR human_request)");
/// ```
#[derive(Clone, Debug)]
pub enum SubscriptionExpr {
    /// Ready when the topic has an unread batch its condition accepts.
    Topic(Topic),
    /// Ready when both children are ready; input is left-then-right.
    And(Box<SubscriptionExpr>, Box<SubscriptionExpr>),
    /// Ready when either child is; the first ready branch wins.
    Or(Box<SubscriptionExpr>, Box<SubscriptionExpr>),
}

impl SubscriptionExpr {
    /// A leaf subscription to one topic.
    #[must_use]
    pub fn topic(topic: &Topic) -> Self {
        Self::Topic(topic.clone())
    }

    /// Joins this expression with another: ready only when both are.
    #[must_use]
    pub fn and(self, other: impl Into<SubscriptionExpr>) -> Self {
        Self::And(Box::new(self), Box::new(other.into()))
    }

    /// Alternates this expression with another: ready when either is, this
    /// side tried first.
    #[must_use]
    pub fn or(self, other: impl Into<SubscriptionExpr>) -> Self {
        Self::Or(Box::new(self), Box::new(other.into()))
    }

    /// Every topic declaration referenced by this expression, left to right.
    #[must_use]
    pub fn topics(&self) -> Vec<&Topic> {
        let mut out = Vec::new();
        self.collect_topics(&mut out);
        out
    }

    fn collect_topics<'a>(&'a self, out: &mut Vec<&'a Topic>) {
        match self {
            SubscriptionExpr::Topic(topic) => out.push(topic),
            SubscriptionExpr::And(left, right) | SubscriptionExpr::Or(left, right) => {
                left.collect_topics(out);
                right.collect_topics(out);
            }
        }
    }

    /// Evaluates readiness for `consumer` against the current topic logs.
    ///
    /// Returns the matched batches in deterministic input order (leaf batch;
    /// AND concatenated left-then-right; OR's single winning branch), or
    /// `None` when the node is not ready this tick. Never mutates cursors.
    #[must_use]
    pub fn evaluate(
        &self,
        logs: &FxHashMap<String, TopicLog>,
        consumer: &str,
    ) -> Option<Vec<MatchedBatch>> {
        match self {
            SubscriptionExpr::Topic(topic) => {
                let log = logs.get(topic.name())?;
                log.poll(consumer).map(|(offset, batch)| {
                    vec![MatchedBatch {
                        topic: topic.name().to_string(),
                        offset,
                        messages: batch.to_vec(),
                    }]
                })
            }
            SubscriptionExpr::And(left, right) => {
                let mut matched = left.evaluate(logs, consumer)?;
                let mut rhs = right.evaluate(logs, consumer)?;
                matched.append(&mut rhs);
                Some(matched)
            }
            SubscriptionExpr::Or(left, right) => left
                .evaluate(logs, consumer)
                .or_else(|| right.evaluate(logs, consumer)),
        }
    }

    /// True when an unread batch on `topic_name` alone can make this
    /// expression ready.
    ///
    /// Used by build-time validation to recognize self-feeding loops: a
    /// topic under an AND needs its sibling too, unless both sides resolve
    /// to the same topic.
    pub(crate) fn satisfiable_alone(&self, topic_name: &str) -> bool {
        match self {
            SubscriptionExpr::Topic(topic) => topic.name() == topic_name,
            SubscriptionExpr::And(left, right) => {
                left.satisfiable_alone(topic_name) && right.satisfiable_alone(topic_name)
            }
            SubscriptionExpr::Or(left, right) => {
                left.satisfiable_alone(topic_name) || right.satisfiable_alone(topic_name)
            }
        }
    }
}

impl From<&Topic> for SubscriptionExpr {
    fn from(topic: &Topic) -> Self {
        SubscriptionExpr::topic(topic)
    }
}

impl From<Topic> for SubscriptionExpr {
    fn from(topic: Topic) -> Self {
        SubscriptionExpr::Topic(topic)
    }
}

impl std::fmt::Display for SubscriptionExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionExpr::Topic(topic) => f.write_str(topic.name()),
            SubscriptionExpr::And(left, right) => write!(f, "({left} AND {right})"),
            SubscriptionExpr::Or(left, right) => write!(f, "({left} OR {right})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::event_store::EventStore;
    use crate::message::Message;
    use crate::topics::condition::tool_call_named;
    use std::sync::Arc;

    fn logs_for(topics: &[&Topic]) -> FxHashMap<String, TopicLog> {
        let store = EventStore::shared();
        topics
            .iter()
            .map(|t| {
                (
                    t.name().to_string(),
                    TopicLog::new((*t).clone(), Arc::clone(&store)),
                )
            })
            .collect()
    }

    fn fill(logs: &mut FxHashMap<String, TopicLog>, topic: &str, text: &str) {
        let ctx = ExecutionContext::new("conv");
        logs.get_mut(topic)
            .expect("topic registered")
            .publish(&ctx, "tester", vec![Message::user(text)])
            .expect("non-empty publish");
    }

    #[test]
    fn leaf_readiness_is_a_pure_peek() {
        let a = Topic::new("a");
        let mut logs = logs_for(&[&a]);
        let expr = SubscriptionExpr::topic(&a);

        assert!(expr.evaluate(&logs, "n").is_none());
        fill(&mut logs, "a", "hello");

        let matched = expr.evaluate(&logs, "n").expect("ready");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].topic, "a");
        assert_eq!(matched[0].offset, 0);

        // Evaluation consumed nothing: the same batch is still matched.
        let again = expr.evaluate(&logs, "n").expect("still ready");
        assert_eq!(again[0].offset, 0);
        assert_eq!(logs["a"].cursor("n"), 0);
    }

    #[test]
    fn or_takes_the_left_branch_first() {
        let a = Topic::new("a");
        let b = Topic::new("b");
        let mut logs = logs_for(&[&a, &b]);
        let expr = SubscriptionExpr::topic(&a).or(&b);

        fill(&mut logs, "b", "right");
        let matched = expr.evaluate(&logs, "n").expect("right branch ready");
        assert_eq!(matched[0].topic, "b");

        fill(&mut logs, "a", "left");
        let matched = expr.evaluate(&logs, "n").expect("both ready");
        assert_eq!(matched.len(), 1, "OR never merges branches");
        assert_eq!(matched[0].topic, "a");
    }

    #[test]
    fn and_refuses_partial_joins() {
        let a = Topic::new("a");
        let b = Topic::new("b");
        let mut logs = logs_for(&[&a, &b]);
        let expr = SubscriptionExpr::topic(&a).and(&b);

        fill(&mut logs, "a", "left only");
        assert!(expr.evaluate(&logs, "n").is_none());

        fill(&mut logs, "b", "right too");
        let matched = expr.evaluate(&logs, "n").expect("both sides ready");
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0].topic, "a");
        assert_eq!(matched[1].topic, "b");
    }

    #[test]
    fn conditioned_leaf_ignores_non_matching_batches() {
        let gated = Topic::new("gated").with_condition(tool_call_named("register"));
        let mut logs = logs_for(&[&gated]);
        let expr = SubscriptionExpr::topic(&gated);

        fill(&mut logs, "gated", "plain text");
        assert!(expr.evaluate(&logs, "n").is_none());
    }

    #[test]
    fn satisfiable_alone_respects_join_structure() {
        let a = Topic::new("a");
        let b = Topic::new("b");

        assert!(SubscriptionExpr::topic(&a).satisfiable_alone("a"));
        assert!(!SubscriptionExpr::topic(&a).satisfiable_alone("b"));
        assert!(SubscriptionExpr::topic(&a).or(&b).satisfiable_alone("b"));
        assert!(!SubscriptionExpr::topic(&a).and(&b).satisfiable_alone("a"));
        // Degenerate join of a topic with itself still fires from it alone.
        assert!(SubscriptionExpr::topic(&a).and(&a).satisfiable_alone("a"));
    }

    #[test]
    fn display_renders_the_tree() {
        let a = Topic::new("a");
        let b = Topic::new("b");
        let c = Topic::new("c");
        let expr = SubscriptionExpr::topic(&a).or(&b).and(&c);
        assert_eq!(expr.to_string(), "((a OR b) AND c)");
    }

    #[test]
    fn topics_lists_every_leaf_left_to_right() {
        let a = Topic::new("a");
        let b = Topic::new("b");
        let c = Topic::new("c");
        let expr = SubscriptionExpr::topic(&a).or(&b).and(&c);
        let names: Vec<&str> = expr.topics().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
