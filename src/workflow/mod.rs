//! Workflow assembly and the pass-based scheduling loop.
//!
//! [`WorkflowBuilder`] collects nodes, validates the graph shape (every
//! structural mistake is a [`GraphError`] at build time), and materializes a
//! [`Workflow`]. Execution then runs in passes: each pass scans the nodes in
//! registration order and fires every one whose subscription is ready, until
//! a pass fires nothing (settled), a human-request publish suspends the
//! turn, the pass budget runs out, or the cancellation token fires.
//!
//! The scan order makes execution deterministic: same graph, same inputs,
//! same interleaving, same event log. There is no intra-workflow
//! parallelism, and that is the point — replaying a conversation's events
//! reproduces the run exactly.

mod builder;
mod config;
mod runner;

pub use builder::{GraphError, WorkflowBuilder};
pub use config::WorkflowConfig;
pub use runner::{ExecutionOutcome, Workflow, WorkflowError};
