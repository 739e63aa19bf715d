/// Tunables for one workflow instance.
///
/// Resolution order follows the usual layering: explicit construction wins,
/// otherwise the environment (via `dotenvy`, so a local `.env` file works),
/// otherwise the built-in default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Upper bound on scheduling passes per invocation.
    ///
    /// The dynamic guard against graphs that never reach a fixed point;
    /// exceeding it fails the invocation with
    /// [`WorkflowError::PassLimitExceeded`](crate::workflow::WorkflowError).
    pub max_passes: usize,
}

impl WorkflowConfig {
    /// Default pass budget per invocation.
    pub const DEFAULT_MAX_PASSES: usize = 64;

    /// Environment variable overriding the pass budget.
    pub const MAX_PASSES_ENV: &'static str = "TOPICLOOM_MAX_PASSES";

    /// Builds a config with an explicit pass budget.
    ///
    /// A zero budget would fail every invocation before its first pass, so
    /// zero falls back to the default.
    #[must_use]
    pub fn new(max_passes: usize) -> Self {
        if max_passes == 0 {
            tracing::warn!("max_passes of 0 is unusable; using default");
            return Self::default();
        }
        Self { max_passes }
    }

    fn resolve_max_passes() -> usize {
        dotenvy::dotenv().ok();
        match std::env::var(Self::MAX_PASSES_ENV) {
            Ok(raw) => match raw.parse::<usize>() {
                Ok(parsed) if parsed > 0 => parsed,
                _ => {
                    tracing::warn!(
                        value = %raw,
                        "ignoring unparseable {} override",
                        Self::MAX_PASSES_ENV
                    );
                    Self::DEFAULT_MAX_PASSES
                }
            },
            Err(_) => Self::DEFAULT_MAX_PASSES,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_passes: Self::resolve_max_passes(),
        }
    }
}
