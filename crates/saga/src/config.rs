use std::time::Duration;

/// Default bound on a single create, update or delete.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Engine-side configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on each write operation. An expired creation is
    /// compensated like any other failed creation.
    pub deadline: Duration,
}

impl EngineConfig {
    /// Creates a configuration with the given deadline.
    pub fn with_deadline(deadline: Duration) -> Self {
        Self { deadline }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
        }
    }
}
