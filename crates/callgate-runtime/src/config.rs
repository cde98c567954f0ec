//! Driver configuration

/// Per-coroutine driver settings
#[derive(Clone, Debug)]
pub struct DriverConfig {
    /// Label for the `coroutine` tracing span and log lines
    pub name: String,
    /// Maximum resumes serviced in one drive cycle before the body is
    /// failed with `SyncResumeLimit` (`None` = unbounded)
    pub max_sync_resumes: Option<usize>,
    /// How deep resumes fired inside `arm` re-enter the body on the arming
    /// stack; deeper ones are queued for the running drive loop
    pub max_reentry_depth: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            name: "coroutine".to_string(),
            max_sync_resumes: None,
            max_reentry_depth: 64,
        }
    }
}

impl DriverConfig {
    pub fn named(name: impl Into<String>) -> Self {
        DriverConfig {
            name: name.into(),
            ..DriverConfig::default()
        }
    }

    pub fn with_max_sync_resumes(mut self, limit: usize) -> Self {
        self.max_sync_resumes = Some(limit);
        self
    }

    pub fn with_max_reentry_depth(mut self, depth: usize) -> Self {
        self.max_reentry_depth = depth;
        self
    }
}
