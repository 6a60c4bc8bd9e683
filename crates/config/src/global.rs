//! Process-wide tunables

use serde::Deserialize;

/// Global settings shared by every component
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default capacity for input queues and subscriber channels
    pub queue_size: usize,

    /// Upper bound on each shutdown stage, in seconds
    pub shutdown_timeout_secs: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            queue_size: 100,
            shutdown_timeout_secs: 5,
        }
    }
}
