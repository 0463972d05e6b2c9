//! Run-wide settings shared by every device operation in a run.

use std::time::Duration;

use serde::Deserialize;

/// Concurrency and timeout settings for an orchestrated run.
///
/// Deserialises from the `settings:` block of an inventory file, with
/// timeouts given in whole seconds:
///
/// ```yaml
/// settings:
///   workers: 8
///   connect_timeout_secs: 15
///   command_timeout_secs: 120
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Maximum number of devices processed concurrently. Never below 1.
    pub workers: usize,

    /// Time allowed to connect and authenticate.
    #[serde(rename = "connect_timeout_secs", with = "secs")]
    pub connect_timeout: Duration,

    /// Time allowed for each command round-trip.
    #[serde(rename = "command_timeout_secs", with = "secs")]
    pub command_timeout: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
        }
    }
}

impl RunSettings {
    /// Set the worker limit (clamped to at least 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-command timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Worker limit as used by the orchestrator.
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
