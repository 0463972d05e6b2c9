//! Builder for the SSH connector.

use std::path::PathBuf;
use std::time::Duration;

use super::ssh::SshConnector;
use crate::transport::HostKeyVerification;

/// Builder for constructing an [`SshConnector`].
///
/// Device-specific parameters (host, port, credentials, family) come from
/// each [`DeviceDescriptor`](crate::inventory::DeviceDescriptor); the builder
/// only holds what is shared by every connection in a run.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use confguard::session::SshConnectorBuilder;
///
/// let connector = SshConnectorBuilder::new()
///     .timeout(Duration::from_secs(10))
///     .known_hosts_path("/etc/confguard/known_hosts")
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct SshConnectorBuilder {
    connector: SshConnector,
}

impl SshConnectorBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SSH inactivity and handshake timeout (default: 30s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.connector.timeout = timeout;
        self
    }

    /// Set the longest single wait for a prompt (default: 300s).
    ///
    /// Per-command limits for a run are applied on top of this by the runner.
    pub fn prompt_timeout(mut self, timeout: Duration) -> Self {
        self.connector.pty.timeout = timeout;
        self
    }

    /// Set terminal dimensions.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.connector.pty.terminal_width = width;
        self.connector.pty.terminal_height = height;
        self
    }

    /// Set how many trailing bytes are searched for the prompt (default: 1000).
    pub fn search_depth(mut self, depth: usize) -> Self {
        self.connector.pty.search_depth = depth;
        self
    }

    /// Set the host key verification mode.
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.connector.host_key_verification = mode;
        self
    }

    /// Use a custom known_hosts file.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.connector.known_hosts_path = Some(path.into());
        self
    }

    /// Accept any host key. Only for lab environments.
    pub fn danger_disable_host_key_verification(mut self) -> Self {
        self.connector.host_key_verification = HostKeyVerification::Disabled;
        self
    }

    /// Build the connector.
    pub fn build(self) -> SshConnector {
        self.connector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let connector = SshConnectorBuilder::new().build();
        assert_eq!(connector.timeout, Duration::from_secs(30));
        assert_eq!(connector.pty.search_depth, 1000);
        assert_eq!(connector.host_key_verification, HostKeyVerification::AcceptNew);
        assert!(connector.known_hosts_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let connector = SshConnectorBuilder::new()
            .timeout(Duration::from_secs(5))
            .terminal_size(200, 50)
            .search_depth(4096)
            .known_hosts_path("/tmp/known_hosts")
            .danger_disable_host_key_verification()
            .build();

        assert_eq!(connector.timeout, Duration::from_secs(5));
        assert_eq!(connector.pty.terminal_width, 200);
        assert_eq!(connector.pty.terminal_height, 50);
        assert_eq!(connector.pty.search_depth, 4096);
        assert_eq!(connector.host_key_verification, HostKeyVerification::Disabled);
        assert_eq!(
            connector.known_hosts_path.as_deref(),
            Some(std::path::Path::new("/tmp/known_hosts"))
        );
    }
}
