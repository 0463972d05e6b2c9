//! Scripted in-memory sessions for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Connector, Session, SessionState};
use crate::error::{CommandError, ConnectError, TransportError};
use crate::inventory::DeviceDescriptor;

/// Scripted behaviour of one device.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockDevice {
    pub refuse_connect: bool,
    pub connect_delay: Duration,
    pub command_delay: Duration,
    /// Per-command delays overriding `command_delay`.
    pub delays: HashMap<String, Duration>,
    /// Command → output. Unscripted commands produce empty output.
    pub outputs: HashMap<String, String>,
    /// Commands the device rejects.
    pub rejects: HashSet<String>,
    /// Transcript returned by config sets; `None` echoes the commands.
    pub config_output: Option<String>,
}

impl MockDevice {
    pub fn with_output(mut self, command: &str, output: &str) -> Self {
        self.outputs.insert(command.to_string(), output.to_string());
        self
    }

    pub fn with_delay(mut self, command: &str, delay: Duration) -> Self {
        self.delays.insert(command.to_string(), delay);
        self
    }

    fn delay_for(&self, command: &str) -> Duration {
        self.delays.get(command).copied().unwrap_or(self.command_delay)
    }

    pub fn rejecting(mut self, command: &str) -> Self {
        self.rejects.insert(command.to_string());
        self
    }

    pub fn unreachable() -> Self {
        Self {
            refuse_connect: true,
            ..Self::default()
        }
    }
}

/// Counters shared by a connector and all its sessions.
#[derive(Debug, Default)]
pub(crate) struct MockStats {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub open: AtomicUsize,
    pub max_open: AtomicUsize,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl MockStats {
    pub fn open_now(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    pub fn commands_for(&self, host: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, _)| h == host)
            .map(|(_, c)| c.clone())
            .collect()
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockConnector {
    devices: HashMap<String, MockDevice>,
    pub stats: Arc<MockStats>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(mut self, host: &str, device: MockDevice) -> Self {
        self.devices.insert(host.to_string(), device);
        self
    }
}

impl Connector for MockConnector {
    type Session = MockSession;

    async fn connect(&self, device: &DeviceDescriptor) -> Result<MockSession, ConnectError> {
        let script = self.devices.get(&device.host).cloned().unwrap_or_default();
        tokio::time::sleep(script.connect_delay).await;

        if script.refuse_connect {
            return Err(ConnectError::new(
                &device.host,
                TransportError::ConnectionFailed {
                    host: device.host.clone(),
                    port: device.port,
                    source: std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "connection refused",
                    ),
                },
            ));
        }

        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        let open = self.stats.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_open.fetch_max(open, Ordering::SeqCst);

        Ok(MockSession {
            host: device.host.clone(),
            family: device.family.clone(),
            script,
            state: SessionState::Connected,
            in_flight: None,
            stats: self.stats.clone(),
        })
    }
}

pub(crate) struct MockSession {
    host: String,
    family: String,
    script: MockDevice,
    state: SessionState,
    /// Command abandoned mid-reply. Like a real PTY, its output is what the
    /// next read sees.
    in_flight: Option<String>,
    stats: Arc<MockStats>,
}

impl MockSession {
    fn record(&self, command: &str) {
        self.stats
            .sent
            .lock()
            .unwrap()
            .push((self.host.clone(), command.to_string()));
    }

    fn ensure_connected(&self) -> Result<(), CommandError> {
        match self.state {
            SessionState::Connected => Ok(()),
            SessionState::Disconnected => Err(CommandError::NotConnected {
                host: self.host.clone(),
            }),
        }
    }

    fn check_rejected(&self, command: &str) -> Result<(), CommandError> {
        if self.script.rejects.contains(command) {
            return Err(CommandError::Rejected {
                host: self.host.clone(),
                command: command.to_string(),
                message: "% Invalid input detected".to_string(),
            });
        }
        Ok(())
    }
}

impl Session for MockSession {
    fn host(&self) -> &str {
        &self.host
    }

    fn family(&self) -> &str {
        &self.family
    }

    fn state(&self) -> SessionState {
        self.state
    }

    async fn send_command(&mut self, command: &str) -> Result<String, CommandError> {
        self.ensure_connected()?;
        let stale = self.in_flight.replace(command.to_string());
        tokio::time::sleep(self.script.delay_for(command)).await;
        self.in_flight = None;
        self.record(command);
        self.check_rejected(command)?;
        let answered = stale.as_deref().unwrap_or(command);
        Ok(self.script.outputs.get(answered).cloned().unwrap_or_default())
    }

    async fn send_config_set(&mut self, commands: &[String]) -> Result<String, CommandError> {
        self.ensure_connected()?;
        for command in commands {
            tokio::time::sleep(self.script.delay_for(command)).await;
            self.record(command);
            self.check_rejected(command)?;
        }
        Ok(self
            .script
            .config_output
            .clone()
            .unwrap_or_else(|| commands.join("\n")))
    }

    async fn close(&mut self) {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        if self.state == SessionState::Connected {
            self.state = SessionState::Disconnected;
            self.stats.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_twice_is_harmless() {
        let connector = MockConnector::new();
        let device = DeviceDescriptor::new("r1", "cisco_ios");
        let mut session = connector.connect(&device).await.unwrap();

        session.close().await;
        session.close().await;

        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(connector.stats.open_now(), 0);
    }

    #[tokio::test]
    async fn test_command_on_closed_session_fails_fast() {
        let connector = MockConnector::new();
        let device = DeviceDescriptor::new("r1", "cisco_ios");
        let mut session = connector.connect(&device).await.unwrap();
        session.close().await;

        let err = session.send_command("show version").await.unwrap_err();
        assert!(matches!(err, CommandError::NotConnected { .. }));
    }

    #[tokio::test]
    async fn test_default_persist_saves_on_cisco() {
        let connector = MockConnector::new();
        let device = DeviceDescriptor::new("r1", "cisco_ios");
        let mut session = connector.connect(&device).await.unwrap();

        session.persist().await.unwrap();
        session.close().await;

        assert_eq!(connector.stats.commands_for("r1"), ["write memory"]);
    }

    #[tokio::test]
    async fn test_default_persist_commits_on_juniper() {
        let connector = MockConnector::new();
        let device = DeviceDescriptor::new("r2", "juniper_junos");
        let mut session = connector.connect(&device).await.unwrap();

        session.persist().await.unwrap();
        session.close().await;

        assert_eq!(connector.stats.commands_for("r2"), ["commit and-quit"]);
    }

    #[tokio::test]
    async fn test_abandoned_reply_leaks_into_next_read() {
        let connector = MockConnector::new().device(
            "r1",
            MockDevice::default()
                .with_output("show slow", "slow output")
                .with_delay("show slow", Duration::from_secs(10))
                .with_output("show fast", "fast output"),
        );
        let device = DeviceDescriptor::new("r1", "cisco_ios");
        let mut session = connector.connect(&device).await.unwrap();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), session.send_command("show slow")).await;
        assert!(abandoned.is_err());

        assert_eq!(session.send_command("show fast").await.unwrap(), "slow output");
        session.close().await;
    }

    #[tokio::test]
    async fn test_persist_failure_is_distinct() {
        let connector =
            MockConnector::new().device("r1", MockDevice::default().rejecting("write memory"));
        let device = DeviceDescriptor::new("r1", "cisco_ios");
        let mut session = connector.connect(&device).await.unwrap();

        let err = session.persist().await.unwrap_err();
        session.close().await;

        assert_eq!(err.host, "r1");
        assert!(matches!(err.source, CommandError::Rejected { .. }));
    }
}
