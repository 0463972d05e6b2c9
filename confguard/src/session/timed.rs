//! Per-command timeout wrapper.

use std::time::Duration;

use log::warn;

use super::{Session, SessionState};
use crate::error::{CommandError, PersistError};

const CONFIG_SET: &str = "<configuration set>";
const PERSIST: &str = "<persist>";

/// Borrowing wrapper that bounds every command round-trip on the inner
/// session by a fixed timeout.
///
/// A timed-out command becomes [`CommandError::Timeout`] for that device
/// only. The device may still be answering it, so the inner session is
/// closed and every later command fails with [`CommandError::Interrupted`]
/// instead of reading someone else's output.
///
/// Configuration batches get one timeout per line, counting entering and
/// leaving configuration mode.
pub struct TimedSession<'a, S: Session> {
    inner: &'a mut S,
    timeout: Duration,
    interrupted: Option<String>,
}

impl<'a, S: Session> TimedSession<'a, S> {
    /// Wrap `inner`, limiting each command to `timeout`.
    pub fn new(inner: &'a mut S, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            interrupted: None,
        }
    }

    fn batch_budget(&self, commands: usize) -> Duration {
        let lines = u32::try_from(commands.saturating_add(2)).unwrap_or(u32::MAX);
        self.timeout.saturating_mul(lines)
    }

    fn ensure_usable(&self) -> Result<(), CommandError> {
        match &self.interrupted {
            Some(command) => Err(CommandError::Interrupted {
                host: self.inner.host().to_string(),
                command: command.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn expire(&mut self, command: &str, waited: Duration) -> CommandError {
        warn!(
            "Command '{}' on {} timed out after {:?}; closing session",
            command,
            self.inner.host(),
            waited
        );
        self.interrupted = Some(command.to_string());
        self.inner.close().await;
        CommandError::Timeout {
            host: self.inner.host().to_string(),
            command: command.to_string(),
            timeout: waited,
        }
    }
}

impl<S: Session> Session for TimedSession<'_, S> {
    fn host(&self) -> &str {
        self.inner.host()
    }

    fn family(&self) -> &str {
        self.inner.family()
    }

    fn state(&self) -> SessionState {
        self.inner.state()
    }

    async fn send_command(&mut self, command: &str) -> Result<String, CommandError> {
        self.ensure_usable()?;
        let result = tokio::time::timeout(self.timeout, self.inner.send_command(command)).await;
        match result {
            Ok(result) => result,
            Err(_) => Err(self.expire(command, self.timeout).await),
        }
    }

    async fn send_config_set(&mut self, commands: &[String]) -> Result<String, CommandError> {
        self.ensure_usable()?;
        let budget = self.batch_budget(commands.len());
        let result = tokio::time::timeout(budget, self.inner.send_config_set(commands)).await;
        match result {
            Ok(result) => result,
            Err(_) => Err(self.expire(CONFIG_SET, budget).await),
        }
    }

    async fn persist(&mut self) -> Result<(), PersistError> {
        let host = self.inner.host().to_string();
        self.ensure_usable()
            .map_err(|source| PersistError {
                host: host.clone(),
                source,
            })?;
        let result = tokio::time::timeout(self.timeout, self.inner.persist()).await;
        match result {
            Ok(result) => result,
            Err(_) => Err(PersistError {
                host,
                source: self.expire(PERSIST, self.timeout).await,
            }),
        }
    }

    async fn close(&mut self) {
        self.inner.close().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::inventory::DeviceDescriptor;
    use crate::session::Connector;
    use crate::session::mock::{MockConnector, MockDevice};

    fn commands(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("ntp server 10.0.0.{i}")).collect()
    }

    #[tokio::test]
    async fn test_timeout_closes_and_blocks_later_commands() {
        let connector = MockConnector::new().device(
            "r1",
            MockDevice::default()
                .with_output("show slow", "slow output")
                .with_delay("show slow", Duration::from_secs(10))
                .with_output("show fast", "fast output"),
        );
        let mut session = connector
            .connect(&DeviceDescriptor::new("r1", "cisco_ios"))
            .await
            .unwrap();
        let mut timed = TimedSession::new(&mut session, Duration::from_millis(20));

        let err = timed.send_command("show slow").await.unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }));

        let err = timed.send_command("show fast").await.unwrap_err();
        match err {
            CommandError::Interrupted { command, .. } => assert_eq!(command, "show slow"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(timed.state(), SessionState::Disconnected);
        assert!(timed.persist().await.is_err());
        assert_eq!(connector.stats.open_now(), 0);
        assert_eq!(connector.stats.commands_for("r1"), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_config_batch_budget_grows_with_lines() {
        let connector = MockConnector::new().device(
            "r1",
            MockDevice {
                command_delay: Duration::from_millis(15),
                ..MockDevice::default()
            },
        );
        let mut session = connector
            .connect(&DeviceDescriptor::new("r1", "cisco_ios"))
            .await
            .unwrap();
        let mut timed = TimedSession::new(&mut session, Duration::from_millis(40));

        // Six lines at 15ms each outlast one 40ms timeout but fit the
        // per-line budget.
        let output = timed.send_config_set(&commands(6)).await.unwrap();

        assert_eq!(output.lines().count(), 6);
        assert_eq!(connector.stats.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_budget() {
        let connector = MockConnector::new();
        let mut session = connector
            .connect(&DeviceDescriptor::new("r1", "cisco_ios"))
            .await
            .unwrap();
        let timed = TimedSession::new(&mut session, Duration::from_secs(60));

        assert_eq!(timed.batch_budget(0), Duration::from_secs(120));
        assert_eq!(timed.batch_budget(1000), Duration::from_secs(60 * 1002));
    }
}
