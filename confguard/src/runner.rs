//! Device Operation Runner: one operation against one device.
//!
//! Every operation follows the same discipline: connect, do the work through
//! a [`TimedSession`], then close the session on every exit path. Failures
//! come back as [`RunError`] values; nothing here panics or aborts a run.

use std::future::Future;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::compliance::{ComplianceReport, RuleEngine, RuleSet};
use crate::error::{CommandError, ConnectError, DeployError, RunError, TransportError};
use crate::inventory::DeviceDescriptor;
use crate::platform;
use crate::session::{Connector, Session, TimedSession};
use crate::settings::RunSettings;

/// Label used in errors for a configuration batch.
const CONFIG_SET: &str = "<configuration set>";

/// Runs single-device operations with shared settings and a shared
/// cancellation token.
pub struct DeviceRunner<'a, C: Connector> {
    connector: &'a C,
    settings: &'a RunSettings,
    cancel: &'a CancellationToken,
}

impl<C: Connector> Clone for DeviceRunner<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: Connector> Copy for DeviceRunner<'_, C> {}

impl<'a, C: Connector> DeviceRunner<'a, C> {
    pub fn new(connector: &'a C, settings: &'a RunSettings, cancel: &'a CancellationToken) -> Self {
        Self {
            connector,
            settings,
            cancel,
        }
    }

    /// Retrieve the running configuration.
    pub async fn backup(&self, device: &DeviceDescriptor) -> Result<String, RunError> {
        info!("{}: retrieving configuration", device.host);
        let mut session = self.connect(device).await?;

        let result = {
            let mut timed = TimedSession::new(&mut session, self.settings.command_timeout);
            self.guard(device, read_config(&mut timed)).await
        };

        session.close().await;
        result
    }

    /// Apply `commands` as one configuration batch and persist it.
    ///
    /// An empty command list is rejected before connecting. Empty batch
    /// output is treated as a failure.
    pub async fn deploy(
        &self,
        device: &DeviceDescriptor,
        commands: &[String],
    ) -> Result<String, RunError> {
        if commands.is_empty() {
            return Err(DeployError::EmptyCommandSet.into());
        }

        info!("{}: deploying {} commands", device.host, commands.len());
        let mut session = self.connect(device).await?;

        let result = {
            let mut timed = TimedSession::new(&mut session, self.settings.command_timeout);
            self.guard(device, apply_config(&mut timed, commands)).await
        };

        session.close().await;
        result
    }

    /// Retrieve the running configuration and evaluate `rules` against it,
    /// running command rules on the same session.
    pub async fn check_live(
        &self,
        device: &DeviceDescriptor,
        rules: &RuleSet,
    ) -> Result<ComplianceReport, RunError> {
        info!("{}: checking compliance", device.host);
        let mut session = self.connect(device).await?;

        let result = {
            let mut timed = TimedSession::new(&mut session, self.settings.command_timeout);
            self.guard(device, async {
                let config = read_config(&mut timed).await?;
                let verdicts = RuleEngine::new(rules).evaluate_live(&config, &mut timed).await;
                Ok::<_, RunError>(ComplianceReport::from_verdicts(&device.host, verdicts))
            })
            .await
        };

        session.close().await;
        result
    }

    /// Connect within the connect timeout, giving up early on cancellation.
    async fn connect(&self, device: &DeviceDescriptor) -> Result<C::Session, RunError> {
        let timeout = self.settings.connect_timeout;

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(cancelled(device)),
            result = tokio::time::timeout(timeout, self.connector.connect(device)) => match result {
                Ok(Ok(session)) => {
                    debug!("{}: connected", device.host);
                    Ok(session)
                }
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(ConnectError::new(&device.host, TransportError::Timeout(timeout)).into()),
            },
        }
    }

    /// Run `work`, abandoning it if the run is cancelled. The caller still
    /// owns the session and closes it afterwards.
    async fn guard<T>(
        &self,
        device: &DeviceDescriptor,
        work: impl Future<Output = Result<T, RunError>>,
    ) -> Result<T, RunError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(cancelled(device)),
            result = work => result,
        }
    }
}

fn cancelled(device: &DeviceDescriptor) -> RunError {
    RunError::Cancelled {
        host: device.host.clone(),
    }
}

async fn read_config<S: Session>(session: &mut S) -> Result<String, RunError> {
    let command = platform::resolve(session.family()).read_command;
    let config = session.send_command(command).await?;
    if config.trim().is_empty() {
        return Err(CommandError::EmptyOutput {
            host: session.host().to_string(),
            command: command.to_string(),
        }
        .into());
    }
    Ok(config)
}

async fn apply_config<S: Session>(session: &mut S, commands: &[String]) -> Result<String, RunError> {
    let output = session.send_config_set(commands).await?;
    if output.trim().is_empty() {
        return Err(CommandError::EmptyOutput {
            host: session.host().to_string(),
            command: CONFIG_SET.to_string(),
        }
        .into());
    }
    session.persist().await?;
    info!("{}: configuration applied and saved", session.host());
    Ok(output)
}

/// Split configuration text into commands.
///
/// Lines are trimmed; blank lines and comment lines starting with `#` or `!`
/// are dropped.
///
/// ```
/// use confguard::runner::parse_command_lines;
///
/// let text = "! NTP\nntp server 10.0.0.1\n\n  # logging\nlogging host 10.0.0.9\n";
/// assert_eq!(parse_command_lines(text), ["ntp server 10.0.0.1", "logging host 10.0.0.9"]);
/// ```
pub fn parse_command_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .map(str::to_string)
        .collect()
}

/// Commands that restore a stored configuration listing on a device of
/// `family`.
///
/// The listing is split with [`parse_command_lines`], then the vendor's
/// listing header and trailer lines are dropped, since they are output of
/// the read command rather than configuration.
///
/// ```
/// use confguard::runner::replay_commands;
///
/// let backup = "Building configuration...\n\nCurrent configuration : 96 bytes\n!\nhostname r1\nntp server 10.0.0.1\n!\nend\n";
/// assert_eq!(replay_commands("cisco_ios", backup), ["hostname r1", "ntp server 10.0.0.1"]);
/// ```
pub fn replay_commands(family: &str, listing: &str) -> Vec<String> {
    platform::resolve(family).replay_commands(parse_command_lines(listing))
}
