//! russh-backed sessions driving a device CLI over an interactive shell.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, warn};
use regex::bytes::Regex;

use super::cli::{Cli, LineIo};
use super::{Connector, Session, SessionState};
use crate::channel::{PtyChannel, PtyConfig};
use crate::error::{CommandError, ConnectError, PersistError, TransportError};
use crate::inventory::DeviceDescriptor;
use crate::platform::{self, VendorProfile};
use crate::transport::{HostKeyVerification, SshConfig, SshTransport};

/// Upper bound on each step of closing a session.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Produces [`SshSession`]s. Build one with [`SshConnectorBuilder`](super::SshConnectorBuilder).
#[derive(Debug, Clone)]
pub struct SshConnector {
    pub(super) timeout: Duration,
    pub(super) pty: PtyConfig,
    pub(super) host_key_verification: HostKeyVerification,
    pub(super) known_hosts_path: Option<PathBuf>,
}

impl Default for SshConnector {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            pty: PtyConfig::default(),
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }
}

impl SshConnector {
    fn ssh_config(&self, device: &DeviceDescriptor) -> SshConfig {
        SshConfig {
            host: device.host.clone(),
            port: device.port,
            username: device.credentials.username.clone(),
            timeout: self.timeout,
            terminal_width: self.pty.terminal_width,
            terminal_height: self.pty.terminal_height,
            host_key_verification: self.host_key_verification.clone(),
            known_hosts_path: self.known_hosts_path.clone(),
        }
    }

    async fn open(&self, device: &DeviceDescriptor) -> Result<SshSession, TransportError> {
        let profile = platform::resolve(&device.family);
        let prompt = Regex::new(profile.prompt_pattern)?;

        let transport = SshTransport::connect(self.ssh_config(device), &device.credentials).await?;
        let shell = match transport.open_shell().await {
            Ok(shell) => shell,
            Err(e) => {
                transport.close().await.ok();
                return Err(e);
            }
        };

        let mut lines = PtyLines {
            channel: PtyChannel::new(shell, &self.pty),
            prompt,
        };
        if let Err(e) = lines.channel.read_until(&lines.prompt).await {
            teardown(&device.host, "disconnect", CLOSE_TIMEOUT, transport.close()).await;
            return Err(e);
        }

        let mut session = SshSession {
            family: device.family.clone(),
            cli: Cli::new(device.host.clone(), profile, lines),
            transport: Some(transport),
        };

        if let Err(e) = session.prepare().await {
            session.close().await;
            return Err(e);
        }

        Ok(session)
    }
}

impl Connector for SshConnector {
    type Session = SshSession;

    async fn connect(&self, device: &DeviceDescriptor) -> Result<SshSession, ConnectError> {
        self.open(device)
            .await
            .map_err(|source| ConnectError::new(&device.host, source))
    }
}

/// Prompt-delimited line I/O over a PTY shell.
struct PtyLines {
    channel: PtyChannel,
    prompt: Regex,
}

impl LineIo for PtyLines {
    async fn exchange(&mut self, line: &str) -> Result<String, TransportError> {
        self.channel.send_line(line).await?;
        let raw = self.channel.read_until(&self.prompt).await?;
        Ok(normalize_output(&raw, line, &self.prompt))
    }
}

/// Interactive CLI session to one device.
pub struct SshSession {
    family: String,
    cli: Cli<PtyLines>,
    transport: Option<SshTransport>,
}

impl SshSession {
    /// Vendor profile this session speaks.
    pub fn profile(&self) -> &'static VendorProfile {
        self.cli.profile()
    }

    /// Disable paging.
    async fn prepare(&mut self) -> Result<(), TransportError> {
        for command in self.cli.profile().on_open_commands {
            match self.cli.send_command(command).await {
                Ok(_) => {}
                Err(CommandError::Transport { source, .. }) => return Err(source),
                Err(e) => warn!("{}: session setup command failed: {}", self.cli.host(), e),
            }
        }
        Ok(())
    }
}

impl Session for SshSession {
    fn host(&self) -> &str {
        self.cli.host()
    }

    fn family(&self) -> &str {
        &self.family
    }

    fn state(&self) -> SessionState {
        if self.cli.is_open() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    async fn send_command(&mut self, command: &str) -> Result<String, CommandError> {
        self.cli.send_command(command).await
    }

    async fn send_config_set(&mut self, commands: &[String]) -> Result<String, CommandError> {
        self.cli.send_config_set(commands).await
    }

    async fn persist(&mut self) -> Result<(), PersistError> {
        self.cli.persist().await.map_err(|source| PersistError {
            host: self.cli.host().to_string(),
            source,
        })
    }

    async fn close(&mut self) {
        let host = self.cli.host().to_string();
        if self.cli.is_open() {
            teardown(&host, "discard staged changes", CLOSE_TIMEOUT, self.cli.discard_staged()).await;
        }
        if let Some(lines) = self.cli.take_io() {
            teardown(&host, "channel close", CLOSE_TIMEOUT, lines.channel.close()).await;
        }
        if let Some(transport) = self.transport.take() {
            teardown(&host, "disconnect", CLOSE_TIMEOUT, transport.close()).await;
        }
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if self.cli.is_open() {
            warn!("Session to {} dropped without close()", self.cli.host());
        }
    }
}

/// Run one teardown step, logging failures. Gives up after `limit` so an
/// unresponsive peer cannot hold up closing.
async fn teardown<E: fmt::Display>(
    host: &str,
    step: &str,
    limit: Duration,
    work: impl Future<Output = Result<(), E>>,
) {
    match tokio::time::timeout(limit, work).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("{}: {}: {}", host, step, e),
        Err(_) => warn!("{}: {} did not finish within {:?}", host, step, limit),
    }
}

/// Strip the command echo from the front and the trailing prompt from the end.
fn normalize_output(raw: &[u8], command: &str, prompt: &Regex) -> String {
    let end = prompt
        .find_iter(raw)
        .last()
        .map(|m| m.start())
        .unwrap_or(raw.len());
    let body = &raw[..end];

    // The first line is the echoed command.
    let body = match memchr::memchr(b'\n', body) {
        Some(pos) if String::from_utf8_lossy(&body[..pos]).trim_end().ends_with(command.trim()) => {
            &body[pos + 1..]
        }
        None if String::from_utf8_lossy(body).trim_end().ends_with(command.trim()) => &[][..],
        _ => body,
    };

    String::from_utf8_lossy(body).trim_end().to_string()
}
