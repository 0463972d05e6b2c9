//! Device sessions.
//!
//! A [`Session`] is one authenticated command channel to one device, owned
//! by exactly one operation for its whole lifetime. Sessions are produced by
//! a [`Connector`]; the production connector is [`SshConnector`], and the
//! rest of the crate only depends on the traits.
//!
//! State machine:
//!
//! ```text
//! connect() ──► Connected ──close()──► Disconnected (terminal)
//! ```

mod builder;
mod cli;
#[cfg(test)]
pub(crate) mod mock;
mod ssh;
mod timed;

pub use builder::SshConnectorBuilder;
pub use ssh::{SshConnector, SshSession};
pub use timed::TimedSession;

use std::future::Future;

use serde::Serialize;

use crate::error::{CommandError, ConnectError, PersistError};
use crate::inventory::DeviceDescriptor;
use crate::platform;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Channel is open and accepting commands.
    Connected,
    /// Channel is closed. Terminal.
    Disconnected,
}

/// One remote command-execution channel to one device.
pub trait Session: Send {
    /// Host this session is bound to.
    fn host(&self) -> &str;

    /// Device family used for vendor dispatch.
    fn family(&self) -> &str;

    /// Current lifecycle state.
    fn state(&self) -> SessionState;

    /// Check if the session is connected.
    fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Send an exec-mode command and return its normalized output.
    ///
    /// Calling this on a disconnected session returns
    /// [`CommandError::NotConnected`]; that is a caller bug and is never retried.
    fn send_command(
        &mut self,
        command: &str,
    ) -> impl Future<Output = Result<String, CommandError>> + Send;

    /// Enter configuration mode, apply `commands` in order, and return the
    /// combined output.
    ///
    /// Save-based vendors are back in exec mode afterwards. Commit-based
    /// vendors stay in configuration mode with the changes staged until
    /// [`persist`](Self::persist) commits them; closing the session instead
    /// discards them. A rejected command stops the batch and leaves
    /// configuration mode.
    ///
    /// Output emptiness is not checked here; callers decide what an empty
    /// transcript means.
    fn send_config_set(
        &mut self,
        commands: &[String],
    ) -> impl Future<Output = Result<String, CommandError>> + Send;

    /// Make the running configuration durable using the vendor's
    /// [`PersistAction`](platform::PersistAction).
    ///
    /// The default issues the action's command as is, which suits sessions
    /// that are already in the right mode for it.
    fn persist(&mut self) -> impl Future<Output = Result<(), PersistError>> + Send {
        async move {
            let command = platform::resolve(self.family()).persist.command();
            self.send_command(command)
                .await
                .map(drop)
                .map_err(|source| PersistError {
                    host: self.host().to_string(),
                    source,
                })
        }
    }

    /// Close the session. Idempotent; always leaves the session
    /// [`Disconnected`](SessionState::Disconnected).
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Factory for sessions.
pub trait Connector: Send + Sync {
    /// Session type produced by this connector.
    type Session: Session;

    /// Establish an authenticated session to `device`.
    ///
    /// Every transport or authentication failure comes back as a
    /// [`ConnectError`] carrying the host.
    fn connect(
        &self,
        device: &DeviceDescriptor,
    ) -> impl Future<Output = Result<Self::Session, ConnectError>> + Send;
}
