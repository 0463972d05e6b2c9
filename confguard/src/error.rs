//! Error types for confguard.
//!
//! Errors are split by category so callers can tell "device unreachable"
//! apart from "rule malformed" apart from "no data available". Per-device
//! errors never escape an orchestrated run; they are recorded on the
//! device's outcome instead.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for confguard operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Could not establish a session to a device
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// A command sent over a session failed
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Configuration was applied but could not be made durable
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Rule file could not be loaded
    #[error("Rule error: {0}")]
    Rule(#[from] RuleLoadError),

    /// Inventory file could not be loaded
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Backup storage errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Deploy request was rejected before any device was touched
    #[error("Deploy error: {0}")]
    Deploy(#[from] DeployError),
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// No credentials were supplied for the device
    #[error("No password or key file configured for user '{user}'")]
    MissingCredentials { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key not present in known_hosts (strict mode)
    #[error("Host key for {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Failed to open the interactive shell channel
    #[error("Failed to open shell channel")]
    ShellOpenFailed,

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid prompt pattern in a vendor profile
    #[error("Invalid prompt pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failure to establish a session with one device.
#[derive(Error, Debug)]
#[error("Failed to connect to {host}: {source}")]
pub struct ConnectError {
    /// Device the connection was attempted against.
    pub host: String,
    /// Underlying transport or authentication failure.
    #[source]
    pub source: TransportError,
}

impl ConnectError {
    /// Create a connect error for `host`.
    pub fn new(host: impl Into<String>, source: TransportError) -> Self {
        Self {
            host: host.into(),
            source,
        }
    }
}

/// Command execution errors on an established session.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Session was never connected, or was already closed
    #[error("Session to {host} is not connected")]
    NotConnected { host: String },

    /// No prompt within the command timeout
    #[error("Command '{command}' on {host} timed out after {timeout:?}")]
    Timeout {
        host: String,
        command: String,
        timeout: Duration,
    },

    /// Device output matched a vendor failure pattern
    #[error("Command '{command}' rejected by {host}: {message}")]
    Rejected {
        host: String,
        command: String,
        message: String,
    },

    /// An earlier command was abandoned before its reply was read, so the
    /// CLI output can no longer be attributed to commands
    #[error("Session to {host} is unusable: reply to '{command}' was never read")]
    Interrupted { host: String, command: String },

    /// Command produced no output
    #[error("Command '{command}' returned no output on {host}")]
    EmptyOutput { host: String, command: String },

    /// Transport failure while the command was in flight
    #[error("Command '{command}' on {host} failed: {source}")]
    Transport {
        host: String,
        command: String,
        #[source]
        source: TransportError,
    },
}

/// Save or commit failed after configuration was applied.
#[derive(Error, Debug)]
#[error("Configuration applied on {host} but not saved: {source}")]
pub struct PersistError {
    /// Device the persist step ran against.
    pub host: String,
    /// Failure of the save/commit command.
    #[source]
    pub source: CommandError,
}

/// Rule file loading errors.
#[derive(Error, Debug)]
pub enum RuleLoadError {
    /// Rule declares a kind the engine does not know
    #[error(
        "Rule '{rule}' has unknown type '{kind}' (expected must_contain, must_not_contain, regex or command)"
    )]
    UnknownKind { rule: String, kind: String },

    /// Rule is missing a parameter its kind requires
    #[error("Rule '{rule}' of type '{kind}' is missing required field '{field}'")]
    MissingField {
        rule: String,
        kind: String,
        field: &'static str,
    },

    /// Malformed JSON
    #[error("Failed to parse rules: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rule file could not be read or written
    #[error("Rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Fault while evaluating one rule. Always converted into a
/// non-compliant verdict, never propagated past the rule engine.
#[derive(Error, Debug)]
pub enum RuleEvaluationError {
    /// Regex pattern does not compile
    #[error("Invalid regex: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The rule's command failed on the device
    #[error("{0}")]
    Command(#[from] CommandError),

    /// Command rule evaluated without a live session
    #[error("No live session available for command check")]
    NoSession,
}

/// Inventory loading errors.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Malformed YAML
    #[error("Failed to parse inventory: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Inventory file could not be read
    #[error("Inventory file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Two devices share a host
    #[error("Duplicate device host '{host}' in inventory")]
    DuplicateHost { host: String },

    /// Device entry with a blank host
    #[error("Device at position {index} has an empty host")]
    EmptyHost { index: usize },
}

/// Backup storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem failure
    #[error("Backup store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Deploy request errors detected before contacting devices.
#[derive(Error, Debug)]
pub enum DeployError {
    /// Nothing to deploy
    #[error("No configuration commands to deploy")]
    EmptyCommandSet,
}

/// No live session requested and no stored configuration for the device.
#[derive(Error, Debug)]
#[error("No configuration available for {host}")]
pub struct ConfigurationUnavailable {
    /// Device that had no configuration source.
    pub host: String,
}

/// Failure of one device operation inside a run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Unavailable(#[from] ConfigurationUnavailable),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    /// Backup retrieved but could not be stored
    #[error("Backup of {host} could not be stored: {source}")]
    Store {
        host: String,
        #[source]
        source: StoreError,
    },

    /// Host already appeared earlier in the same run
    #[error("Device {host} is listed more than once; only its first entry runs")]
    DuplicateHost { host: String },

    /// Run was cancelled while this device was in flight
    #[error("Operation on {host} cancelled")]
    Cancelled { host: String },
}

impl RunError {
    /// Whether this failure was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled { .. })
    }
}

/// Result type alias using confguard's Error.
pub type Result<T> = std::result::Result<T, Error>;
