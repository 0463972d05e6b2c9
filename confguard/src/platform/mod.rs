//! Vendor dispatch for multi-vendor support.
//!
//! Every device family resolves to a [`VendorProfile`]: the command used to
//! read the running configuration, how configuration is made durable, and the
//! session behaviour (prompt, paging, config mode, failure patterns) needed to
//! drive the CLI. The table is static data. Adding a family means adding a
//! profile to [`VENDORS`], not another branch.
//!
//! ```
//! use confguard::platform::{self, PersistAction};
//!
//! let profile = platform::resolve("juniper_junos");
//! assert_eq!(profile.read_command, "show configuration | display set");
//! assert_eq!(profile.persist, PersistAction::Commit("commit and-quit"));
//!
//! // Unknown families fall back to the generic profile.
//! assert_eq!(platform::resolve("mikrotik").name, "generic");
//! ```

pub mod vendors;

use log::debug;

/// How a vendor makes the running configuration durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistAction {
    /// Issue a device-native save command from exec mode.
    Save(&'static str),

    /// Issue a commit command from inside configuration mode. The command
    /// also leaves configuration mode, so changes staged by a configuration
    /// batch are never left uncommitted on exit.
    Commit(&'static str),
}

impl PersistAction {
    /// Whether changes stay staged in configuration mode until this action runs.
    pub fn is_commit(&self) -> bool {
        matches!(self, PersistAction::Commit(_))
    }

    /// The command text issued for this action.
    pub fn command(&self) -> &'static str {
        match self {
            PersistAction::Save(cmd) | PersistAction::Commit(cmd) => cmd,
        }
    }
}

/// Vendor-specific command dialect and CLI behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorProfile {
    /// Profile name (e.g., "cisco", "juniper").
    pub name: &'static str,

    /// Substring matched (case-insensitively) against the device family.
    /// `None` only for the fallback profile.
    pub family_key: Option<&'static str>,

    /// Command that prints the full running configuration.
    pub read_command: &'static str,

    /// Save/commit behaviour.
    pub persist: PersistAction,

    /// Regex matching any CLI prompt of this vendor (exec and config modes).
    pub prompt_pattern: &'static str,

    /// Commands run after login to disable paging and widen the terminal.
    pub on_open_commands: &'static [&'static str],

    /// Command entering configuration mode.
    pub config_enter: &'static str,

    /// Command leaving configuration mode back to exec.
    pub config_exit: &'static str,

    /// Command discarding uncommitted changes before leaving configuration
    /// mode. Only candidate-based vendors have one.
    pub config_discard: Option<&'static str>,

    /// Line prefixes the read command prints ahead of the configuration
    /// itself ("Building configuration...").
    pub listing_header: &'static [&'static str],

    /// Final line of a configuration listing that is not a command.
    pub listing_trailer: Option<&'static str>,

    /// Output substrings that mean the device rejected a command.
    pub failed_when_contains: &'static [&'static str],
}

impl VendorProfile {
    /// Return the first failure pattern present in `output`, if any.
    pub fn detect_failure(&self, output: &str) -> Option<&'static str> {
        self.failed_when_contains
            .iter()
            .copied()
            .find(|pattern| output.contains(pattern))
    }

    /// Commands that recreate a stored configuration listing.
    ///
    /// `lines` are the listing's command lines in order. Header lines before
    /// the first command and the closing trailer are dropped; everything in
    /// between is kept as is.
    pub fn replay_commands(&self, mut lines: Vec<String>) -> Vec<String> {
        let header = lines
            .iter()
            .take_while(|line| self.listing_header.iter().any(|h| line.starts_with(h)))
            .count();
        lines.drain(..header);
        if self
            .listing_trailer
            .is_some_and(|trailer| lines.last().is_some_and(|line| line == trailer))
        {
            lines.pop();
        }
        lines
    }

    /// Whether this profile claims the given device family.
    fn claims(&self, family: &str) -> bool {
        self.family_key
            .is_some_and(|key| family.contains(key))
    }
}

/// Known vendor profiles, checked in order.
pub static VENDORS: &[VendorProfile] = &[
    vendors::cisco::PROFILE,
    vendors::juniper::PROFILE,
    vendors::arista::PROFILE,
];

/// Profile used for any family no entry in [`VENDORS`] claims.
pub static DEFAULT_PROFILE: VendorProfile = vendors::generic::PROFILE;

/// Resolve the vendor profile for a device family.
///
/// Matching is a case-insensitive substring test, so "cisco_ios",
/// "Cisco_XE" and "cisco" all resolve to the Cisco profile. This never
/// fails: unmatched families get [`DEFAULT_PROFILE`].
pub fn resolve(family: &str) -> &'static VendorProfile {
    let family = family.to_ascii_lowercase();
    let profile = VENDORS
        .iter()
        .find(|profile| profile.claims(&family))
        .unwrap_or(&DEFAULT_PROFILE);
    debug!("device family {:?} resolved to vendor profile {}", family, profile.name);
    profile
}
