//! Fallback profile for device families without a dedicated entry.
//!
//! Uses the IOS-style dialect, which most network CLIs imitate closely
//! enough for reading and saving configuration.

use crate::platform::{PersistAction, VendorProfile};

/// Generic fallback profile.
pub const PROFILE: VendorProfile = VendorProfile {
    name: "generic",
    family_key: None,
    read_command: "show running-config",
    persist: PersistAction::Save("write memory"),
    prompt_pattern: r"(?m)^[\w.\-@()/:~\[\] ]{1,63}[>#$%]\s?$",
    on_open_commands: &[],
    config_enter: "configure terminal",
    config_exit: "end",
    config_discard: None,
    listing_header: &["Building configuration", "Current configuration"],
    listing_trailer: Some("end"),
    failed_when_contains: &["% Invalid input", "% Unknown command"],
};
