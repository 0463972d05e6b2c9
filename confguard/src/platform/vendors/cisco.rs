//! Cisco IOS / IOS-XE profile.
//!
//! # Prompt Examples
//!
//! ```text
//! router>                   # user exec
//! router#                   # privileged exec
//! router(config)#           # configuration mode
//! router(config-if)#        # interface sub-mode
//! ```

use crate::platform::{PersistAction, VendorProfile};

/// Cisco IOS family profile.
pub const PROFILE: VendorProfile = VendorProfile {
    name: "cisco",
    family_key: Some("cisco"),
    read_command: "show running-config",
    persist: PersistAction::Save("write memory"),
    prompt_pattern: r"(?m)^[\w.\-@/:]{1,63}(?:\(conf[\w.\-@/:+]{0,63}\))?[>#]\s?$",
    on_open_commands: &["terminal length 0", "terminal width 511"],
    config_enter: "configure terminal",
    config_exit: "end",
    config_discard: None,
    listing_header: &["Building configuration", "Current configuration"],
    listing_trailer: Some("end"),
    failed_when_contains: &[
        "% Ambiguous command",
        "% Incomplete command",
        "% Invalid input detected",
        "% Unknown command",
    ],
};
