//! Arista EOS profile.
//!
//! # Prompt Examples
//!
//! ```text
//! switch>                            # exec mode
//! switch#                            # privileged exec
//! switch(config)#                    # configuration mode
//! switch(config-if-Et1)#             # interface sub-mode
//! ```

use crate::platform::{PersistAction, VendorProfile};

/// Arista EOS family profile.
pub const PROFILE: VendorProfile = VendorProfile {
    name: "arista",
    family_key: Some("arista"),
    read_command: "show running-config",
    persist: PersistAction::Save("write memory"),
    prompt_pattern: r"(?m)^[\w.\-@/: ]{1,63}(?:\(config[\w.\-@/:+]{0,63}\))?[>#]\s?$",
    on_open_commands: &["terminal length 0", "terminal width 32767"],
    config_enter: "configure terminal",
    config_exit: "end",
    config_discard: None,
    listing_header: &[],
    listing_trailer: Some("end"),
    failed_when_contains: &[
        "% Ambiguous command",
        "% Error",
        "% Incomplete command",
        "% Invalid input",
        "% Cannot commit",
        "% Unavailable command",
        "% Duplicate sequence number",
    ],
};

#[cfg(test)]
mod tests {
    use regex::bytes::Regex;

    use super::*;

    #[test]
    fn test_prompt_match() {
        let prompt = Regex::new(PROFILE.prompt_pattern).unwrap();

        assert!(prompt.is_match(b"switch>"));
        assert!(prompt.is_match(b"switch#"));
        assert!(prompt.is_match(b"admin@switch#"));
        assert!(prompt.is_match(b"switch(config)#"));
        assert!(prompt.is_match(b"switch(config-if-Et1)# "));
        assert!(prompt.is_match(b"switch(config-router-bgp)#"));
    }

    #[test]
    fn test_failure_patterns() {
        assert!(PROFILE.detect_failure("% Invalid input (at token 1: 'foo')").is_some());
        assert!(PROFILE.detect_failure("Copy completed successfully.").is_none());
    }
}
