//! Juniper JUNOS profile.
//!
//! JUNOS applies changes from a candidate configuration, so durability is a
//! `commit and-quit` issued inside configuration mode rather than a save
//! command. Leaving configuration mode with uncommitted changes makes JUNOS
//! ask for confirmation instead of printing a prompt, so failed batches run
//! `rollback 0` before `exit configuration-mode`.
//!
//! Configuration is read in `set` form so a stored copy replays line by line
//! in configuration mode.
//!
//! # Prompt Examples
//!
//! ```text
//! user@router>              # operational mode
//! user@router#              # configuration mode
//! {master:0}                # routing-engine indicator (separate line)
//! user@router>
//! {master:0}[edit]          # config with routing-engine indicator
//! user@router#
//! ```

use crate::platform::{PersistAction, VendorProfile};

/// Juniper JUNOS family profile.
pub const PROFILE: VendorProfile = VendorProfile {
    name: "juniper",
    family_key: Some("juniper"),
    read_command: "show configuration | display set",
    persist: PersistAction::Commit("commit and-quit"),
    prompt_pattern: r"(?m)^(?:\{\w+(?::(?:\w+)?\d)?\}(?:\[edit[^\]\n]*\])?\n)?[\w\-@()/:\.]{1,63}[>#]\s?$",
    on_open_commands: &["set cli screen-length 0", "set cli screen-width 511"],
    config_enter: "configure",
    config_exit: "exit configuration-mode",
    config_discard: Some("rollback 0"),
    listing_header: &[],
    listing_trailer: None,
    failed_when_contains: &[
        "unknown command",
        "syntax error",
        "error:",
        "missing argument",
        "is ambiguous",
        "No valid completions",
        "missing mandatory argument",
        "invalid numeric value",
    ],
};

#[cfg(test)]
mod tests {
    use regex::bytes::Regex;

    use super::*;

    #[test]
    fn test_prompt_match() {
        let prompt = Regex::new(PROFILE.prompt_pattern).unwrap();

        assert!(prompt.is_match(b"user@router>"));
        assert!(prompt.is_match(b"user@router> "));
        assert!(prompt.is_match(b"user@router#"));
        assert!(prompt.is_match(b"{master:0}\nuser@router> "));
        assert!(prompt.is_match(b"{master:0}[edit]\nuser@router# "));
        assert!(prompt.is_match(b"[edit interfaces]\nuser@router#"));
        assert!(prompt.is_match(b"user@router.lab>"));

        assert!(!prompt.is_match(b"user@router% "));
    }

    #[test]
    fn test_commit_failure_detected() {
        assert!(PROFILE
            .detect_failure("error: configuration check-out failed")
            .is_some());
        assert!(PROFILE.detect_failure("commit complete").is_none());
    }
}
