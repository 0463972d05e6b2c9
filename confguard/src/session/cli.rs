//! Prompt-driven CLI dialog.
//!
//! [`Cli`] sequences commands on an interactive device CLI and remembers what
//! the device is doing between calls: whether configuration changes are
//! staged waiting for a commit, and whether a reply was abandoned half-read.
//! The byte-level round trip sits behind [`LineIo`].

use std::future::Future;

use log::{debug, warn};

use crate::error::{CommandError, TransportError};
use crate::platform::{PersistAction, VendorProfile};

/// Lines at the top of read-command output scanned for failure patterns.
/// A rejected read answers with a short error; below that is configuration
/// text, which may legitimately contain words like "error:".
const READ_SCAN_LINES: usize = 3;

/// One prompt-delimited round trip on a device CLI.
pub(crate) trait LineIo: Send {
    /// Send `line` and return its output with the echo and the trailing
    /// prompt removed.
    fn exchange(
        &mut self,
        line: &str,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;
}

/// Command sequencing and mode tracking for one device CLI.
pub(crate) struct Cli<L> {
    host: String,
    profile: &'static VendorProfile,
    io: Option<L>,
    /// Line sent whose reply was never read to the prompt.
    in_flight: Option<String>,
    /// Configuration mode is open with changes waiting for a commit.
    staged: bool,
}

impl<L: LineIo> Cli<L> {
    pub fn new(host: impl Into<String>, profile: &'static VendorProfile, io: L) -> Self {
        Self {
            host: host.into(),
            profile,
            io: Some(io),
            in_flight: None,
            staged: false,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn profile(&self) -> &'static VendorProfile {
        self.profile
    }

    pub fn is_open(&self) -> bool {
        self.io.is_some()
    }

    /// Send one line and read its reply.
    ///
    /// If a previous exchange never finished (its future was dropped, or the
    /// read failed), the device may still be writing that reply, so every
    /// later exchange fails with [`CommandError::Interrupted`].
    async fn exchange(&mut self, line: &str) -> Result<String, CommandError> {
        let Some(io) = self.io.as_mut() else {
            return Err(CommandError::NotConnected {
                host: self.host.clone(),
            });
        };
        if let Some(command) = &self.in_flight {
            return Err(CommandError::Interrupted {
                host: self.host.clone(),
                command: command.clone(),
            });
        }

        debug!("{}: sending {:?}", self.host, line);
        self.in_flight = Some(line.to_string());
        let output = io
            .exchange(line)
            .await
            .map_err(|source| CommandError::Transport {
                host: self.host.clone(),
                command: line.to_string(),
                source,
            })?;
        self.in_flight = None;
        Ok(output)
    }

    fn check_failure(&self, command: &str, output: &str) -> Result<(), CommandError> {
        match self.profile.detect_failure(output) {
            Some(pattern) => Err(CommandError::Rejected {
                host: self.host.clone(),
                command: command.to_string(),
                message: failure_line(output, pattern),
            }),
            None => Ok(()),
        }
    }

    /// Send an exec-mode command. Output matching a vendor failure pattern
    /// becomes [`CommandError::Rejected`].
    pub async fn send_command(&mut self, command: &str) -> Result<String, CommandError> {
        let output = self.exchange(command).await?;
        let scanned = if command == self.profile.read_command {
            head(&output, READ_SCAN_LINES)
        } else {
            output.as_str()
        };
        self.check_failure(command, scanned)?;
        Ok(output)
    }

    /// Apply `commands` in configuration mode and return the transcript.
    ///
    /// Save-based vendors leave configuration mode afterwards. Commit-based
    /// vendors stay in it with the changes staged for [`persist`](Self::persist).
    /// A rejected command stops the batch; staged changes are discarded and
    /// configuration mode is left before the rejection is returned.
    pub async fn send_config_set(&mut self, commands: &[String]) -> Result<String, CommandError> {
        let profile = self.profile;
        if !self.staged {
            self.enter_config_mode().await?;
        }

        let mut transcript = String::new();
        for command in commands {
            let output = self.exchange(command).await?;
            push_line(&mut transcript, command);
            push_line(&mut transcript, &output);
            if let Err(rejected) = self.check_failure(command, &output) {
                self.leave_quietly(&mut transcript).await;
                return Err(rejected);
            }
        }

        if profile.persist.is_commit() {
            self.staged = true;
        } else {
            self.leave_config_mode(&mut transcript).await?;
        }
        Ok(transcript)
    }

    /// Make the running configuration durable.
    ///
    /// Commit-based vendors commit from configuration mode, entering it first
    /// when nothing is staged. A failed commit discards the staged changes.
    pub async fn persist(&mut self) -> Result<(), CommandError> {
        match self.profile.persist {
            PersistAction::Save(command) => self.send_command(command).await.map(drop),
            PersistAction::Commit(command) => {
                if !self.staged {
                    self.enter_config_mode().await?;
                    self.staged = true;
                }
                let output = self.exchange(command).await?;
                if let Err(rejected) = self.check_failure(command, &output) {
                    self.leave_quietly(&mut String::new()).await;
                    return Err(rejected);
                }
                self.staged = false;
                debug!("{}: {}", self.host, output);
                Ok(())
            }
        }
    }

    /// Discard staged changes so the device is not left in configuration
    /// mode. Does nothing when nothing is staged.
    pub async fn discard_staged(&mut self) -> Result<(), CommandError> {
        if !self.staged {
            return Ok(());
        }
        self.leave_config_mode(&mut String::new()).await
    }

    /// Hand over the line I/O for teardown. The CLI is closed afterwards.
    pub fn take_io(&mut self) -> Option<L> {
        self.staged = false;
        self.io.take()
    }

    async fn enter_config_mode(&mut self) -> Result<(), CommandError> {
        let enter = self.profile.config_enter;
        let output = self.exchange(enter).await?;
        self.check_failure(enter, &output)
    }

    /// Leave configuration mode, discarding uncommitted changes first on
    /// vendors that keep a candidate configuration.
    async fn leave_config_mode(&mut self, transcript: &mut String) -> Result<(), CommandError> {
        let profile = self.profile;
        if let Some(discard) = profile.config_discard {
            let output = self.exchange(discard).await?;
            push_line(transcript, &output);
        }
        let output = self.exchange(profile.config_exit).await?;
        push_line(transcript, &output);
        self.staged = false;
        Ok(())
    }

    async fn leave_quietly(&mut self, transcript: &mut String) {
        if let Err(e) = self.leave_config_mode(transcript).await {
            warn!("{}: could not leave configuration mode: {}", self.host, e);
        }
    }
}

fn push_line(transcript: &mut String, text: &str) {
    if !text.is_empty() {
        transcript.push_str(text);
        transcript.push('\n');
    }
}

/// The first `lines` lines of `text`.
fn head(text: &str, lines: usize) -> &str {
    match text.match_indices('\n').nth(lines.saturating_sub(1)) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// The output line holding a failure pattern, for error messages.
fn failure_line(output: &str, pattern: &str) -> String {
    output
        .lines()
        .find(|line| line.contains(pattern))
        .unwrap_or(pattern)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;

    use super::*;
    use crate::platform;

    /// Device CLI that models a candidate configuration: `set` lines in
    /// configuration mode leave uncommitted changes, and leaving with
    /// uncommitted changes asks a yes/no question that never ends in a
    /// prompt, so the read times out.
    #[derive(Default)]
    struct FakeCli {
        sent: Vec<String>,
        replies: HashMap<String, String>,
        hangs: HashSet<String>,
        commit_error: Option<String>,
        config_mode: bool,
        uncommitted: bool,
        committed: usize,
    }

    impl FakeCli {
        fn reply(mut self, line: &str, output: &str) -> Self {
            self.replies.insert(line.to_string(), output.to_string());
            self
        }
    }

    impl LineIo for FakeCli {
        async fn exchange(&mut self, line: &str) -> Result<String, TransportError> {
            self.sent.push(line.to_string());
            if self.hangs.contains(line) {
                std::future::pending::<()>().await;
            }
            if let Some(reply) = self.replies.get(line) {
                return Ok(reply.clone());
            }
            match line {
                "configure" | "configure terminal" => {
                    self.config_mode = true;
                    Ok(String::new())
                }
                "exit configuration-mode" if self.uncommitted => {
                    // "Exit with uncommitted changes? [yes,no] (yes)"
                    Err(TransportError::Timeout(Duration::from_secs(60)))
                }
                "exit configuration-mode" | "end" => {
                    self.config_mode = false;
                    Ok(String::new())
                }
                "rollback 0" => {
                    self.uncommitted = false;
                    Ok("load complete".to_string())
                }
                "commit and-quit" => match &self.commit_error {
                    Some(error) => Ok(error.clone()),
                    None => {
                        self.uncommitted = false;
                        self.config_mode = false;
                        self.committed += 1;
                        Ok("commit complete\nExiting configuration mode".to_string())
                    }
                },
                _ => {
                    if self.config_mode {
                        self.uncommitted = true;
                    }
                    Ok(String::new())
                }
            }
        }
    }

    fn juniper(io: FakeCli) -> Cli<FakeCli> {
        Cli::new("r2", platform::resolve("juniper_junos"), io)
    }

    fn cisco(io: FakeCli) -> Cli<FakeCli> {
        Cli::new("r1", platform::resolve("cisco_ios"), io)
    }

    fn commands(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    fn sent(mut cli: Cli<FakeCli>) -> (Vec<String>, FakeCli) {
        let io = cli.take_io().unwrap();
        (io.sent.clone(), io)
    }

    #[tokio::test]
    async fn test_juniper_batch_commits_without_leaving_uncommitted() {
        let mut cli = juniper(FakeCli::default());

        cli.send_config_set(&commands(&["set system ntp server 10.0.0.1"]))
            .await
            .unwrap();
        cli.persist().await.unwrap();

        let (sent, io) = sent(cli);
        assert_eq!(
            sent,
            ["configure", "set system ntp server 10.0.0.1", "commit and-quit"]
        );
        assert_eq!(io.committed, 1);
        assert!(!io.config_mode);
    }

    #[tokio::test]
    async fn test_juniper_rejection_discards_before_exit() {
        let mut cli = juniper(
            FakeCli::default().reply("set bogus", "syntax error, expecting <command>."),
        );

        let err = cli
            .send_config_set(&commands(&["set system host-name r2", "set bogus", "set never"]))
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Rejected { .. }));
        let (sent, io) = sent(cli);
        assert_eq!(
            sent,
            [
                "configure",
                "set system host-name r2",
                "set bogus",
                "rollback 0",
                "exit configuration-mode"
            ]
        );
        assert!(!io.uncommitted);
        assert!(!io.config_mode);
    }

    #[tokio::test]
    async fn test_juniper_failed_commit_is_discarded() {
        let mut cli = juniper(FakeCli {
            commit_error: Some("error: configuration check-out failed".to_string()),
            ..FakeCli::default()
        });

        cli.send_config_set(&commands(&["set system ntp server 10.0.0.1"]))
            .await
            .unwrap();
        let err = cli.persist().await.unwrap_err();

        assert!(err.to_string().contains("configuration check-out failed"));
        let (sent, io) = sent(cli);
        assert_eq!(&sent[sent.len() - 2..], ["rollback 0", "exit configuration-mode"]);
        assert_eq!(io.committed, 0);
    }

    #[tokio::test]
    async fn test_juniper_persist_alone_enters_configuration_mode() {
        let mut cli = juniper(FakeCli::default());

        cli.persist().await.unwrap();

        let (sent, _) = sent(cli);
        assert_eq!(sent, ["configure", "commit and-quit"]);
    }

    #[tokio::test]
    async fn test_discard_staged_on_teardown() {
        let mut cli = juniper(FakeCli::default());
        cli.send_config_set(&commands(&["set system host-name r2"]))
            .await
            .unwrap();

        cli.discard_staged().await.unwrap();
        cli.discard_staged().await.unwrap();

        let (sent, io) = sent(cli);
        assert_eq!(&sent[2..], ["rollback 0", "exit configuration-mode"]);
        assert!(!io.config_mode);
    }

    #[tokio::test]
    async fn test_cisco_batch_leaves_then_saves() {
        let mut cli = cisco(FakeCli::default());

        cli.send_config_set(&commands(&["ntp server 10.0.0.2"]))
            .await
            .unwrap();
        cli.persist().await.unwrap();

        let (sent, _) = sent(cli);
        assert_eq!(
            sent,
            ["configure terminal", "ntp server 10.0.0.2", "end", "write memory"]
        );
    }

    #[tokio::test]
    async fn test_abandoned_reply_makes_cli_unusable() {
        let mut cli = cisco(
            FakeCli {
                hangs: HashSet::from(["show slow".to_string()]),
                ..FakeCli::default()
            }
            .reply("show fast", "fast output"),
        );

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), cli.send_command("show slow")).await;
        assert!(abandoned.is_err());

        let err = cli.send_command("show fast").await.unwrap_err();
        match err {
            CommandError::Interrupted { command, .. } => assert_eq!(command, "show slow"),
            other => panic!("unexpected error: {other}"),
        }
        let (sent, _) = sent(cli);
        assert_eq!(sent, ["show slow"]);
    }

    #[tokio::test]
    async fn test_failed_read_makes_cli_unusable() {
        let mut cli = juniper(FakeCli::default());
        cli.send_config_set(&commands(&["set system host-name r2"]))
            .await
            .unwrap();

        // Leaving without a commit hits the confirmation question.
        let err = cli.exchange("exit configuration-mode").await.unwrap_err();
        assert!(matches!(err, CommandError::Transport { .. }));

        assert!(matches!(
            cli.send_command("show version").await,
            Err(CommandError::Interrupted { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_command_scans_only_head_for_failures() {
        let config = "set version 21.4R1\n\
                      set system host-name r2\n\
                      set system ntp server 10.0.0.1\n\
                      set interfaces ge-0/0/0 description \"syntax error: fix later\"";
        let mut cli = juniper(FakeCli::default().reply("show configuration | display set", config));

        let output = cli
            .send_command("show configuration | display set")
            .await
            .unwrap();
        assert_eq!(output, config);

        let mut cli = juniper(
            FakeCli::default().reply("show configuration | display set", "error: permission denied"),
        );
        let err = cli
            .send_command("show configuration | display set")
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_other_commands_scan_all_output() {
        let mut cli = juniper(
            FakeCli::default().reply("show system uptime", "line 1\nline 2\nline 3\nerror: no such"),
        );
        assert!(cli.send_command("show system uptime").await.is_err());
    }

    #[tokio::test]
    async fn test_closed_cli_is_not_connected() {
        let mut cli = cisco(FakeCli::default());
        cli.take_io();

        assert!(!cli.is_open());
        assert!(matches!(
            cli.send_command("show version").await,
            Err(CommandError::NotConnected { .. })
        ));
    }

    #[test]
    fn test_head() {
        assert_eq!(head("a\nb\nc\nd", 3), "a\nb\nc");
        assert_eq!(head("a\nb", 3), "a\nb");
        assert_eq!(head("", 3), "");
    }

    #[test]
    fn test_failure_line() {
        let output = "        ^\n% Invalid input detected at '^' marker.";
        assert_eq!(
            failure_line(output, "% Invalid input detected"),
            "% Invalid input detected at '^' marker."
        );
    }
}
