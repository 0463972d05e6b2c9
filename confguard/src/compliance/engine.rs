//! Rule evaluation against configuration text.

use log::{debug, warn};
use regex::RegexBuilder;
use serde::Serialize;

use super::rule::{Rule, RuleCheck, RuleSet};
use crate::error::RuleEvaluationError;
use crate::session::Session;

/// Most regex matches kept as evidence.
pub const MAX_REGEX_EVIDENCE: usize = 5;

/// Most characters of command output kept as evidence.
pub const MAX_OUTPUT_EVIDENCE: usize = 200;

/// Bounded evidence attached to a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum VerdictDetail {
    /// Regex matches (or captured groups), at most [`MAX_REGEX_EVIDENCE`].
    Matches(Vec<String>),
    /// Head of a command's output, at most [`MAX_OUTPUT_EVIDENCE`] characters.
    Output(String),
}

/// Result of one rule against one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleVerdict {
    pub rule: String,
    pub description: String,
    pub compliant: bool,
    pub message: String,
    pub details: Option<VerdictDetail>,
}

impl RuleVerdict {
    fn new(rule: &Rule, finding: Finding) -> Self {
        Self {
            rule: rule.name.clone(),
            description: rule.description.clone(),
            compliant: finding.compliant,
            message: finding.message,
            details: finding.details,
        }
    }

    fn failed(rule: &Rule, error: RuleEvaluationError) -> Self {
        let message = match error {
            RuleEvaluationError::NoSession => error.to_string(),
            _ => {
                warn!("Error in rule {}: {}", rule.name, error);
                format!("Error checking rule: {}", error)
            }
        };
        Self::new(rule, Finding {
            compliant: false,
            message,
            details: None,
        })
    }
}

struct Finding {
    compliant: bool,
    message: String,
    details: Option<VerdictDetail>,
}

impl Finding {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            compliant: true,
            message: message.into(),
            details: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            compliant: false,
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: VerdictDetail) -> Self {
        self.details = Some(details);
        self
    }
}

/// Evaluates a [`RuleSet`] against configuration text.
///
/// Evaluation is deterministic and never aborts part-way: every rule yields
/// exactly one [`RuleVerdict`], in rule order, and faults inside a rule
/// become a non-compliant verdict carrying the error text.
#[derive(Debug, Clone, Copy)]
pub struct RuleEngine<'a> {
    rules: &'a RuleSet,
}

impl<'a> RuleEngine<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Self { rules }
    }

    /// Evaluate against stored text. Command rules report that no session
    /// was available.
    pub fn evaluate_offline(&self, config: &str) -> Vec<RuleVerdict> {
        self.rules
            .iter()
            .map(|rule| {
                let result = match &rule.check {
                    RuleCheck::Command { .. } => Err(RuleEvaluationError::NoSession),
                    check => check_text(check, config),
                };
                verdict(rule, result)
            })
            .collect()
    }

    /// Evaluate against text retrieved from `session`, issuing command rules
    /// on that same session.
    pub async fn evaluate_live<S: Session>(
        &self,
        config: &str,
        session: &mut S,
    ) -> Vec<RuleVerdict> {
        let mut verdicts = Vec::with_capacity(self.rules.len());
        for rule in self.rules {
            let result = match &rule.check {
                RuleCheck::Command {
                    command,
                    required_value,
                } => check_command(session, command, required_value).await,
                check => check_text(check, config),
            };
            verdicts.push(verdict(rule, result));
        }
        verdicts
    }
}

fn verdict(rule: &Rule, result: Result<Finding, RuleEvaluationError>) -> RuleVerdict {
    let verdict = match result {
        Ok(finding) => RuleVerdict::new(rule, finding),
        Err(e) => RuleVerdict::failed(rule, e),
    };
    debug!(
        "Rule '{}': {} ({})",
        verdict.rule,
        if verdict.compliant { "PASS" } else { "FAIL" },
        verdict.message
    );
    verdict
}

fn check_text(check: &RuleCheck, config: &str) -> Result<Finding, RuleEvaluationError> {
    let finding = match check {
        RuleCheck::MustContain { pattern } => {
            if config.contains(pattern.as_str()) {
                Finding::pass(format!("Required pattern found: {}", pattern))
            } else {
                Finding::fail(format!("Missing required pattern: {}", pattern))
            }
        }
        RuleCheck::MustNotContain { pattern } => {
            if config.contains(pattern.as_str()) {
                Finding::fail(format!("Forbidden pattern found: {}", pattern))
            } else {
                Finding::pass("Forbidden pattern not found")
            }
        }
        RuleCheck::Regex { pattern } => {
            let matches = regex_evidence(pattern, config)?;
            if matches.is_empty() {
                Finding::fail(format!("Pattern not matched: {}", pattern))
            } else {
                Finding::pass("Pattern matched").with_details(VerdictDetail::Matches(matches))
            }
        }
        RuleCheck::Command { .. } => return Err(RuleEvaluationError::NoSession),
    };
    Ok(finding)
}

/// First matches of `pattern`: the whole match without groups, group 1 with
/// one group, all groups joined by ", " otherwise.
fn regex_evidence(pattern: &str, config: &str) -> Result<Vec<String>, RuleEvaluationError> {
    let re = RegexBuilder::new(pattern).multi_line(true).build()?;
    let groups = re.captures_len() - 1;

    let matches = re
        .captures_iter(config)
        .take(MAX_REGEX_EVIDENCE)
        .map(|caps| match groups {
            0 => caps[0].to_string(),
            1 => caps.get(1).map_or("", |m| m.as_str()).to_string(),
            _ => (1..=groups)
                .map(|i| caps.get(i).map_or("", |m| m.as_str()))
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();
    Ok(matches)
}

async fn check_command<S: Session>(
    session: &mut S,
    command: &str,
    required_value: &str,
) -> Result<Finding, RuleEvaluationError> {
    let output = session.send_command(command).await?;
    let head: String = output.chars().take(MAX_OUTPUT_EVIDENCE).collect();

    let finding = if output.contains(required_value) {
        Finding::pass("Command validation passed")
    } else {
        Finding::fail("Command validation failed")
    };
    Ok(finding.with_details(VerdictDetail::Output(head)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::DeviceDescriptor;
    use crate::session::Connector;
    use crate::session::mock::{MockConnector, MockDevice};

    const CONFIG: &str = "\
hostname r1
ntp server 10.0.0.1
ip ssh version 2
line vty 0 4
 transport input ssh
logging host 10.0.0.50
";

    fn single(rule: Rule, config: &str) -> RuleVerdict {
        let rules = RuleSet::new([rule]);
        RuleEngine::new(&rules).evaluate_offline(config).remove(0)
    }

    #[test]
    fn test_must_contain_is_case_sensitive() {
        let rule = Rule::must_contain("ntp", "ntp server");

        let hit = single(rule.clone(), "ntp server 10.0.0.1\n");
        assert!(hit.compliant);
        assert_eq!(hit.message, "Required pattern found: ntp server");

        let miss = single(rule, "NTP SERVER 10.0.0.1");
        assert!(!miss.compliant);
        assert_eq!(miss.message, "Missing required pattern: ntp server");
    }

    #[test]
    fn test_must_not_contain() {
        let rule = Rule::must_not_contain("telnet", "transport input telnet");

        assert!(single(rule.clone(), CONFIG).compliant);

        let verdict = single(rule, "line vty 0 4\n transport input telnet\n");
        assert!(!verdict.compliant);
        assert_eq!(verdict.message, "Forbidden pattern found: transport input telnet");
    }

    #[test]
    fn test_regex_records_matched_line() {
        let verdict = single(Rule::regex("ssh", "ip ssh version 2"), CONFIG);
        assert!(verdict.compliant);
        assert_eq!(
            verdict.details,
            Some(VerdictDetail::Matches(vec!["ip ssh version 2".into()]))
        );
    }

    #[test]
    fn test_regex_evidence_is_bounded() {
        let config = (1..=8)
            .map(|i| format!("interface Gi0/{i}\n"))
            .collect::<String>();
        let verdict = single(Rule::regex("intf", r"^interface Gi0/(\d+)$"), &config);

        let Some(VerdictDetail::Matches(matches)) = verdict.details else {
            panic!("expected matches");
        };
        assert_eq!(matches, ["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_regex_multiple_groups_joined() {
        let verdict = single(
            Rule::regex("ntp", r"ntp (server|peer) (\S+)"),
            CONFIG,
        );
        assert_eq!(
            verdict.details,
            Some(VerdictDetail::Matches(vec!["server, 10.0.0.1".into()]))
        );
    }

    #[test]
    fn test_regex_no_match_has_no_evidence() {
        let verdict = single(Rule::regex("snmp", "^snmp-server"), CONFIG);
        assert!(!verdict.compliant);
        assert!(verdict.details.is_none());
        assert_eq!(verdict.message, "Pattern not matched: ^snmp-server");
    }

    #[test]
    fn test_bad_regex_becomes_verdict() {
        let rules = RuleSet::new([
            Rule::regex("broken", "ip ssh ("),
            Rule::must_contain("ntp", "ntp server"),
        ]);
        let verdicts = RuleEngine::new(&rules).evaluate_offline(CONFIG);

        assert_eq!(verdicts.len(), 2);
        assert!(!verdicts[0].compliant);
        assert!(verdicts[0].message.starts_with("Error checking rule:"));
        assert!(verdicts[1].compliant);
    }

    #[test]
    fn test_command_rule_without_session() {
        let verdict = single(Rule::command("ver", "show version", "15.2"), CONFIG);
        assert!(!verdict.compliant);
        assert!(verdict.message.contains("No live session"));
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let rules = RuleSet::baseline();
        let engine = RuleEngine::new(&rules);
        assert_eq!(engine.evaluate_offline(CONFIG), engine.evaluate_offline(CONFIG));
    }

    #[tokio::test]
    async fn test_command_rule_on_live_session() {
        let connector = MockConnector::new().device(
            "r1",
            MockDevice::default().with_output("show version", "Cisco IOS Software, Version 15.2(4)M"),
        );
        let mut session = connector
            .connect(&DeviceDescriptor::new("r1", "cisco_ios"))
            .await
            .unwrap();

        let rules = RuleSet::new([
            Rule::command("ver", "show version", "15.2"),
            Rule::command("old", "show version", "12.4"),
        ]);
        let verdicts = RuleEngine::new(&rules).evaluate_live(CONFIG, &mut session).await;
        session.close().await;

        assert!(verdicts[0].compliant);
        assert_eq!(verdicts[0].message, "Command validation passed");
        assert!(!verdicts[1].compliant);
        assert_eq!(
            verdicts[1].details,
            Some(VerdictDetail::Output(
                "Cisco IOS Software, Version 15.2(4)M".into()
            ))
        );
    }

    #[tokio::test]
    async fn test_command_rule_failure_becomes_verdict() {
        let connector = MockConnector::new()
            .device("r1", MockDevice::default().rejecting("show bogus"));
        let mut session = connector
            .connect(&DeviceDescriptor::new("r1", "cisco_ios"))
            .await
            .unwrap();

        let rules = RuleSet::new([Rule::command("bogus", "show bogus", "x")]);
        let verdicts = RuleEngine::new(&rules).evaluate_live(CONFIG, &mut session).await;
        session.close().await;

        assert!(!verdicts[0].compliant);
        assert!(verdicts[0].message.starts_with("Error checking rule:"));
    }
}
