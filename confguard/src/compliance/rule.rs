//! Compliance rules and rule files.

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::RuleLoadError;

/// What a rule checks. Each kind carries only the parameters it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleCheck {
    /// Compliant iff `pattern` occurs verbatim in the configuration.
    MustContain { pattern: String },

    /// Compliant iff `pattern` does not occur in the configuration.
    MustNotContain { pattern: String },

    /// Compliant iff `pattern` matches somewhere (multi-line mode).
    Regex { pattern: String },

    /// Compliant iff the output of `command` on a live session contains
    /// `required_value`.
    Command {
        command: String,
        required_value: String,
    },
}

impl RuleCheck {
    /// Kind name as written in rule files.
    pub fn kind(&self) -> &'static str {
        match self {
            RuleCheck::MustContain { .. } => "must_contain",
            RuleCheck::MustNotContain { .. } => "must_not_contain",
            RuleCheck::Regex { .. } => "regex",
            RuleCheck::Command { .. } => "command",
        }
    }

    /// Whether evaluating this check needs a live session.
    pub fn needs_session(&self) -> bool {
        matches!(self, RuleCheck::Command { .. })
    }
}

/// One named compliance rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Short rule name shown in reports.
    pub name: String,

    /// Human description.
    pub description: String,

    /// The check itself.
    pub check: RuleCheck,
}

impl Rule {
    pub fn new(name: impl Into<String>, description: impl Into<String>, check: RuleCheck) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            check,
        }
    }

    pub fn must_contain(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(name, "", RuleCheck::MustContain {
            pattern: pattern.into(),
        })
    }

    pub fn must_not_contain(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(name, "", RuleCheck::MustNotContain {
            pattern: pattern.into(),
        })
    }

    pub fn regex(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(name, "", RuleCheck::Regex {
            pattern: pattern.into(),
        })
    }

    pub fn command(
        name: impl Into<String>,
        command: impl Into<String>,
        required_value: impl Into<String>,
    ) -> Self {
        Self::new(name, "", RuleCheck::Command {
            command: command.into(),
            required_value: required_value.into(),
        })
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A rule as it appears in a rule file.
#[derive(Debug, Serialize, Deserialize)]
struct RuleRecord {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    required_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<String>,
}

impl RuleRecord {
    fn missing(&self, field: &'static str) -> RuleLoadError {
        RuleLoadError::MissingField {
            rule: self.name.clone(),
            kind: self.kind.clone(),
            field,
        }
    }
}

impl TryFrom<RuleRecord> for Rule {
    type Error = RuleLoadError;

    fn try_from(mut record: RuleRecord) -> Result<Self, Self::Error> {
        let check = match record.kind.as_str() {
            "must_contain" => RuleCheck::MustContain {
                pattern: record.pattern.take().ok_or_else(|| record.missing("pattern"))?,
            },
            "must_not_contain" => RuleCheck::MustNotContain {
                pattern: record.pattern.take().ok_or_else(|| record.missing("pattern"))?,
            },
            "regex" => RuleCheck::Regex {
                pattern: record.pattern.take().ok_or_else(|| record.missing("pattern"))?,
            },
            "command" => RuleCheck::Command {
                command: record.command.take().ok_or_else(|| record.missing("command"))?,
                required_value: record
                    .required_value
                    .take()
                    .ok_or_else(|| record.missing("required_value"))?,
            },
            _ => {
                return Err(RuleLoadError::UnknownKind {
                    rule: record.name,
                    kind: record.kind,
                });
            }
        };

        Ok(Rule {
            name: record.name,
            description: record.description,
            check,
        })
    }
}

impl From<&Rule> for RuleRecord {
    fn from(rule: &Rule) -> Self {
        let mut record = RuleRecord {
            name: rule.name.clone(),
            description: rule.description.clone(),
            kind: rule.check.kind().to_string(),
            pattern: None,
            required_value: None,
            command: None,
        };
        match &rule.check {
            RuleCheck::MustContain { pattern }
            | RuleCheck::MustNotContain { pattern }
            | RuleCheck::Regex { pattern } => record.pattern = Some(pattern.clone()),
            RuleCheck::Command {
                command,
                required_value,
            } => {
                record.command = Some(command.clone());
                record.required_value = Some(required_value.clone());
            }
        }
        record
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<RuleRecord>,
}

/// Ordered, immutable list of rules shared by every device in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Create a rule set from rules, keeping their order.
    pub fn new(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    /// Parse a JSON rule document (`{"rules": [...]}`).
    ///
    /// Every rule is validated; the first unknown kind or missing field
    /// rejects the whole document.
    pub fn from_json_str(json: &str) -> Result<Self, RuleLoadError> {
        let file: RuleFile = serde_json::from_str(json)?;
        let rules = file
            .rules
            .into_iter()
            .map(Rule::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Load rules from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuleLoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RuleLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let rules = Self::from_json_str(&text)?;
        info!("Loaded {} compliance rules from {}", rules.len(), path.display());
        Ok(rules)
    }

    /// Render the rule set as pretty-printed JSON in rule-file format.
    pub fn to_json_string(&self) -> Result<String, RuleLoadError> {
        let file = RuleFile {
            rules: self.rules.iter().map(RuleRecord::from).collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Write the rule set to `path` in rule-file format.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), RuleLoadError> {
        let path = path.as_ref();
        let json = self.to_json_string()?;
        std::fs::write(path, json).map_err(|source| RuleLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Wrote {} compliance rules to {}", self.len(), path.display());
        Ok(())
    }

    /// The default baseline rules.
    pub fn baseline() -> Self {
        Self::new([
            Rule::must_contain("NTP Server Configured", "ntp server")
                .with_description("Verify NTP server is configured"),
            Rule::regex("SSH Version 2", "ip ssh version 2")
                .with_description("Ensure SSH version 2 is enabled"),
            Rule::must_not_contain("No Telnet", "transport input telnet")
                .with_description("Verify telnet is not enabled"),
            Rule::must_contain("Logging Configured", "logging")
                .with_description("Verify logging server is configured"),
            Rule::must_not_contain("SNMP Community", "snmp-server community public")
                .with_description("Check for default SNMP community strings"),
        ])
    }

    /// Rules in load order.
    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    /// Whether any rule needs a live session.
    pub fn needs_session(&self) -> bool {
        self.rules.iter().any(|rule| rule.check.needs_session())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
