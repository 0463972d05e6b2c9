//! Compliance rules, evaluation and scoring.
//!
//! A [`RuleSet`] is loaded once per run and shared read-only by every device
//! being checked. The [`RuleEngine`] turns it into one [`RuleVerdict`] per
//! rule, and a [`ComplianceReport`] scores those verdicts.
//!
//! ```
//! use confguard::compliance::{ComplianceReport, RuleEngine, RuleSet};
//!
//! let rules = RuleSet::baseline();
//! let verdicts = RuleEngine::new(&rules)
//!     .evaluate_offline("ntp server 10.0.0.1\nip ssh version 2\nlogging host 10.0.0.9\n");
//! let report = ComplianceReport::from_verdicts("r1", verdicts);
//!
//! assert_eq!(report.passed, 5);
//! assert_eq!(report.score, 100.0);
//! ```

mod engine;
mod rule;
mod score;

pub use engine::{MAX_OUTPUT_EVIDENCE, MAX_REGEX_EVIDENCE, RuleEngine, RuleVerdict, VerdictDetail};
pub use rule::{Rule, RuleCheck, RuleSet};
pub use score::{ComplianceReport, device_score, overall_score};
