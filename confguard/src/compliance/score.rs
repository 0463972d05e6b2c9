//! Compliance scoring.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::engine::RuleVerdict;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage of passed rules, rounded to two decimals. An empty rule set
/// scores 0.
pub fn device_score(passed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(100.0 * passed as f64 / total as f64)
}

/// Mean of per-device scores, rounded to two decimals. No devices scores 0.
pub fn overall_score(scores: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = scores
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), score| (sum + score, count + 1));
    if count == 0 {
        return 0.0;
    }
    round2(sum / count as f64)
}

/// Compliance result for one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceReport {
    pub host: String,
    pub checked_at: DateTime<Utc>,
    pub total_rules: usize,
    pub passed: usize,
    pub failed: usize,
    /// Percentage, two decimals.
    pub score: f64,
    /// One verdict per rule, in rule order.
    pub verdicts: Vec<RuleVerdict>,
}

impl ComplianceReport {
    /// Score a device from its verdicts.
    pub fn from_verdicts(host: impl Into<String>, verdicts: Vec<RuleVerdict>) -> Self {
        let passed = verdicts.iter().filter(|v| v.compliant).count();
        let total_rules = verdicts.len();
        Self {
            host: host.into(),
            checked_at: Utc::now(),
            total_rules,
            passed,
            failed: total_rules - passed,
            score: device_score(passed, total_rules),
            verdicts,
        }
    }

    /// Report for a device whose configuration could not be obtained:
    /// nothing evaluated, score 0.
    pub fn unavailable(host: impl Into<String>) -> Self {
        Self::from_verdicts(host, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(compliant: bool) -> RuleVerdict {
        RuleVerdict {
            rule: "r".into(),
            description: String::new(),
            compliant,
            message: String::new(),
            details: None,
        }
    }

    #[test]
    fn test_device_score() {
        assert_eq!(device_score(3, 5), 60.0);
        assert_eq!(device_score(2, 3), 66.67);
        assert_eq!(device_score(5, 5), 100.0);
        assert_eq!(device_score(0, 0), 0.0);
    }

    #[test]
    fn test_overall_score() {
        assert_eq!(overall_score([100.0, 60.0, 0.0]), 53.33);
        assert_eq!(overall_score(Vec::new()), 0.0);
    }

    #[test]
    fn test_report_counts() {
        let report = ComplianceReport::from_verdicts(
            "r1",
            vec![verdict(true), verdict(false), verdict(true), verdict(true), verdict(false)],
        );
        assert_eq!(report.total_rules, 5);
        assert_eq!(report.passed, 3);
        assert_eq!(report.failed, 2);
        assert_eq!(report.score, 60.0);
    }

    #[test]
    fn test_unavailable_scores_zero() {
        let report = ComplianceReport::unavailable("r2");
        assert_eq!(report.total_rules, 0);
        assert_eq!(report.score, 0.0);
        assert!(report.verdicts.is_empty());
    }
}
