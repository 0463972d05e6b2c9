//! Per-device outcomes and run summaries.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::compliance::ComplianceReport;
use crate::error::RunError;

/// Which operation a run performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Backup,
    Deploy,
    Rollback,
    Compliance,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::Backup => "backup",
            OperationKind::Deploy => "deploy",
            OperationKind::Rollback => "rollback",
            OperationKind::Compliance => "compliance",
        })
    }
}

/// Final status of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failure,
    /// The run was cancelled while this device was in flight.
    Cancelled,
}

/// Category of a device failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Connect,
    Command,
    Persist,
    Store,
    Unavailable,
    Deploy,
    Duplicate,
    Cancelled,
}

impl From<&RunError> for FailureKind {
    fn from(error: &RunError) -> Self {
        match error {
            RunError::Connect(_) => FailureKind::Connect,
            RunError::Command(_) => FailureKind::Command,
            RunError::Persist(_) => FailureKind::Persist,
            RunError::Store { .. } => FailureKind::Store,
            RunError::Unavailable(_) => FailureKind::Unavailable,
            RunError::Deploy(_) => FailureKind::Deploy,
            RunError::DuplicateHost { .. } => FailureKind::Duplicate,
            RunError::Cancelled { .. } => FailureKind::Cancelled,
        }
    }
}

/// Operation-specific result data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomePayload {
    /// Retrieved configuration and, when stored, where it was written.
    Backup {
        config: String,
        path: Option<PathBuf>,
    },
    /// Commands applied and persisted.
    Deploy { commands_applied: usize },
    /// Compliance verdicts and score.
    Compliance(ComplianceReport),
}

/// Result of one orchestrated operation on one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceOutcome {
    pub host: String,
    pub status: OutcomeStatus,
    /// Human-readable result. Failures include the host and the cause.
    pub message: String,
    pub error: Option<FailureKind>,
    pub payload: Option<OutcomePayload>,
}

impl DeviceOutcome {
    pub(crate) fn from_result(host: &str, result: Result<OutcomePayload, RunError>) -> Self {
        match result {
            Ok(payload) => Self {
                host: host.to_string(),
                status: OutcomeStatus::Success,
                message: success_message(&payload),
                error: None,
                payload: Some(payload),
            },
            Err(error) => Self {
                host: host.to_string(),
                status: if error.is_cancelled() {
                    OutcomeStatus::Cancelled
                } else {
                    OutcomeStatus::Failure
                },
                message: error.to_string(),
                error: Some(FailureKind::from(&error)),
                payload: None,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    /// Compliance report, for compliance runs.
    pub fn report(&self) -> Option<&ComplianceReport> {
        match &self.payload {
            Some(OutcomePayload::Compliance(report)) => Some(report),
            _ => None,
        }
    }

    /// Retrieved configuration, for backup runs.
    pub fn config(&self) -> Option<&str> {
        match &self.payload {
            Some(OutcomePayload::Backup { config, .. }) => Some(config),
            _ => None,
        }
    }
}

fn success_message(payload: &OutcomePayload) -> String {
    match payload {
        OutcomePayload::Backup {
            path: Some(path), ..
        } => format!("Backup saved to {}", path.display()),
        OutcomePayload::Backup { config, path: None } => {
            format!("Configuration retrieved ({} bytes)", config.len())
        }
        OutcomePayload::Deploy { commands_applied } => {
            format!("Applied {} commands and saved configuration", commands_applied)
        }
        OutcomePayload::Compliance(report) => format!(
            "{}% compliant ({}/{} rules passed)",
            report.score, report.passed, report.total_rules
        ),
    }
}

/// Aggregate result of one orchestrated run.
///
/// `successful + failed + skipped == total_devices` always holds. Outcomes
/// are in input order; devices skipped by cancellation are not listed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub operation: OperationKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_devices: usize,
    pub successful: usize,
    /// Failed devices, including those cancelled in flight.
    pub failed: usize,
    /// Devices never started because the run was cancelled.
    pub skipped: usize,
    /// Devices cancelled in flight (a subset of `failed`).
    pub cancelled: usize,
    /// Mean per-device score, for compliance runs.
    pub overall_score: Option<f64>,
    pub outcomes: Vec<DeviceOutcome>,
}

impl RunSummary {
    /// Outcome for `host`, if it was processed.
    pub fn outcome(&self, host: &str) -> Option<&DeviceOutcome> {
        self.outcomes.iter().find(|outcome| outcome.host == host)
    }

    /// Whether every device was processed.
    pub fn is_complete(&self) -> bool {
        self.skipped == 0 && self.cancelled == 0
    }
}
