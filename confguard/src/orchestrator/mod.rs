//! Multi-device orchestration.
//!
//! The [`Orchestrator`] runs one operation across a device list with at most
//! `workers` devices in flight. A failure on one device never stops the
//! others: every device ends up as a [`DeviceOutcome`] in input order, and
//! the [`RunSummary`] accounts for all of them.
//!
//! A host listed more than once runs only at its first position; later
//! entries fail with [`RunError::DuplicateHost`] so no device ever has two
//! sessions open at once.
//!
//! Cancelling the token passed to a run stops new devices from starting and
//! abandons in-flight work; in-flight sessions are closed before the run
//! returns.

mod outcome;

pub use outcome::{
    DeviceOutcome, FailureKind, OperationKind, OutcomePayload, OutcomeStatus, RunSummary,
};

use std::collections::HashSet;
use std::future::Future;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::compliance::{ComplianceReport, RuleEngine, RuleSet, overall_score};
use crate::error::{ConfigurationUnavailable, DeployError, RunError};
use crate::inventory::DeviceDescriptor;
use crate::runner::{DeviceRunner, parse_command_lines, replay_commands};
use crate::session::Connector;
use crate::settings::RunSettings;
use crate::store::{BackupSink, ConfigSource};

/// Where compliance checks get configuration text from.
#[derive(Clone, Copy)]
pub enum ConfigOrigin<'a> {
    /// Connect to each device and read its running configuration.
    Live,
    /// Read each device's latest stored configuration.
    Offline(&'a dyn ConfigSource),
}

/// Runs device operations across many devices.
pub struct Orchestrator<C: Connector> {
    connector: C,
    settings: RunSettings,
}

impl<C: Connector> Orchestrator<C> {
    /// Create an orchestrator with default [`RunSettings`].
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            settings: RunSettings::default(),
        }
    }

    /// Replace the run settings.
    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    fn runner<'a>(&'a self, cancel: &'a CancellationToken) -> DeviceRunner<'a, C> {
        DeviceRunner::new(&self.connector, &self.settings, cancel)
    }

    /// Retrieve every device's running configuration, storing each one in
    /// `sink` when given.
    pub async fn backup(
        &self,
        devices: &[DeviceDescriptor],
        sink: Option<&dyn BackupSink>,
        cancel: &CancellationToken,
    ) -> RunSummary {
        let runner = self.runner(cancel);
        self.run(OperationKind::Backup, devices, cancel, move |device| {
            backup_one(runner, device, sink)
        })
        .await
    }

    /// Apply `commands` to every device and persist them.
    ///
    /// An empty command set is rejected before any device is contacted.
    pub async fn deploy(
        &self,
        devices: &[DeviceDescriptor],
        commands: &[String],
        cancel: &CancellationToken,
    ) -> Result<RunSummary, DeployError> {
        if commands.is_empty() {
            return Err(DeployError::EmptyCommandSet);
        }

        let runner = self.runner(cancel);
        let summary = self
            .run(OperationKind::Deploy, devices, cancel, move |device| {
                deploy_one(runner, device, commands)
            })
            .await;
        Ok(summary)
    }

    /// Deploy configuration text, one command per line. See
    /// [`parse_command_lines`].
    pub async fn deploy_text(
        &self,
        devices: &[DeviceDescriptor],
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, DeployError> {
        let commands = parse_command_lines(text);
        self.deploy(devices, &commands, cancel).await
    }

    /// Redeploy each device's latest stored configuration from `source`.
    ///
    /// Stored listings are turned into commands with [`replay_commands`].
    /// A device without stored configuration fails; the others proceed.
    pub async fn rollback(
        &self,
        devices: &[DeviceDescriptor],
        source: &dyn ConfigSource,
        cancel: &CancellationToken,
    ) -> RunSummary {
        let runner = self.runner(cancel);
        self.run(OperationKind::Rollback, devices, cancel, move |device| {
            rollback_one(runner, device, source)
        })
        .await
    }

    /// Evaluate `rules` against every device.
    ///
    /// Devices whose configuration cannot be obtained fail with a zero-rule
    /// report and still count towards the overall score.
    pub async fn check_compliance(
        &self,
        devices: &[DeviceDescriptor],
        rules: &RuleSet,
        origin: ConfigOrigin<'_>,
        cancel: &CancellationToken,
    ) -> RunSummary {
        let runner = self.runner(cancel);
        self.run(OperationKind::Compliance, devices, cancel, move |device| {
            check_one(runner, device, rules, origin)
        })
        .await
    }

    async fn run<'d, F, Fut>(
        &self,
        operation: OperationKind,
        devices: &'d [DeviceDescriptor],
        cancel: &CancellationToken,
        op: F,
    ) -> RunSummary
    where
        F: Fn(&'d DeviceDescriptor) -> Fut,
        Fut: Future<Output = Result<OutcomePayload, RunError>>,
    {
        let started_at = Utc::now();
        let workers = self.settings.effective_workers();
        info!(
            "Starting {} on {} devices ({} workers)",
            operation,
            devices.len(),
            workers
        );

        let mut seen = HashSet::new();
        let repeated: Vec<bool> = devices
            .iter()
            .map(|device| !seen.insert(device.host.as_str()))
            .collect();

        let mut slots: Vec<Option<DeviceOutcome>> = devices.iter().map(|_| None).collect();
        let mut results = stream::iter(devices.iter().enumerate())
            .map(|(index, device)| {
                let work = (!repeated[index]).then(|| op(device));
                async move {
                    if cancel.is_cancelled() {
                        return (index, None);
                    }
                    let Some(work) = work else {
                        let outcome = DeviceOutcome::from_result(
                            &device.host,
                            Err(RunError::DuplicateHost {
                                host: device.host.clone(),
                            }),
                        );
                        log_outcome(operation, &outcome);
                        return (index, Some(outcome));
                    };
                    let mut outcome = DeviceOutcome::from_result(&device.host, work.await);
                    if operation == OperationKind::Compliance && outcome.payload.is_none() {
                        outcome.payload = Some(OutcomePayload::Compliance(
                            ComplianceReport::unavailable(&device.host),
                        ));
                    }
                    log_outcome(operation, &outcome);
                    (index, Some(outcome))
                }
            })
            .buffer_unordered(workers);

        while let Some((index, outcome)) = results.next().await {
            slots[index] = outcome;
        }

        let outcomes: Vec<DeviceOutcome> = slots.into_iter().flatten().collect();
        let successful = outcomes.iter().filter(|o| o.is_success()).count();
        let cancelled = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Cancelled)
            .count();
        let overall = (operation == OperationKind::Compliance).then(|| {
            overall_score(
                outcomes
                    .iter()
                    .filter(|o| o.error != Some(FailureKind::Duplicate))
                    .map(|o| o.report().map_or(0.0, |report| report.score)),
            )
        });

        let summary = RunSummary {
            operation,
            started_at,
            finished_at: Utc::now(),
            total_devices: devices.len(),
            successful,
            failed: outcomes.len() - successful,
            skipped: devices.len() - outcomes.len(),
            cancelled,
            overall_score: overall,
            outcomes,
        };

        info!(
            "Finished {}: {}/{} successful, {} failed, {} skipped",
            operation, summary.successful, summary.total_devices, summary.failed, summary.skipped
        );
        if let Some(score) = summary.overall_score {
            info!("Overall compliance: {}%", score);
        }
        summary
    }
}

fn log_outcome(operation: OperationKind, outcome: &DeviceOutcome) {
    match outcome.status {
        OutcomeStatus::Success => {
            info!("{}: {} succeeded: {}", outcome.host, operation, outcome.message)
        }
        OutcomeStatus::Failure | OutcomeStatus::Cancelled => {
            warn!("{}: {} failed: {}", outcome.host, operation, outcome.message)
        }
    }
}

async fn backup_one<C: Connector>(
    runner: DeviceRunner<'_, C>,
    device: &DeviceDescriptor,
    sink: Option<&dyn BackupSink>,
) -> Result<OutcomePayload, RunError> {
    let config = runner.backup(device).await?;
    let path = match sink {
        Some(sink) => Some(sink.save(&device.host, &config).map_err(|source| RunError::Store {
            host: device.host.clone(),
            source,
        })?),
        None => None,
    };
    Ok(OutcomePayload::Backup { config, path })
}

async fn deploy_one<C: Connector>(
    runner: DeviceRunner<'_, C>,
    device: &DeviceDescriptor,
    commands: &[String],
) -> Result<OutcomePayload, RunError> {
    runner.deploy(device, commands).await?;
    Ok(OutcomePayload::Deploy {
        commands_applied: commands.len(),
    })
}

async fn rollback_one<C: Connector>(
    runner: DeviceRunner<'_, C>,
    device: &DeviceDescriptor,
    source: &dyn ConfigSource,
) -> Result<OutcomePayload, RunError> {
    let commands = replay_commands(&device.family, &stored_config(device, source)?);
    deploy_one(runner, device, &commands).await
}

async fn check_one<C: Connector>(
    runner: DeviceRunner<'_, C>,
    device: &DeviceDescriptor,
    rules: &RuleSet,
    origin: ConfigOrigin<'_>,
) -> Result<OutcomePayload, RunError> {
    let report = match origin {
        ConfigOrigin::Live => runner.check_live(device, rules).await?,
        ConfigOrigin::Offline(source) => {
            let config = stored_config(device, source)?;
            let verdicts = RuleEngine::new(rules).evaluate_offline(&config);
            ComplianceReport::from_verdicts(&device.host, verdicts)
        }
    };
    Ok(OutcomePayload::Compliance(report))
}

fn stored_config(device: &DeviceDescriptor, source: &dyn ConfigSource) -> Result<String, RunError> {
    source
        .latest(&device.host)
        .map_err(|source| RunError::Store {
            host: device.host.clone(),
            source,
        })?
        .ok_or_else(|| {
            ConfigurationUnavailable {
                host: device.host.clone(),
            }
            .into()
        })
}
