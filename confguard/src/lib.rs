//! # confguard
//!
//! Async configuration backup, deployment and compliance checking for
//! network devices over SSH.
//!
//! ## Features
//!
//! - Async SSH sessions via russh, with vendor-aware prompt handling
//! - Vendor dispatch table (Cisco, Juniper, Arista, generic fallback)
//! - Bounded-parallel runs across an inventory with per-device failure isolation
//! - Rule-based compliance scoring against live or stored configuration
//! - Cancellation that always closes in-flight sessions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use confguard::{ConfigOrigin, Inventory, Orchestrator, RuleSet, SshConnectorBuilder};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), confguard::Error> {
//!     let inventory = Inventory::load("devices.yaml")?;
//!     let rules = RuleSet::load("compliance_rules.json")?;
//!
//!     let orchestrator = Orchestrator::new(SshConnectorBuilder::new().build())
//!         .with_settings(inventory.settings().clone());
//!
//!     let summary = orchestrator
//!         .check_compliance(
//!             inventory.as_slice(),
//!             &rules,
//!             ConfigOrigin::Live,
//!             &CancellationToken::new(),
//!         )
//!         .await;
//!
//!     println!("Overall compliance: {:?}%", summary.overall_score);
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod compliance;
pub mod error;
pub mod inventory;
pub mod orchestrator;
pub mod platform;
pub mod runner;
pub mod session;
pub mod settings;
pub mod store;
pub mod transport;

// Re-export main types for convenience
pub use compliance::{ComplianceReport, Rule, RuleCheck, RuleEngine, RuleSet, RuleVerdict};
pub use error::{Error, Result};
pub use inventory::{Credentials, DeviceDescriptor, Inventory};
pub use orchestrator::{ConfigOrigin, DeviceOutcome, Orchestrator, OutcomeStatus, RunSummary};
pub use platform::{PersistAction, VendorProfile};
pub use session::{Connector, Session, SessionState, SshConnector, SshConnectorBuilder};
pub use settings::RunSettings;
pub use store::{BackupDirectory, BackupSink, ConfigSource};
