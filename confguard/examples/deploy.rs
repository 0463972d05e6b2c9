//! Configuration deployment example
//!
//! Applies a configuration file (one command per line) to every device in an
//! inventory and saves it, or rolls devices back to their latest backup.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example deploy -- --inventory devices.yaml --config ntp.txt
//! ```
//!
//! Roll back one device to its latest backup:
//! ```bash
//! cargo run --example deploy -- --inventory devices.yaml --rollback backups/ --host 192.168.1.1
//! ```

use std::env;
use std::path::PathBuf;

use confguard::{BackupDirectory, Inventory, Orchestrator, RunSummary, SshConnectorBuilder};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut inventory = Inventory::load(&args.inventory)?;
    if let Some(host) = &args.host {
        inventory = inventory.only(host);
    }
    if inventory.is_empty() {
        eprintln!("No devices to deploy to");
        std::process::exit(1);
    }

    let settings = inventory.settings().clone();
    let connector = SshConnectorBuilder::new()
        .timeout(settings.connect_timeout)
        .build();
    let orchestrator = Orchestrator::new(connector).with_settings(settings);

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            on_ctrl_c.cancel();
        }
    });

    let summary = if let Some(dir) = &args.rollback {
        println!("Rolling back {} devices from {}", inventory.len(), dir.display());
        let backups = BackupDirectory::new(dir);
        orchestrator
            .rollback(inventory.as_slice(), &backups, &cancel)
            .await
    } else if let Some(path) = &args.config {
        let text = std::fs::read_to_string(path)?;
        println!("Deploying {} to {} devices", path.display(), inventory.len());
        orchestrator
            .deploy_text(inventory.as_slice(), &text, &cancel)
            .await?
    } else {
        eprintln!("Error: Must provide either --config or --rollback");
        std::process::exit(1);
    };

    print_summary(&summary, args.json)?;

    if summary.failed > 0 || summary.skipped > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("\n=== {} Summary ===\n", summary.operation);
    for outcome in &summary.outcomes {
        let mark = if outcome.is_success() { "OK  " } else { "FAIL" };
        println!("[{}] {}: {}", mark, outcome.host, outcome.message);
    }
    println!(
        "\n{} devices: {} successful, {} failed, {} skipped",
        summary.total_devices, summary.successful, summary.failed, summary.skipped
    );
    Ok(())
}

/// Simple argument parser
struct Args {
    inventory: PathBuf,
    config: Option<PathBuf>,
    rollback: Option<PathBuf>,
    host: Option<String>,
    json: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut inventory = PathBuf::from("config/devices.yaml");
        let mut config = None;
        let mut rollback = None;
        let mut host = None;
        let mut json = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--inventory" | "-i" => {
                    i += 1;
                    if i < args.len() {
                        inventory = PathBuf::from(&args[i]);
                    }
                }
                "--config" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        config = Some(PathBuf::from(&args[i]));
                    }
                }
                "--rollback" | "-r" => {
                    i += 1;
                    if i < args.len() {
                        rollback = Some(PathBuf::from(&args[i]));
                    }
                }
                "--host" | "-h" => {
                    i += 1;
                    if i < args.len() {
                        host = Some(args[i].clone());
                    }
                }
                "--json" => {
                    json = true;
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                _ => {}
            }
            i += 1;
        }

        Self {
            inventory,
            config,
            rollback,
            host,
            json,
        }
    }

    fn print_help() {
        println!(
            r#"confguard deploy example

Deploys configuration commands to devices and saves them.

USAGE:
    cargo run --example deploy -- [OPTIONS]

OPTIONS:
    -i, --inventory <FILE>   Inventory YAML [default: config/devices.yaml]
    -c, --config <FILE>      Commands to deploy, one per line ('!' and '#' lines ignored)
    -r, --rollback <DIR>     Redeploy each device's latest backup from DIR
    -h, --host <HOST>        Only deploy to this device
        --json               Print the run summary as JSON
        --help               Print help
"#
        );
    }
}
