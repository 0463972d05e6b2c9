//! Configuration backup example
//!
//! Retrieves the running configuration of every device in an inventory and
//! writes one timestamped file per device.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example backup -- --inventory devices.yaml --output backups/
//! ```
//!
//! Single device, JSON summary:
//! ```bash
//! cargo run --example backup -- --inventory devices.yaml --host 192.168.1.1 --json
//! ```
//!
//! Ctrl-C cancels the run; sessions in flight are closed before exit.

use std::env;
use std::path::PathBuf;

use confguard::{BackupDirectory, Inventory, Orchestrator, OutcomeStatus, SshConnectorBuilder};
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
        eprintln!("No devices to back up");
        std::process::exit(1);
    }

    let mut settings = inventory.settings().clone();
    if let Some(workers) = args.workers {
        settings = settings.with_workers(workers);
    }

    let connector = SshConnectorBuilder::new()
        .timeout(settings.connect_timeout)
        .build();
    let orchestrator = Orchestrator::new(connector).with_settings(settings);
    let store = BackupDirectory::new(&args.output);

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            on_ctrl_c.cancel();
        }
    });

    let summary = orchestrator
        .backup(inventory.as_slice(), Some(&store), &cancel)
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("\n=== Backup Summary ===\n");
        for outcome in &summary.outcomes {
            let mark = match outcome.status {
                OutcomeStatus::Success => "OK  ",
                OutcomeStatus::Failure => "FAIL",
                OutcomeStatus::Cancelled => "STOP",
            };
            println!("[{}] {}: {}", mark, outcome.host, outcome.message);
        }
        println!(
            "\n{} devices: {} successful, {} failed, {} skipped",
            summary.total_devices, summary.successful, summary.failed, summary.skipped
        );
    }

    if summary.failed > 0 || summary.skipped > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Simple argument parser
struct Args {
    inventory: PathBuf,
    output: PathBuf,
    host: Option<String>,
    workers: Option<usize>,
    json: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut inventory = PathBuf::from("config/devices.yaml");
        let mut output = PathBuf::from("backups");
        let mut host = None;
        let mut workers = None;
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
                "--output" | "-o" => {
                    i += 1;
                    if i < args.len() {
                        output = PathBuf::from(&args[i]);
                    }
                }
                "--host" | "-h" => {
                    i += 1;
                    if i < args.len() {
                        host = Some(args[i].clone());
                    }
                }
                "--workers" | "-w" => {
                    i += 1;
                    if i < args.len() {
                        workers = args[i].parse().ok();
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
            output,
            host,
            workers,
            json,
        }
    }

    fn print_help() {
        println!(
            r#"confguard backup example

Retrieves running configurations and stores them as timestamped files.

USAGE:
    cargo run --example backup -- [OPTIONS]

OPTIONS:
    -i, --inventory <FILE>   Inventory YAML [default: config/devices.yaml]
    -o, --output <DIR>       Backup directory [default: backups]
    -h, --host <HOST>        Only back up this device
    -w, --workers <N>        Devices processed concurrently
        --json               Print the run summary as JSON
        --help               Print help

ENVIRONMENT:
    RUST_LOG                 Log level (e.g., debug, info, warn)
"#
        );
    }
}
