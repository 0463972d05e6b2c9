//! Compliance check example
//!
//! Evaluates compliance rules against every device, either live over SSH or
//! offline against the latest stored backups, and prints per-device scores.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example compliance -- --inventory devices.yaml --rules rules.json --live
//! cargo run --example compliance -- --inventory devices.yaml --backups backups/
//! ```
//!
//! Write the baseline rule set to a file to start from:
//! ```bash
//! cargo run --example compliance -- --init-rules rules.json
//! ```

use std::env;
use std::path::PathBuf;

use confguard::{
    BackupDirectory, ConfigOrigin, Inventory, Orchestrator, RuleSet, SshConnectorBuilder,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Some(path) = &args.init_rules {
        RuleSet::baseline().write_json(path)?;
        println!("Wrote baseline rules to {}", path.display());
        return Ok(());
    }

    let rules = match &args.rules {
        Some(path) => RuleSet::load(path)?,
        None => RuleSet::baseline(),
    };

    let mut inventory = Inventory::load(&args.inventory)?;
    if let Some(host) = &args.host {
        inventory = inventory.only(host);
    }

    let settings = inventory.settings().clone();
    let connector = SshConnectorBuilder::new()
        .timeout(settings.connect_timeout)
        .build();
    let orchestrator = Orchestrator::new(connector).with_settings(settings);
    let backups = BackupDirectory::new(&args.backups);
    let origin = if args.live {
        ConfigOrigin::Live
    } else {
        ConfigOrigin::Offline(&backups)
    };

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            on_ctrl_c.cancel();
        }
    });

    let summary = orchestrator
        .check_compliance(inventory.as_slice(), &rules, origin, &cancel)
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("\n=== Compliance Report ===\n");
    for outcome in &summary.outcomes {
        let Some(report) = outcome.report() else {
            continue;
        };
        println!(
            "{}: {}% ({}/{} rules passed)",
            outcome.host, report.score, report.passed, report.total_rules
        );
        if !outcome.is_success() {
            println!("  ! {}", outcome.message);
        }
        for verdict in &report.verdicts {
            let mark = if verdict.compliant { "PASS" } else { "FAIL" };
            println!("  [{}] {}: {}", mark, verdict.rule, verdict.message);
        }
        println!();
    }

    if let Some(score) = summary.overall_score {
        println!("Overall compliance: {}%", score);
    }
    println!(
        "{} devices checked, {} failed, {} skipped",
        summary.total_devices, summary.failed, summary.skipped
    );

    Ok(())
}

/// Simple argument parser
struct Args {
    inventory: PathBuf,
    rules: Option<PathBuf>,
    backups: PathBuf,
    host: Option<String>,
    live: bool,
    json: bool,
    init_rules: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut inventory = PathBuf::from("config/devices.yaml");
        let mut rules = None;
        let mut backups = PathBuf::from("backups");
        let mut host = None;
        let mut live = false;
        let mut json = false;
        let mut init_rules = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--inventory" | "-i" => {
                    i += 1;
                    if i < args.len() {
                        inventory = PathBuf::from(&args[i]);
                    }
                }
                "--rules" | "-r" => {
                    i += 1;
                    if i < args.len() {
                        rules = Some(PathBuf::from(&args[i]));
                    }
                }
                "--backups" | "-b" => {
                    i += 1;
                    if i < args.len() {
                        backups = PathBuf::from(&args[i]);
                    }
                }
                "--host" | "-h" => {
                    i += 1;
                    if i < args.len() {
                        host = Some(args[i].clone());
                    }
                }
                "--init-rules" => {
                    i += 1;
                    if i < args.len() {
                        init_rules = Some(PathBuf::from(&args[i]));
                    }
                }
                "--live" | "-l" => {
                    live = true;
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
            rules,
            backups,
            host,
            live,
            json,
            init_rules,
        }
    }

    fn print_help() {
        println!(
            r#"confguard compliance example

Scores device configurations against compliance rules.

USAGE:
    cargo run --example compliance -- [OPTIONS]

OPTIONS:
    -i, --inventory <FILE>   Inventory YAML [default: config/devices.yaml]
    -r, --rules <FILE>       Rule file (JSON) [default: built-in baseline]
    -b, --backups <DIR>      Backup directory for offline checks [default: backups]
    -l, --live               Connect to devices instead of reading backups
    -h, --host <HOST>        Only check this device
        --init-rules <FILE>  Write the baseline rules to FILE and exit
        --json               Print the run summary as JSON
        --help               Print help
"#
        );
    }
}
