//! warmboot-ctl: offline tooling for warm boot host table snapshots.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use sonic_warmboot::audit::{self, AuditCategory, AuditOutcome, AuditRecord};
use sonic_warmboot::snapshot::{self, SchemaLayout};
use sonic_warmboot::{
    audit_log, reconcile, InMemoryHardware, ReconcileOptions, ReconcileOutcome, WarmBootConfig,
};

/// Inspect, verify and upgrade warm boot snapshots
#[derive(Parser, Debug)]
#[command(name = "warmboot-ctl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the layout and entry counts of a snapshot
    Inspect {
        /// Snapshot file (defaults to the configured path)
        snapshot: Option<PathBuf>,
    },

    /// Reconcile a snapshot against a hardware image without touching an ASIC
    Verify {
        /// Snapshot file (defaults to the configured path)
        snapshot: Option<PathBuf>,

        /// Hardware dump ({"egresses": [...], "ecmpEgresses": [...]}); empty if omitted
        #[arg(long)]
        hw: Option<PathBuf>,

        /// Abort on the first entry error
        #[arg(long)]
        strict: bool,
    },

    /// Rewrite a legacy snapshot in the current layout
    Upgrade {
        /// Snapshot file (defaults to the configured path)
        snapshot: Option<PathBuf>,

        /// Output file (defaults to rewriting the input in place)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Write compact JSON
        #[arg(long)]
        compact: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.json_logs {
        audit::init_logging_json(&args.log_level);
    } else {
        audit::init_logging(&args.log_level);
    }

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("warmboot-ctl: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = match &args.config {
        Some(path) => {
            let config = WarmBootConfig::from_file(path)?;
            audit_log!(AuditRecord::new(
                AuditCategory::ConfigurationChange,
                "warmboot-ctl",
                "load_config"
            )
            .with_outcome(AuditOutcome::Success)
            .with_object_id(path.display().to_string()));
            config
        }
        None => WarmBootConfig::default(),
    };

    match args.command {
        Command::Inspect { snapshot } => {
            let path = snapshot.unwrap_or(config.snapshot_path);
            let loaded = read(&path).await?;
            println!("{}", serde_json::to_string_pretty(&loaded.summary())?);
            Ok(ExitCode::SUCCESS)
        }

        Command::Verify {
            snapshot,
            hw,
            strict,
        } => {
            let config = if strict { config.with_strict(true) } else { config };
            let path = snapshot.unwrap_or(config.snapshot_path);
            let loaded = read(&path).await?;
            let mut hardware = match &hw {
                Some(dump) => InMemoryHardware::from_dump_file(dump)
                    .await
                    .with_context(|| format!("loading hardware dump {}", dump.display()))?,
                None => InMemoryHardware::new(),
            };

            let options = ReconcileOptions {
                strict: config.strict,
            };
            let outcome = reconcile(&loaded, &mut hardware, options);
            let report = outcome.report();
            let dropped: Vec<String> = report.dropped.iter().map(|d| d.to_string()).collect();
            let verdict = if outcome.is_reconciled() {
                "reconciled"
            } else {
                "aborted"
            };

            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "outcome": verdict,
                    "strict": options.strict,
                    "counts": report.counts(),
                    "dropped": dropped,
                }))?
            );

            Ok(match outcome {
                ReconcileOutcome::Reconciled { .. } => ExitCode::SUCCESS,
                ReconcileOutcome::Aborted { .. } => ExitCode::FAILURE,
            })
        }

        Command::Upgrade {
            snapshot,
            output,
            compact,
        } => {
            let path = snapshot.unwrap_or(config.snapshot_path);
            let loaded = read(&path).await?;
            if loaded.layout == SchemaLayout::Current && output.is_none() {
                info!(path = %path.display(), "Snapshot already uses the current layout");
                return Ok(ExitCode::SUCCESS);
            }

            let target = output.unwrap_or_else(|| path.clone());
            let pretty = !compact && config.pretty;
            snapshot::write_document(&target, &loaded.to_document(), pretty).await?;
            println!(
                "upgraded {} ({} layout) -> {}",
                path.display(),
                loaded.layout,
                target.display()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn read(path: &std::path::Path) -> anyhow::Result<snapshot::LoadedSnapshot> {
    match snapshot::read_snapshot(path)
        .await
        .with_context(|| format!("loading snapshot {}", path.display()))?
    {
        Some(loaded) => Ok(loaded),
        None => bail!("no snapshot at {}", path.display()),
    }
}
