use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use beacon_build_model::{package_for_file, BuildPackage};
use beacon_project::{DiscoveryEvent, FileBlobStore, ProjectIndexer};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "beacon", version, about = "Beacon build-target indexer CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract build targets from a single build-description file
    Targets(TargetsArgs),
    /// Discover build-description files under a project root
    Discover(DiscoverArgs),
}

#[derive(Args)]
struct TargetsArgs {
    /// Path to a build-description file (Package.swift, BUILD, …)
    file: PathBuf,
    /// Emit JSON suitable for tooling
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct DiscoverArgs {
    /// Project root (defaults to the current directory)
    #[arg(default_value = ".")]
    root: PathBuf,
    /// Emit one JSON object per discovered candidate
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TargetsReport<'a> {
    file: &'a PathBuf,
    package: &'a BuildPackage,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("BEACON_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Targets(args) => run_targets(args),
        Command::Discover(args) => run_discover(args).await,
    }
}

fn run_targets(args: TargetsArgs) -> Result<()> {
    let file = std::fs::canonicalize(&args.file)
        .with_context(|| format!("failed to resolve {}", args.file.display()))?;

    let Some(package) = package_for_file(&file) else {
        anyhow::bail!("no package found at {}", file.display());
    };

    if args.json {
        let report = TargetsReport {
            file: &file,
            package: &package,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("package {} ({})", package.name, package.path.display());
    for target in &package.targets {
        println!("  {:<8} {}", format!("{:?}", target.kind).to_lowercase(), target.label);
        for dependency in &target.dependencies {
            println!("           -> {dependency}");
        }
    }
    Ok(())
}

async fn run_discover(args: DiscoverArgs) -> Result<()> {
    let root = std::fs::canonicalize(&args.root)
        .with_context(|| format!("failed to resolve {}", args.root.display()))?;

    let store = Arc::new(FileBlobStore::new(root.join(".beacon-cache")));
    let indexer = ProjectIndexer::new(root.clone(), store);
    tracing::debug!(target: "beacon.cli", root = %root.display(), "starting discovery");

    let cached = indexer.candidates();
    if !args.json && !cached.is_empty() {
        println!("{} candidate(s) from cache", cached.len());
    }

    let Some(mut events) = indexer.refresh() else {
        anyhow::bail!("discovery already in flight for {}", root.display());
    };
    while let Some(event) = events.recv().await {
        match event {
            DiscoveryEvent::Candidate(candidate) => {
                if args.json {
                    println!("{}", serde_json::to_string(&candidate)?);
                } else {
                    println!(
                        "{:<20} {}",
                        format!("{:?}", candidate.kind),
                        candidate.path.display()
                    );
                }
            }
            DiscoveryEvent::CategoryComplete(kind) => {
                if !args.json {
                    println!("-- {kind:?} complete");
                }
            }
            DiscoveryEvent::Finished => break,
        }
    }

    if !args.json {
        let candidates = indexer.candidates();
        println!("\n{} candidate(s), most relevant first:", candidates.len());
        for candidate in candidates {
            println!("  {:<24} {}", candidate.display_name(), candidate.path.display());
        }
    }

    // Let the debounced cache write land before the process exits.
    tokio::time::sleep(Duration::from_millis(600)).await;
    Ok(())
}
