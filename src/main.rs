//! FleetBackup - network device configuration backup
//!
//! A CLI tool that backs up the running configuration of a fleet of
//! network devices over SSH, organized by device category, versions each
//! category directory with git, and reports failures by kind.
//!
//! Exit codes:
//!   0 - Run completed (individual device failures do not fail the run)
//!   1 - Runtime error (inventory, config, report write failure, etc.)
//!   2 - Devices failed and --fail-on-errors was set

mod backup;
mod cli;
mod config;
mod inventory;
mod models;
mod repo;
mod report;
mod transport;

use anyhow::{Context, Result};
use backup::Dispatcher;
use chrono::Local;
use cli::{Args, OutputFormat};
use config::Config;
use inventory::Inventory;
use models::{Category, CommitResult, Device};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use transport::{OpenSshTransport, SshOptions, Transport};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("FleetBackup v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the backup
    match run_backup(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Backup run failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .fleetbackup.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(".fleetbackup.toml");

    if path.exists() {
        eprintln!("⚠️  .fleetbackup.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .fleetbackup.toml")?;

    println!("✅ Created .fleetbackup.toml with default settings.");
    println!("   Edit it to customize the backup root, inventory path, and timeouts.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete backup workflow. Returns exit code (0 or 2).
async fn run_backup(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Step 1: Resolve the inventory. Failure here is fatal; there is no
    // meaningful partial run without a device list.
    let inventory_path = PathBuf::from(&config.general.inventory);
    println!("📇 Loading inventory: {}", inventory_path.display());
    let inventory = Inventory::load(&inventory_path)?;
    info!("Inventory resolved: {} devices", inventory.devices().len());

    let categories = args.selected_categories();

    // Handle --dry-run: print the roster and exit
    if args.dry_run {
        return handle_dry_run(&inventory, &categories);
    }

    let backup_root = PathBuf::from(&config.general.backup_root);
    println!("💾 Backup root: {}", backup_root.display());
    println!("   Concurrency: {} sessions", config.general.concurrency);

    let transport: Arc<dyn Transport> = Arc::new(OpenSshTransport::new(SshOptions {
        port: config.transport.port,
        connect_timeout_seconds: config.transport.connect_timeout_seconds,
        server_alive_seconds: config.transport.server_alive_seconds,
    }));

    let dispatcher = Dispatcher::new(
        Arc::clone(&transport),
        backup_root.clone(),
        config.writer.excluded_prefixes.clone(),
        config.general.concurrency,
        !args.quiet,
    );

    // Step 2: Process categories sequentially; devices within each
    // category run concurrently. The commit for a category happens
    // strictly after its run closes.
    let mut runs = Vec::new();
    let mut commits: BTreeMap<Category, CommitResult> = BTreeMap::new();

    for category in categories {
        let devices: Vec<Device> = inventory
            .devices_in_category(category)
            .into_iter()
            .cloned()
            .collect();

        if devices.is_empty() {
            debug!(category = %category, "no devices, skipping");
            continue;
        }

        println!("\n📦 Backing up {} ({} devices)...", category, devices.len());
        let run = dispatcher.run_category(category, devices).await;

        if run.failure_count() > 0 {
            warn!(
                category = %category,
                failed = run.failure_count(),
                "devices failed in this category"
            );
        }

        if config.general.commit {
            let result = repo::commit_category(&backup_root, category, Local::now());
            println!("   {}", result);
            commits.insert(category, result);
        }

        runs.push(run);
    }

    // Step 3: Fold everything into the run-wide report and hand it to the
    // report sink (a file the mail relay picks up).
    let run_report = report::build_report(&runs, commits);

    let output = match args.format {
        OutputFormat::Html => report::generate_html_report(&run_report, Local::now()),
        OutputFormat::Json => report::generate_json_report(&run_report)?,
    };

    let output_path = PathBuf::from(&config.general.output);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    let duration = start_time.elapsed().as_secs_f64();
    println!("\n📊 Backup Summary:");
    println!(
        "   🚫 Blocked: {} | ⏱️  Timed Out: {} | 🔑 Auth Failed: {}",
        run_report.blocked.len(),
        run_report.timed_out.len(),
        run_report.auth_failed.len()
    );
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Run complete! Report saved to: {}",
        output_path.display()
    );

    if args.fail_on_errors && run_report.total_failures() > 0 {
        eprintln!(
            "\n⛔ {} device(s) failed to back up. Failing (exit code 2).",
            run_report.total_failures()
        );
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: print the per-category device roster, no sessions.
fn handle_dry_run(inventory: &Inventory, categories: &[Category]) -> Result<i32> {
    println!("\n🔍 Dry run: resolving inventory (no sessions opened)...\n");

    let mut total = 0;
    for &category in categories {
        let devices = inventory.devices_in_category(category);
        if devices.is_empty() {
            continue;
        }

        println!("   {} ({} devices):", category, devices.len());
        for device in devices {
            let marker = if device.in_group(backup::CONTEXT_CAPABLE_TAG) {
                " [context-capable]"
            } else {
                ""
            };
            println!("     🖧 {} ({}){}", device.name, device.address, marker);
            total += 1;
        }
    }

    if total == 0 {
        println!("   No devices matched the selected categories.");
    } else {
        println!("\n   Total: {} devices", total);
    }

    println!("\n✅ Dry run complete. No sessions were opened.");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .fleetbackup.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
