//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::Category;
use clap::Parser;
use std::path::PathBuf;

/// FleetBackup - scheduled running-config backup for network device fleets
///
/// Backs up the running configuration of every device in the inventory over
/// SSH, organized by device category, versions each category directory with
/// git, and writes a consolidated failure report.
///
/// Examples:
///   fleetbackup --inventory inventory.toml --root /mnt/configs
///   fleetbackup --category routers --category switches
///   fleetbackup --dry-run
///   fleetbackup --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to the device inventory file
    ///
    /// Defaults to the config file setting (inventory.toml).
    #[arg(short, long, value_name = "FILE", env = "FLEETBACKUP_INVENTORY")]
    pub inventory: Option<PathBuf>,

    /// Backup root directory containing the per-category directories
    #[arg(short, long, value_name = "DIR", env = "FLEETBACKUP_ROOT")]
    pub root: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .fleetbackup.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Only back up the given categories (repeatable)
    ///
    /// Example: --category routers --category firewalls
    #[arg(long, value_name = "CATEGORY")]
    pub category: Vec<Category>,

    /// Number of concurrent device sessions per category
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Report output path
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report output format
    #[arg(long, default_value = "html", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Skip the git commit step for all categories
    #[arg(long)]
    pub no_commit: bool,

    /// Resolve the inventory and print the per-category roster without
    /// opening any sessions
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .fleetbackup.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Exit with code 2 if any device failed to back up
    ///
    /// Useful under cron/CI where a nonzero exit should page someone.
    #[arg(long)]
    pub fail_on_errors: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// HTML document for the mail/report sink (default)
    #[default]
    Html,
    /// JSON for machine consumers
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(concurrency) = self.concurrency {
            if concurrency == 0 {
                return Err("Concurrency must be at least 1".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref inventory) = self.inventory {
            if !inventory.exists() {
                return Err(format!(
                    "Inventory file does not exist: {}",
                    inventory.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// The categories selected for this run, in processing order.
    pub fn selected_categories(&self) -> Vec<Category> {
        if self.category.is_empty() {
            Category::ALL.to_vec()
        } else {
            Category::ALL
                .into_iter()
                .filter(|c| self.category.contains(c))
                .collect()
        }
    }
}
