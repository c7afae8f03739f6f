//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.fleetbackup.toml` files.

use crate::backup::writer::default_excluded_prefixes;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Transport (SSH) settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Writer settings.
    #[serde(default)]
    pub writer: WriterConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Parent directory of the per-category backup directories.
    #[serde(default = "default_backup_root")]
    pub backup_root: String,

    /// Path to the device inventory file.
    #[serde(default = "default_inventory")]
    pub inventory: String,

    /// Default report output path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Number of concurrent device sessions per category.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Commit category directories after backing up.
    #[serde(default = "default_true")]
    pub commit: bool,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            backup_root: default_backup_root(),
            inventory: default_inventory(),
            output: default_output(),
            concurrency: default_concurrency(),
            commit: true,
            verbose: false,
        }
    }
}

fn default_backup_root() -> String {
    "/mnt/configs".to_string()
}

fn default_inventory() -> String {
    "inventory.toml".to_string()
}

fn default_output() -> String {
    "backup_report.html".to_string()
}

fn default_concurrency() -> usize {
    8
}

fn default_true() -> bool {
    true
}

/// SSH session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// TCP port for the SSH service.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connection establishment deadline in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Keepalive probe interval in seconds.
    #[serde(default = "default_server_alive")]
    pub server_alive_seconds: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            connect_timeout_seconds: default_connect_timeout(),
            server_alive_seconds: default_server_alive(),
        }
    }
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_server_alive() -> u64 {
    30
}

/// Output normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Line prefixes dropped from retrieved configurations (volatile
    /// timestamps and similar noise).
    #[serde(default = "default_excluded_prefixes")]
    pub excluded_prefixes: Vec<String>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            excluded_prefixes: default_excluded_prefixes(),
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but
    /// can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".fleetbackup.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings; options the
    /// user did not pass leave the config value untouched.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref root) = args.root {
            self.general.backup_root = root.display().to_string();
        }
        if let Some(ref inventory) = args.inventory {
            self.general.inventory = inventory.display().to_string();
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if args.no_commit {
            self.general.commit = false;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
