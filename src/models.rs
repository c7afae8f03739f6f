//! Data models for the backup orchestrator.
//!
//! This module contains the core data structures shared across the
//! pipeline: devices, categories, outcomes, and run-level results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Backup category: a device-type partition mapping to exactly one
/// output directory and one git repository.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Firewalls,
    Switches,
    Routers,
    Voice,
    Wlcs,
}

impl Category {
    /// Processing order for a run. Categories run sequentially; devices
    /// within a category run concurrently.
    pub const ALL: [Category; 5] = [
        Category::Firewalls,
        Category::Switches,
        Category::Routers,
        Category::Voice,
        Category::Wlcs,
    ];

    /// Directory name under the backup root for this category.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Firewalls => "Firewalls",
            Category::Switches => "Switches",
            Category::Routers => "Routers",
            Category::Voice => "Voice Gateways",
            Category::Wlcs => "WLCs",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Firewalls => write!(f, "Firewalls"),
            Category::Switches => write!(f, "Switches"),
            Category::Routers => write!(f, "Routers"),
            Category::Voice => write!(f, "Voice"),
            Category::Wlcs => write!(f, "WLCs"),
        }
    }
}

/// Map an inventory group tag to its backup category.
///
/// Tags that don't name a category (capability tags like `multi-context`)
/// return `None`.
pub fn category_for_group(tag: &str) -> Option<Category> {
    match tag.to_lowercase().as_str() {
        "firewall" => Some(Category::Firewalls),
        "switch" | "nexus" => Some(Category::Switches),
        "router" => Some(Category::Routers),
        "voice" => Some(Category::Voice),
        "wireless" | "wlc" => Some(Category::Wlcs),
        _ => None,
    }
}

/// Decrypted credential pair for a device session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never log passwords.
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A network device from the resolved inventory.
///
/// All fields are immutable for the duration of a run. Per-run capability
/// state (single vs. multiple contexts) is not stored here; the mode
/// detector returns an explicit routing decision instead.
#[derive(Debug, Clone)]
pub struct Device {
    /// Short name, used for output filenames.
    pub name: String,
    /// Network address (IP or resolvable hostname).
    pub address: String,
    /// Session credentials.
    pub credentials: Credentials,
    /// Group tags: one category tag plus optional capability tags.
    pub groups: Vec<String>,
}

impl Device {
    /// Whether the device carries the given group tag (case-insensitive).
    pub fn in_group(&self, tag: &str) -> bool {
        self.groups.iter().any(|g| g.eq_ignore_ascii_case(tag))
    }

    /// The backup category this device belongs to, if exactly one of its
    /// group tags maps to a category.
    pub fn category(&self) -> Option<Category> {
        let mut found = None;
        for group in &self.groups {
            if let Some(category) = category_for_group(group) {
                match found {
                    None => found = Some(category),
                    Some(existing) if existing == category => {}
                    Some(_) => return None, // ambiguous
                }
            }
        }
        found
    }
}

/// A virtual security context discovered on a multi-context firewall.
///
/// Identified only by its configuration-file URL; ephemeral, produced and
/// consumed within one device's backup pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    /// Stored configuration URL, e.g. `disk0:/admin.cfg`.
    pub config_url: String,
}

impl Context {
    pub fn new(config_url: impl Into<String>) -> Self {
        Self {
            config_url: config_url.into(),
        }
    }

    /// Filename suffix for this context's output file.
    ///
    /// `disk0:/admin.cfg` becomes `disk0-admin`.
    pub fn file_suffix(&self) -> String {
        let trimmed = self
            .config_url
            .strip_suffix(".cfg")
            .unwrap_or(&self.config_url);
        trimmed.replace(":/", "-").replace([':', '/'], "-")
    }
}

/// Classified failure kind for a device that produced no backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// The device actively refused the connection (firewall or local policy).
    Blocked,
    /// Unreachable, dropped, or offline: the catch-all bucket.
    TimedOut,
    /// The device rejected the session credentials.
    AuthenticationFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Blocked => write!(f, "Blocked"),
            FailureKind::TimedOut => write!(f, "Timed Out"),
            FailureKind::AuthenticationFailed => write!(f, "Authentication Failed"),
        }
    }
}

/// Per-device result of one run. Every dispatched device produces exactly
/// one of these. A multi-context firewall still yields a single outcome;
/// its connectivity is established during mode detection, before any
/// per-context fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupOutcome {
    /// Configuration retrieved; output persisted by the writer.
    Success,
    /// Session failed; classified into the three-bucket taxonomy.
    Failed(FailureKind),
}

/// One device's reported outcome, as collected by the dispatcher.
#[derive(Debug, Clone)]
pub struct DeviceResult {
    pub device: String,
    pub outcome: BackupOutcome,
}

/// All outcomes for one category in one run.
///
/// Created at dispatch start, accumulates outcomes as devices complete,
/// and is closed once every dispatched device has reported. The committer
/// only runs against a closed `CategoryRun`.
#[derive(Debug)]
pub struct CategoryRun {
    pub category: Category,
    expected: usize,
    results: Vec<DeviceResult>,
    closed: bool,
}

impl CategoryRun {
    pub fn new(category: Category, expected: usize) -> Self {
        Self {
            category,
            expected,
            results: Vec::with_capacity(expected),
            closed: false,
        }
    }

    /// Record one device's outcome. Must not be called after `close()`.
    pub fn record(&mut self, result: DeviceResult) {
        debug_assert!(!self.closed, "outcome recorded after run closure");
        self.results.push(result);
    }

    /// Whether every dispatched device has reported.
    pub fn is_complete(&self) -> bool {
        self.results.len() == self.expected
    }

    /// Freeze the run. Panics in debug builds if devices are still in flight.
    pub fn close(&mut self) {
        debug_assert!(self.is_complete(), "run closed with devices in flight");
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn results(&self) -> &[DeviceResult] {
        &self.results
    }

    /// Device names that failed with the given kind.
    pub fn failures_of(&self, kind: FailureKind) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.outcome == BackupOutcome::Failed(kind))
            .map(|r| r.device.as_str())
            .collect()
    }

    /// Number of failed devices in this run.
    pub fn failure_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, BackupOutcome::Failed(_)))
            .count()
    }
}

/// Outcome of the versioning step for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "detail")]
pub enum CommitResult {
    /// A snapshot commit was created (short commit id).
    Committed(String),
    /// The staged tree was identical to the last commit. Expected, not an error.
    NoChanges,
    /// Staging or committing failed for a reason other than an empty diff.
    Error(String),
}

impl fmt::Display for CommitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitResult::Committed(id) => write!(f, "Committed {}", id),
            CommitResult::NoChanges => write!(f, "No changes since last backup"),
            CommitResult::Error(detail) => write!(f, "Commit failed: {}", detail),
        }
    }
}

/// The run-wide report handed to the report sink: every failed host keyed
/// by failure kind, plus per-category commit status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub blocked: Vec<String>,
    pub timed_out: Vec<String>,
    pub auth_failed: Vec<String>,
    pub commits: BTreeMap<Category, CommitResult>,
}

impl RunReport {
    /// Total number of failed devices across all kinds.
    pub fn total_failures(&self) -> usize {
        self.blocked.len() + self.timed_out.len() + self.auth_failed.len()
    }
}
