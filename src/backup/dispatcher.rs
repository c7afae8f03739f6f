//! Concurrent per-category dispatch.
//!
//! One blocking task per device, bounded by a semaphore; every task sends
//! exactly one outcome down an mpsc channel, and the dispatcher drains the
//! channel until all devices have reported before freezing the
//! `CategoryRun`. Devices are independent: a failure or a slow session on
//! one device never affects another, and there is no batch-wide deadline;
//! closure simply waits for every device's own session to finish or time
//! out.

use super::classify::classify;
use super::mode::{self, Route};
use super::{plain_commands, writer, CONTEXT_CAPABLE_TAG};
use crate::models::{BackupOutcome, Category, CategoryRun, Device, DeviceResult};
use crate::transport::Transport;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

/// Fans the detect→execute→classify→write pipeline out across the devices
/// of one category.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    backup_root: PathBuf,
    excluded_prefixes: Arc<Vec<String>>,
    concurrency: usize,
    show_progress: bool,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        backup_root: PathBuf,
        excluded_prefixes: Vec<String>,
        concurrency: usize,
        show_progress: bool,
    ) -> Self {
        Self {
            transport,
            backup_root,
            excluded_prefixes: Arc::new(excluded_prefixes),
            concurrency: concurrency.max(1),
            show_progress,
        }
    }

    /// Run the full pipeline for every device in `devices`, concurrently,
    /// and return the closed `CategoryRun` once all of them have reported.
    pub async fn run_category(&self, category: Category, devices: Vec<Device>) -> CategoryRun {
        let expected = devices.len();
        let mut run = CategoryRun::new(category, expected);

        if expected == 0 {
            run.close();
            return run;
        }

        info!(category = %category, devices = expected, "dispatching category");

        let progress = if self.show_progress {
            let pb = ProgressBar::new(expected as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb.set_message(category.to_string());
            pb
        } else {
            ProgressBar::hidden()
        };

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let (tx, mut rx) = mpsc::channel::<DeviceResult>(expected);

        for device in devices {
            let transport = Arc::clone(&self.transport);
            let prefixes = Arc::clone(&self.excluded_prefixes);
            let semaphore = Arc::clone(&semaphore);
            let root = self.backup_root.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("dispatcher semaphore closed");

                let name = device.name.clone();
                let result = tokio::task::spawn_blocking(move || {
                    backup_device(transport.as_ref(), &device, category, &root, &prefixes)
                })
                .await
                .unwrap_or_else(|join_err| {
                    // A panicked task still produces exactly one outcome.
                    error!(device = %name, error = %join_err, "backup task panicked");
                    DeviceResult {
                        device: name,
                        outcome: BackupOutcome::Failed(crate::models::FailureKind::TimedOut),
                    }
                });

                let _ = tx.send(result).await;
            });
        }
        drop(tx);

        // Closure barrier: every dispatched device reports before the run
        // freezes and the committer may observe it.
        while let Some(result) = rx.recv().await {
            progress.inc(1);
            run.record(result);
        }
        progress.finish_and_clear();

        run.close();
        info!(
            category = %category,
            failed = run.failure_count(),
            "category complete"
        );
        run
    }
}

/// The full pipeline for one device: route, execute, classify, write.
/// Blocking; runs on the worker pool.
fn backup_device(
    transport: &dyn Transport,
    device: &Device,
    category: Category,
    root: &Path,
    excluded_prefixes: &[String],
) -> DeviceResult {
    let route = if device.in_group(CONTEXT_CAPABLE_TAG) {
        match mode::detect(transport, device) {
            Ok(route) => route,
            Err(err) => {
                let kind = classify(&err);
                debug!(device = %device.name, error = %err, kind = %kind, "mode detection failed");
                return DeviceResult {
                    device: device.name.clone(),
                    outcome: BackupOutcome::Failed(kind),
                };
            }
        }
    } else {
        Route::Plain
    };

    let outcome = match route {
        Route::Plain => match transport.execute(device, &plain_commands()) {
            Ok(responses) => {
                let raw = responses.last().map(String::as_str).unwrap_or("");
                persist(root, category, device, writer::RUNNING_CONFIG_SUFFIX, raw, excluded_prefixes);
                BackupOutcome::Success
            }
            Err(err) => {
                let kind = classify(&err);
                debug!(device = %device.name, error = %err, kind = %kind, "session failed");
                BackupOutcome::Failed(kind)
            }
        },
        Route::Contexts(contexts) => {
            // Connectivity was established during mode detection; each
            // context fetch is independent and cannot flip the outcome.
            if contexts.is_empty() {
                warn!(device = %device.name, "multiple mode but no contexts discovered");
            }
            for context in &contexts {
                match transport.execute(device, &super::context_fetch_commands(context)) {
                    Ok(responses) => {
                        let raw = responses.last().map(String::as_str).unwrap_or("");
                        persist(
                            root,
                            category,
                            device,
                            &context.file_suffix(),
                            raw,
                            excluded_prefixes,
                        );
                    }
                    Err(err) => {
                        warn!(
                            device = %device.name,
                            context = %context.config_url,
                            error = %err,
                            "context fetch failed, output file skipped"
                        );
                    }
                }
            }
            BackupOutcome::Success
        }
    };

    DeviceResult {
        device: device.name.clone(),
        outcome,
    }
}

/// Normalize and write one configuration. A write failure costs this
/// device its output file but never aborts the batch.
fn persist(
    root: &Path,
    category: Category,
    device: &Device,
    suffix: &str,
    raw: &str,
    excluded_prefixes: &[String],
) {
    let lines = writer::normalize(raw, excluded_prefixes);
    if let Err(err) = writer::write_config(root, category, &device.name, suffix, &lines) {
        error!(device = %device.name, suffix = suffix, error = %err, "write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Credentials, FailureKind};
    use crate::transport::testing::ScriptedTransport;
    use crate::transport::TransportError;
    use std::fs;
    use tempfile::TempDir;

    fn device(name: &str, groups: &[&str]) -> Device {
        Device {
            name: name.to_string(),
            address: format!("{}.example.net", name),
            credentials: Credentials {
                username: "backup".to_string(),
                password: "secret".to_string(),
            },
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    fn dispatcher(transport: Arc<dyn Transport>, root: &Path) -> Dispatcher {
        Dispatcher::new(
            transport,
            root.to_path_buf(),
            writer::default_excluded_prefixes(),
            4,
            false,
        )
    }

    #[tokio::test]
    async fn test_routers_scenario() {
        // R1 succeeds with 5 response lines (1 denylisted), R2 times out.
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(
            "r1",
            Ok(vec![
                "!Time: Mon Nov 7\nhostname r1\ninterface Gi0/0\n ip address 10.0.0.1\nend"
                    .to_string(),
            ]),
        );
        transport.script(
            "r2",
            Err(TransportError::Timeout {
                host: "r2".to_string(),
            }),
        );

        let tmp = TempDir::new().unwrap();
        let run = dispatcher(transport, tmp.path())
            .run_category(
                Category::Routers,
                vec![device("r1", &["router"]), device("r2", &["router"])],
            )
            .await;

        assert!(run.is_closed());
        assert!(run.failures_of(FailureKind::Blocked).is_empty());
        assert_eq!(run.failures_of(FailureKind::TimedOut), vec!["r2"]);
        assert!(run.failures_of(FailureKind::AuthenticationFailed).is_empty());

        let content =
            fs::read_to_string(tmp.path().join("Routers").join("r1_running-config.txt")).unwrap();
        assert_eq!(content.lines().count(), 4);
        assert!(!content.contains("!Time:"));

        // The timed-out device left no file behind.
        assert!(!tmp
            .path()
            .join("Routers")
            .join("r2_running-config.txt")
            .exists());
    }

    #[tokio::test]
    async fn test_failure_isolation() {
        // One failing device in a batch leaves every sibling untouched.
        let transport = Arc::new(ScriptedTransport::new());
        for name in ["sw1", "sw2", "sw4"] {
            transport.script(name, Ok(vec![format!("hostname {}\nend", name)]));
        }
        transport.script(
            "sw3",
            Err(TransportError::ConnectionRefused {
                host: "sw3".to_string(),
            }),
        );

        let tmp = TempDir::new().unwrap();
        let devices = ["sw1", "sw2", "sw3", "sw4"]
            .iter()
            .map(|n| device(n, &["switch"]))
            .collect();
        let run = dispatcher(transport, tmp.path())
            .run_category(Category::Switches, devices)
            .await;

        assert_eq!(run.results().len(), 4);
        assert_eq!(run.failures_of(FailureKind::Blocked), vec!["sw3"]);
        for name in ["sw1", "sw2", "sw4"] {
            let path = tmp
                .path()
                .join("Switches")
                .join(format!("{}_running-config.txt", name));
            assert_eq!(
                fs::read_to_string(path).unwrap(),
                format!("hostname {}\nend\n", name)
            );
        }
    }

    #[tokio::test]
    async fn test_multi_context_firewall_two_files() {
        let transport = Arc::new(ScriptedTransport::new());
        // Mode probe, context listing, then two independent fetches.
        transport.script(
            "fw1",
            Ok(vec![
                String::new(),
                "Security context mode: multiple".to_string(),
            ]),
        );
        transport.script(
            "fw1",
            Ok(vec![
                String::new(),
                "admin disk0:/admin.cfg guest disk0:/guest.cfg".to_string(),
            ]),
        );
        transport.script(
            "fw1",
            Ok(vec![String::new(), "hostname fw1-admin".to_string()]),
        );
        transport.script(
            "fw1",
            Ok(vec![String::new(), "hostname fw1-guest".to_string()]),
        );

        let tmp = TempDir::new().unwrap();
        let run = dispatcher(transport, tmp.path())
            .run_category(
                Category::Firewalls,
                vec![device("fw1", &["firewall", "multi-context"])],
            )
            .await;

        assert_eq!(run.results().len(), 1);
        assert_eq!(run.results()[0].outcome, BackupOutcome::Success);

        let dir = tmp.path().join("Firewalls");
        assert!(dir.join("fw1_disk0-admin.txt").exists());
        assert!(dir.join("fw1_disk0-guest.txt").exists());
    }

    #[tokio::test]
    async fn test_context_fetch_failure_keeps_parent_success() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(
            "fw1",
            Ok(vec![
                String::new(),
                "Security context mode: multiple".to_string(),
            ]),
        );
        transport.script(
            "fw1",
            Ok(vec![
                String::new(),
                "admin disk0:/admin.cfg guest disk0:/guest.cfg".to_string(),
            ]),
        );
        // First fetch fails, second succeeds: sibling isolation.
        transport.script(
            "fw1",
            Err(TransportError::Timeout {
                host: "fw1".to_string(),
            }),
        );
        transport.script(
            "fw1",
            Ok(vec![String::new(), "hostname fw1-guest".to_string()]),
        );

        let tmp = TempDir::new().unwrap();
        let run = dispatcher(transport, tmp.path())
            .run_category(
                Category::Firewalls,
                vec![device("fw1", &["firewall", "multi-context"])],
            )
            .await;

        assert_eq!(run.results()[0].outcome, BackupOutcome::Success);
        let dir = tmp.path().join("Firewalls");
        assert!(!dir.join("fw1_disk0-admin.txt").exists());
        assert!(dir.join("fw1_disk0-guest.txt").exists());
    }

    #[tokio::test]
    async fn test_mode_detection_failure_excludes_both_paths() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(
            "fw1",
            Err(TransportError::AuthenticationRejected {
                host: "fw1".to_string(),
            }),
        );

        let tmp = TempDir::new().unwrap();
        let scripted = Arc::clone(&transport);
        let run = dispatcher(transport, tmp.path())
            .run_category(
                Category::Firewalls,
                vec![device("fw1", &["firewall", "multi-context"])],
            )
            .await;

        assert_eq!(
            run.failures_of(FailureKind::AuthenticationFailed),
            vec!["fw1"]
        );
        // Only the mode probe ran: no context listing, no plain fetch.
        assert_eq!(scripted.calls_for("fw1").len(), 1);
        assert!(!tmp.path().join("Firewalls").exists());
    }

    #[tokio::test]
    async fn test_plain_firewall_skips_mode_detection() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script("fw2", Ok(vec!["hostname fw2\nend".to_string()]));

        let tmp = TempDir::new().unwrap();
        let scripted = Arc::clone(&transport);
        let run = dispatcher(transport, tmp.path())
            .run_category(Category::Firewalls, vec![device("fw2", &["firewall"])])
            .await;

        assert_eq!(run.results()[0].outcome, BackupOutcome::Success);
        let calls = scripted.calls_for("fw2");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec!["show running-config"]);
    }

    #[tokio::test]
    async fn test_empty_category_closes_immediately() {
        let transport: Arc<dyn Transport> = Arc::new(ScriptedTransport::new());
        let tmp = TempDir::new().unwrap();
        let run = dispatcher(transport, tmp.path())
            .run_category(Category::Voice, Vec::new())
            .await;

        assert!(run.is_closed());
        assert!(run.results().is_empty());
    }
}
