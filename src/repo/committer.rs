//! Versioned snapshot committer.
//!
//! Each category directory is its own git repository. After a category's
//! run closes, all changes under the directory are staged and a single
//! commit is attempted. An unchanged tree is the expected steady state
//! (`NoChanges`), not an error; any other git failure is captured and
//! reported without blocking subsequent categories.

use crate::models::{Category, CommitResult};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use git2::{IndexAddOption, Repository};
use std::path::Path;
use tracing::{debug, info};

/// Stage everything under the category's directory and attempt one commit.
///
/// Must only be called after the category's `CategoryRun` has closed; the
/// caller owns that barrier.
pub fn commit_category(
    backup_root: &Path,
    category: Category,
    timestamp: DateTime<Local>,
) -> CommitResult {
    let dir = backup_root.join(category.dir_name());
    debug!(category = %category, dir = %dir.display(), "committing snapshot");

    match try_commit(&dir, timestamp) {
        Ok(Some(id)) => {
            info!(category = %category, commit = %id, "snapshot committed");
            CommitResult::Committed(id)
        }
        Ok(None) => {
            info!(category = %category, "no changes since last snapshot");
            CommitResult::NoChanges
        }
        Err(err) => CommitResult::Error(format!("{:#}", err)),
    }
}

/// Commit message carrying the run timestamp at second precision.
fn commit_message(timestamp: DateTime<Local>) -> String {
    format!("Automated update: {}", timestamp.format("%Y-%m-%dT%H:%M:%S"))
}

fn try_commit(dir: &Path, timestamp: DateTime<Local>) -> Result<Option<String>> {
    let repo = Repository::open(dir)
        .with_context(|| format!("failed to open repository at {}", dir.display()))?;

    let mut index = repo.index().context("failed to read index")?;
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .context("failed to stage changes")?;
    index.write().context("failed to write index")?;

    let tree_id = index.write_tree().context("failed to write tree")?;
    let head = repo
        .head()
        .ok()
        .and_then(|head| head.peel_to_commit().ok());

    // Nothing to commit: staged tree identical to the last snapshot, or a
    // brand-new repository with nothing staged.
    match &head {
        Some(parent) if parent.tree_id() == tree_id => return Ok(None),
        None if index.is_empty() => return Ok(None),
        _ => {}
    }

    let tree = repo.find_tree(tree_id).context("failed to find tree")?;
    let signature = repo
        .signature()
        .or_else(|_| git2::Signature::now("fleetbackup", "fleetbackup@localhost"))
        .context("failed to build signature")?;

    let parents: Vec<&git2::Commit> = head.iter().collect();
    let oid = repo
        .commit(
            Some("HEAD"),
            &signature,
            &signature,
            &commit_message(timestamp),
            &tree,
            &parents,
        )
        .context("failed to commit")?;

    Ok(Some(oid.to_string()[..8].to_string()))
}
