//! Git operations for freighter.
//!
//! Publishing is gated on repository state: a clean working tree with the
//! release tag checked out. Everything here shells out to `git`, which is
//! assumed to be on `PATH`; the only mutation freighter ever performs is
//! [`push_tag`].

use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};

/// Cleanliness of the working tree, from `git status --porcelain`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeStatus {
    /// Paths with uncommitted changes, untracked files included.
    pub dirty_paths: Vec<String>,
}

impl TreeStatus {
    pub fn is_clean(&self) -> bool {
        self.dirty_paths.is_empty()
    }
}

/// The release tag a given package version must carry: `v{version}`.
pub fn expected_tag(version: &str) -> String {
    format!("v{version}")
}

/// Query working-tree cleanliness.
///
/// Fails when `git` cannot answer at all, e.g. when the directory is not
/// a repository.
pub fn tree_status(path: &Path) -> Result<TreeStatus> {
    let output = Command::new("git")
        .args(["status", "--porcelain"])
        .current_dir(path)
        .output()
        .context("failed to run git status; is git installed?")?;
    if !output.status.success() {
        bail!(
            "git status failed in {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    let dirty_paths = String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| !line.is_empty())
        .map(porcelain_path)
        .collect();
    Ok(TreeStatus { dirty_paths })
}

/// Path portion of one `--porcelain` status line. Rename entries read
/// `old -> new`, and git quotes unusual paths.
fn porcelain_path(line: &str) -> String {
    let entry = line.get(3..).unwrap_or_default();
    let path = match entry.rsplit_once(" -> ") {
        Some((_, renamed)) => renamed,
        None => entry,
    };
    path.strip_prefix('"')
        .and_then(|quoted| quoted.strip_suffix('"'))
        .unwrap_or(path)
        .to_string()
}

/// The tag the current HEAD sits exactly on, if any.
///
/// A HEAD that is not on a tag is an ordinary answer, not an error.
pub fn checked_out_tag(path: &Path) -> Result<Option<String>> {
    let output = Command::new("git")
        .args(["describe", "--exact-match", "--tags"])
        .current_dir(path)
        .output()
        .context("failed to run git describe; is git installed?")?;
    if !output.status.success() {
        return Ok(None);
    }
    let tag = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(if tag.is_empty() { None } else { Some(tag) })
}

/// Every tag the repository knows locally.
pub fn list_tags(path: &Path) -> Result<BTreeSet<String>> {
    let output = Command::new("git")
        .args(["tag", "--list"])
        .current_dir(path)
        .output()
        .context("failed to run git tag; is git installed?")?;
    if !output.status.success() {
        bail!(
            "git tag --list failed in {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}

/// Push an existing local tag to `remote`. The one mutation in the whole
/// publish pipeline; rejection (missing remote, stale credentials, remote
/// already has a different tag object) is a hard error.
pub fn push_tag(path: &Path, remote: &str, tag: &str) -> Result<()> {
    let output = Command::new("git")
        .args(["push", remote, tag])
        .current_dir(path)
        .output()
        .context("failed to run git push; is git installed?")?;
    if !output.status.success() {
        bail!(
            "git push rejected tag {tag} on remote {remote}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
