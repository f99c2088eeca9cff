//! Version-control seam.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;

pub use freighter_git::TreeStatus;

/// The pipeline's whole view of version control: three read-only queries
/// and the single mutation (pushing the release tag).
pub trait VersionControl {
    fn tree_status(&self) -> Result<TreeStatus>;
    fn checked_out_tag(&self) -> Result<Option<String>>;
    fn list_tags(&self) -> Result<BTreeSet<String>>;
    /// Push an already-existing local tag to the configured remote.
    fn push_tag(&self, tag: &str) -> Result<()>;
}

/// `git` on `PATH`, rooted at the package directory.
#[derive(Debug, Clone)]
pub struct SystemGit {
    root: PathBuf,
    remote: String,
}

impl SystemGit {
    pub fn new(root: &Path, remote: &str) -> Self {
        SystemGit {
            root: root.to_path_buf(),
            remote: remote.to_string(),
        }
    }
}

impl VersionControl for SystemGit {
    fn tree_status(&self) -> Result<TreeStatus> {
        freighter_git::tree_status(&self.root)
    }

    fn checked_out_tag(&self) -> Result<Option<String>> {
        freighter_git::checked_out_tag(&self.root)
    }

    fn list_tags(&self) -> Result<BTreeSet<String>> {
        freighter_git::list_tags(&self.root)
    }

    fn push_tag(&self, tag: &str) -> Result<()> {
        freighter_git::push_tag(&self.root, &self.remote, tag)
    }
}
