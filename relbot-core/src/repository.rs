//! Repository handle abstraction
//!
//! A handle pairs a hosted repository with its local clone under the
//! working directory. Handlers and the release pipeline only talk to
//! repositories through this trait, so the transport and the GitHub client
//! can be swapped out in tests.

use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;

use crate::config::Config;
use crate::Result;

/// A tracked repository: hosted API plus local clone
#[async_trait]
pub trait Repository: Send + Sync + Debug {
    /// Full name, `owner/name`
    fn full_name(&self) -> &str;

    /// Path of the local clone
    fn local_path(&self) -> &Path;

    /// Clone if missing, otherwise fetch and reset the default branch
    async fn sync_clone(&self) -> Result<()>;

    /// Nearest earlier tag and commit subjects since it, newest first
    async fn tag_log(&self, tag: &str) -> Result<TagLog>;

    /// Publish a release for an existing tag
    ///
    /// An existing release for the tag counts as success.
    async fn create_release(&self, tag: &str, name: &str, body: &str) -> Result<()>;

    /// Create a remote branch pointing at `from` (a tag or sha)
    ///
    /// An existing branch counts as success.
    async fn create_remote_branch(&self, branch: &str, from: &str) -> Result<()>;

    /// Delete a remote branch
    async fn delete_remote_branch(&self, branch: &str) -> Result<()>;

    /// Check out the default branch in the local clone, returning its name
    async fn checkout_default_branch(&self) -> Result<String>;

    /// Create or reset a local branch and check it out, continuing from the
    /// remote branch when it exists
    async fn start_local_branch(&self, branch: &str) -> Result<()>;

    /// Delete a local branch in the clone
    async fn delete_local_branch(&self, branch: &str) -> Result<()>;

    /// Commit all changes in the clone and force-push `branch`
    async fn commit_and_push(&self, branch: &str, message: &str) -> Result<()>;

    /// Open a pull request from `head` onto the default branch, or return
    /// the number of one that is already open
    async fn open_pull_request(&self, title: &str, head: &str, body: &str) -> Result<u64>;
}

/// History between a tag and the one before it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagLog {
    /// The nearest earlier tag, if there is one
    pub previous: Option<String>,
    /// Commit subjects, newest first
    pub subjects: Vec<String>,
}

/// Builds repository handles during bootstrap
pub trait RepositoryFactory: Send + Sync {
    /// Create the handle for `full_name`
    fn open(&self, config: &Config, full_name: &str) -> Result<std::sync::Arc<dyn Repository>>;
}
