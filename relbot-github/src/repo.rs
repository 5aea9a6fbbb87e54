//! GitHub-hosted repository with a local clone
//!
//! Hosted operations (releases, branch refs, pull requests) go through the
//! REST API. Everything that touches the working tree runs on a blocking
//! thread against the clone at `<working_dir>/<owner>/<name>`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use relbot_core::git::{remote, GitRepo};
use relbot_core::{Config, Repository, RepositoryFactory, TagLog};
use tracing::{debug, info};

use crate::GitHubClient;

/// A tracked repository on GitHub
pub struct GitHubRepo {
    full_name: String,
    path: PathBuf,
    token: String,
    client: GitHubClient,
}

impl GitHubRepo {
    /// Handle for `full_name` cloned under `working_dir`
    pub fn new(full_name: &str, working_dir: &Path, token: &str) -> relbot_core::Result<Self> {
        let client = GitHubClient::from_url(full_name, token)?;
        let path = working_dir.join(client.owner()).join(client.repo());

        Ok(Self {
            full_name: full_name.to_string(),
            path,
            token: token.to_string(),
            client,
        })
    }

    /// Run `f` against the local clone on a blocking thread
    async fn with_clone<T, F>(&self, f: F) -> relbot_core::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&GitRepo) -> relbot_core::Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let repo = GitRepo::open(&path)?;
            f(&repo)
        })
        .await?
    }
}

impl std::fmt::Debug for GitHubRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubRepo")
            .field("full_name", &self.full_name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Repository for GitHubRepo {
    fn full_name(&self) -> &str {
        &self.full_name
    }

    fn local_path(&self) -> &Path {
        &self.path
    }

    async fn sync_clone(&self) -> relbot_core::Result<()> {
        let full_name = self.full_name.clone();
        let path = self.path.clone();
        let token = self.token.clone();

        tokio::task::spawn_blocking(move || -> relbot_core::Result<()> {
            let cloned = remote::ensure_clone(&full_name, &path, &token)?;
            let branch = GitRepo::open(&path)?.default_branch()?;
            remote::sync_branch(&path, &branch, &token)?;
            debug!(repo = %full_name, branch = %branch, cloned, "Clone up to date");
            Ok(())
        })
        .await?
    }

    async fn tag_log(&self, tag: &str) -> relbot_core::Result<TagLog> {
        let tag = tag.to_string();
        self.with_clone(move |repo| {
            let previous = repo.previous_tag(&tag)?;
            let subjects = repo.commit_subjects(previous.as_deref(), &tag)?;
            Ok(TagLog { previous, subjects })
        })
        .await
    }

    async fn create_release(&self, tag: &str, name: &str, body: &str) -> relbot_core::Result<()> {
        Ok(self.client.create_release(tag, name, body).await?)
    }

    async fn create_remote_branch(&self, branch: &str, from: &str) -> relbot_core::Result<()> {
        let from = from.to_string();
        let sha = self.with_clone(move |repo| repo.resolve_commit(&from)).await?;
        Ok(self.client.create_branch(branch, &sha).await?)
    }

    async fn delete_remote_branch(&self, branch: &str) -> relbot_core::Result<()> {
        Ok(self.client.delete_branch(branch).await?)
    }

    async fn checkout_default_branch(&self) -> relbot_core::Result<String> {
        self.with_clone(|repo| {
            let branch = repo.default_branch()?;
            repo.checkout_branch(&branch)?;
            Ok(branch)
        })
        .await
    }

    async fn start_local_branch(&self, branch: &str) -> relbot_core::Result<()> {
        let branch = branch.to_string();
        self.with_clone(move |repo| repo.start_branch(&branch)).await
    }

    async fn delete_local_branch(&self, branch: &str) -> relbot_core::Result<()> {
        let branch = branch.to_string();
        self.with_clone(move |repo| repo.delete_local_branch(&branch))
            .await
    }

    async fn commit_and_push(&self, branch: &str, message: &str) -> relbot_core::Result<()> {
        let branch = branch.to_string();
        let message = message.to_string();
        let token = self.token.clone();
        self.with_clone(move |repo| {
            let sha = repo.commit_all(&message)?;
            debug!(branch = %branch, sha = %sha, "Committed");
            remote::push_branch(repo.root(), &branch, &token)
        })
        .await
    }

    async fn open_pull_request(&self, title: &str, head: &str, body: &str) -> relbot_core::Result<u64> {
        if let Some(number) = self.client.find_open_pull(head).await? {
            info!(number, head = %head, "Pull request already open");
            return Ok(number);
        }

        let base = self.with_clone(|repo| repo.default_branch()).await?;
        Ok(self.client.create_pull(title, head, &base, body).await?)
    }
}

/// Builds [`GitHubRepo`] handles from the config's working directory and
/// API key
#[derive(Debug, Clone, Copy, Default)]
pub struct GitHubRepoFactory;

impl RepositoryFactory for GitHubRepoFactory {
    fn open(&self, config: &Config, full_name: &str) -> relbot_core::Result<Arc<dyn Repository>> {
        let repo = GitHubRepo::new(full_name, &config.working_dir, &config.api_key)?;
        Ok(Arc::new(repo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use tempfile::TempDir;

    fn commit_file(repo: &git2::Repository, name: &str, message: &str) -> git2::Oid {
        let root = repo.workdir().unwrap().to_path_buf();
        std::fs::write(root.join(name), message).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let parents = match repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => vec![],
        };
        let parents: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    fn tag_head(repo: &git2::Repository, tag: &str) {
        let head = repo.head().unwrap().peel(git2::ObjectType::Commit).unwrap();
        repo.tag_lightweight(tag, &head, false).unwrap();
    }

    /// A handle whose clone already exists at `<dir>/org/lib`, on `main`
    fn setup() -> (TempDir, GitHubRepo, git2::Repository) {
        let dir = TempDir::new().unwrap();
        let handle = GitHubRepo::new("org/lib", dir.path(), "token").unwrap();

        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head("main");
        std::fs::create_dir_all(handle.local_path()).unwrap();
        let repo = git2::Repository::init_opts(handle.local_path(), &opts).unwrap();

        (dir, handle, repo)
    }

    #[tokio::test]
    async fn test_clone_path() {
        let dir = TempDir::new().unwrap();
        let handle = GitHubRepo::new("org/lib", dir.path(), "token").unwrap();
        assert_eq!(handle.full_name(), "org/lib");
        assert_eq!(handle.local_path(), dir.path().join("org").join("lib"));
        assert!(!format!("{:?}", handle).contains("token"));
    }

    #[tokio::test]
    async fn test_factory_rejects_missing_token() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path(), "org/meta");
        let err = GitHubRepoFactory.open(&config, "org/meta").unwrap_err();
        assert!(matches!(err, relbot_core::Error::Config(_)));
    }

    #[tokio::test]
    async fn test_tag_log() {
        let (_dir, handle, repo) = setup();
        commit_file(&repo, "a.txt", "Initial commit");
        tag_head(&repo, "0.1.0");
        commit_file(&repo, "b.txt", "Add feature");
        commit_file(&repo, "c.txt", "Fix bug");
        tag_head(&repo, "0.2.0");

        let log = handle.tag_log("0.2.0").await.unwrap();
        assert_eq!(log.previous.as_deref(), Some("0.1.0"));
        assert_eq!(log.subjects, vec!["Fix bug", "Add feature"]);

        let first = handle.tag_log("0.1.0").await.unwrap();
        assert_eq!(first.previous, None);
        assert_eq!(first.subjects, vec!["Initial commit"]);
    }

    #[tokio::test]
    async fn test_local_branch_cycle() {
        let (_dir, handle, repo) = setup();
        commit_file(&repo, "constraints.txt", "Initial commit");

        handle.start_local_branch("bump_meta").await.unwrap();
        let pin = handle.local_path().join("constraints.txt");
        std::fs::write(&pin, "lib==0.2.0\n").unwrap();
        handle
            .with_clone(|repo| repo.commit_all("Bump lib"))
            .await
            .unwrap();

        assert_eq!(handle.checkout_default_branch().await.unwrap(), "main");
        assert_eq!(std::fs::read_to_string(&pin).unwrap(), "Initial commit");

        handle.delete_local_branch("bump_meta").await.unwrap();
        let branches = handle
            .with_clone(|repo| repo.list_local_branches())
            .await
            .unwrap();
        assert_eq!(branches, vec!["main"]);
    }

    #[tokio::test]
    async fn test_missing_clone_is_an_error() {
        let dir = TempDir::new().unwrap();
        let handle = GitHubRepo::new("org/lib", dir.path(), "token").unwrap();
        assert!(handle.tag_log("1.0.0").await.is_err());
        assert!(handle.delete_local_branch("bump_meta").await.is_err());
        assert!(handle.checkout_default_branch().await.is_err());
    }
}
