//! Repository registry: full name to handle

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::repository::{Repository, RepositoryFactory};
use crate::Result;

/// Tracked repositories plus the meta repository, fixed after bootstrap
#[derive(Debug, Clone)]
pub struct RepoRegistry {
    repos: HashMap<String, Arc<dyn Repository>>,
    meta: Arc<dyn Repository>,
}

impl RepoRegistry {
    /// Build one handle per tracked repository and one for the meta repository
    pub fn build(config: &Config, factory: &dyn RepositoryFactory) -> Result<Self> {
        let mut repos = HashMap::with_capacity(config.repos.len());
        for repo in &config.repos {
            debug!(repo = %repo.name, "Registering repository");
            repos.insert(repo.name.clone(), factory.open(config, &repo.name)?);
        }

        let meta = factory.open(config, &config.meta_repo)?;

        Ok(Self { repos, meta })
    }

    /// Registry from ready-made handles
    pub fn from_parts(
        repos: impl IntoIterator<Item = Arc<dyn Repository>>,
        meta: Arc<dyn Repository>,
    ) -> Self {
        let repos = repos
            .into_iter()
            .map(|r| (r.full_name().to_string(), r))
            .collect();
        Self { repos, meta }
    }

    /// Handle for a tracked repository
    pub fn get(&self, full_name: &str) -> Option<&Arc<dyn Repository>> {
        self.repos.get(full_name)
    }

    /// Whether `full_name` is tracked
    pub fn contains(&self, full_name: &str) -> bool {
        self.repos.contains_key(full_name)
    }

    /// The meta repository handle
    pub fn meta(&self) -> &Arc<dyn Repository> {
        &self.meta
    }

    /// Tracked repository names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.repos.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of tracked repositories (excluding the meta repository)
    pub fn len(&self) -> usize {
        self.repos.len()
    }

    /// Whether no repositories are tracked
    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }
}
