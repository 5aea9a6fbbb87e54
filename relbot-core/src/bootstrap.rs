//! One-time construction of the application context
//!
//! [`Bootstrap`] loads configuration, prepares the working and lock
//! directories and builds the repository registry. It runs at most once per
//! process: concurrent and repeated calls to [`Bootstrap::context`] all get
//! the same [`AppContext`].

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::config::Config;
use crate::lock::LockManager;
use crate::registry::RepoRegistry;
use crate::release::ReleaseFinalizer;
use crate::repository::RepositoryFactory;
use crate::{Error, Result};

/// Everything a handler needs, immutable once built
#[derive(Clone)]
pub struct AppContext {
    config: Config,
    registry: RepoRegistry,
    locks: LockManager,
    finalizer: Arc<dyn ReleaseFinalizer>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("working_dir", &self.config.working_dir)
            .field("meta_repo", &self.config.meta_repo)
            .field("repos", &self.registry.names())
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Assemble a context from its parts
    pub fn new(
        config: Config,
        registry: RepoRegistry,
        finalizer: Arc<dyn ReleaseFinalizer>,
    ) -> Self {
        let locks = LockManager::from_config(&config);
        Self {
            config,
            registry,
            locks,
            finalizer,
        }
    }

    /// Loaded configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Repository registry
    pub fn registry(&self) -> &RepoRegistry {
        &self.registry
    }

    /// Lock manager for the working directory
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Release finalizer
    pub fn finalizer(&self) -> &dyn ReleaseFinalizer {
        self.finalizer.as_ref()
    }
}

/// Where bootstrap gets its configuration from
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Read, apply env overrides and validate at bootstrap time
    Path(PathBuf),
    /// Already loaded
    Loaded(Config),
}

/// Builds the [`AppContext`] exactly once
pub struct Bootstrap {
    source: ConfigSource,
    factory: Arc<dyn RepositoryFactory>,
    finalizer: Arc<dyn ReleaseFinalizer>,
    context: OnceCell<Arc<AppContext>>,
}

impl std::fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrap")
            .field("source", &self.source)
            .field("initialized", &self.context.initialized())
            .finish_non_exhaustive()
    }
}

impl Bootstrap {
    /// Bootstrap from a configuration source
    pub fn new(
        source: ConfigSource,
        factory: Arc<dyn RepositoryFactory>,
        finalizer: Arc<dyn ReleaseFinalizer>,
    ) -> Self {
        Self {
            source,
            factory,
            finalizer,
            context: OnceCell::new(),
        }
    }

    /// Get the application context, building it on first use
    ///
    /// A failed attempt leaves nothing behind, so a later call retries.
    pub async fn context(&self) -> Result<Arc<AppContext>> {
        self.context
            .get_or_try_init(|| async { self.initialize().map(Arc::new) })
            .await
            .cloned()
    }

    /// The context if it has already been built
    pub fn get(&self) -> Option<Arc<AppContext>> {
        self.context.get().cloned()
    }

    fn initialize(&self) -> Result<AppContext> {
        let config = match &self.source {
            ConfigSource::Path(path) => {
                let config = Config::load_from_file(path)?.with_env_overrides();
                config.validate()?;
                config
            }
            ConfigSource::Loaded(config) => config.clone(),
        };

        prepare_working_dir(&config)?;
        let registry = RepoRegistry::build(&config, self.factory.as_ref())?;

        info!(
            working_dir = %config.working_dir.display(),
            meta_repo = %config.meta_repo,
            repos = registry.len(),
            "Bootstrap complete"
        );

        Ok(AppContext::new(config, registry, Arc::clone(&self.finalizer)))
    }
}

/// Create the working directory and its lock directory if missing
pub fn prepare_working_dir(config: &Config) -> Result<()> {
    std::fs::create_dir_all(&config.working_dir).map_err(|e| {
        Error::Config(format!(
            "Cannot create working directory {}: {}",
            config.working_dir.display(),
            e
        ))
    })?;
    LockManager::from_config(config).ensure_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepoConfig;
    use crate::testing::{FakeFactory, FakeFinalizer};
    use tempfile::TempDir;

    fn bootstrap(dir: &TempDir, factory: Arc<FakeFactory>) -> Bootstrap {
        let mut config = Config::new(dir.path().join("work"), "org/meta");
        config.repos = vec![RepoConfig::new("org/a"), RepoConfig::new("org/b")];
        Bootstrap::new(
            ConfigSource::Loaded(config),
            factory,
            Arc::new(FakeFinalizer::default()),
        )
    }

    #[tokio::test]
    async fn test_bootstrap_creates_directories() {
        let dir = TempDir::new().unwrap();
        let boot = bootstrap(&dir, Arc::new(FakeFactory::default()));
        assert!(boot.get().is_none());

        let ctx = boot.context().await.unwrap();

        assert!(dir.path().join("work").is_dir());
        assert!(dir.path().join("work/lock").is_dir());
        assert_eq!(ctx.registry().names(), vec!["org/a", "org/b"]);
        assert_eq!(ctx.registry().meta().full_name(), "org/meta");
        assert!(boot.get().is_some());
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let factory = Arc::new(FakeFactory::default());
        let boot = bootstrap(&dir, Arc::clone(&factory));

        let first = boot.context().await.unwrap();
        let second = boot.context().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.opened(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_bootstrap_builds_once() {
        let dir = TempDir::new().unwrap();
        let factory = Arc::new(FakeFactory::default());
        let boot = bootstrap(&dir, Arc::clone(&factory));

        let (a, b) = tokio::join!(boot.context(), boot.context());

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(factory.opened(), 3);
    }

    #[tokio::test]
    async fn test_existing_directories_are_fine() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("work/lock")).unwrap();

        let boot = bootstrap(&dir, Arc::new(FakeFactory::default()));
        assert!(boot.context().await.is_ok());

        let config = boot.get().unwrap().config().clone();
        prepare_working_dir(&config).unwrap();
        prepare_working_dir(&config).unwrap();
    }

    #[tokio::test]
    async fn test_bad_config_path_fails_and_can_retry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relbot.toml");
        let boot = Bootstrap::new(
            ConfigSource::Path(path.clone()),
            Arc::new(FakeFactory::default()),
            Arc::new(FakeFinalizer::default()),
        );

        assert!(boot.context().await.is_err());
        assert!(boot.get().is_none());

        std::fs::write(
            &path,
            format!(
                "working_dir = {:?}\napi_key = \"ghp_test\"\nmeta_repo = \"org/meta\"\n",
                dir.path().join("work")
            ),
        )
        .unwrap();

        let ctx = boot.context().await.unwrap();
        assert_eq!(ctx.config().meta_repo, "org/meta");
    }
}
