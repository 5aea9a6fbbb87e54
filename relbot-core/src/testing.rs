//! In-memory fakes for repositories and the release finalizer
//!
//! Every fake records the calls made to it so tests can assert on order.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::bootstrap::{prepare_working_dir, AppContext};
use crate::config::{Config, RepoConfig};
use crate::registry::RepoRegistry;
use crate::release::ReleaseFinalizer;
use crate::repository::{Repository, RepositoryFactory, TagLog};
use crate::{Error, Result};

const REMOTE_OPS: &[&str] = &[
    "create_release",
    "create_remote_branch",
    "delete_remote_branch",
    "open_pull_request",
];

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<String>,
    fail_on: HashSet<String>,
    fail_once: HashSet<String>,
    tag_log: TagLog,
    release_bodies: Vec<String>,
}

/// Repository that records calls instead of touching git or GitHub
#[derive(Debug)]
pub struct FakeRepository {
    name: String,
    path: PathBuf,
    delay: Duration,
    state: Mutex<FakeState>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeRepository {
    /// Fake for `name` whose clone lives at `path`
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            delay: Duration::ZERO,
            state: Mutex::new(FakeState::default()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Make every operation take `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make the named operation fail
    pub fn fail_on(&self, op: &str) {
        self.lock().fail_on.insert(op.to_string());
    }

    /// Make the next call of the named operation fail, as if the run was cut
    /// short there
    pub fn fail_once(&self, op: &str) {
        self.lock().fail_once.insert(op.to_string());
    }

    /// History returned by `tag_log`
    pub fn set_tag_log(&self, log: TagLog) {
        self.lock().tag_log = log;
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Bodies passed to `create_release`
    pub fn release_bodies(&self) -> Vec<String> {
        self.lock().release_bodies.clone()
    }

    /// Highest number of operations that were in flight at once
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn step(&self, op: &str, call: String) -> Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let failing = {
            let mut state = self.lock();
            state.calls.push(call);
            state.fail_on.contains(op) || state.fail_once.remove(op)
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if !failing {
            Ok(())
        } else if REMOTE_OPS.contains(&op) {
            Err(Error::Remote(format!("{} failed on {}", op, self.name)))
        } else {
            Err(Error::Git(format!("{} failed on {}", op, self.name)))
        }
    }
}

#[async_trait]
impl Repository for FakeRepository {
    fn full_name(&self) -> &str {
        &self.name
    }

    fn local_path(&self) -> &Path {
        &self.path
    }

    async fn sync_clone(&self) -> Result<()> {
        self.step("sync_clone", "sync_clone".to_string()).await
    }

    async fn tag_log(&self, tag: &str) -> Result<TagLog> {
        self.step("tag_log", format!("tag_log {}", tag)).await?;
        Ok(self.lock().tag_log.clone())
    }

    async fn create_release(&self, tag: &str, _name: &str, body: &str) -> Result<()> {
        self.step("create_release", format!("create_release {}", tag))
            .await?;
        self.lock().release_bodies.push(body.to_string());
        Ok(())
    }

    async fn create_remote_branch(&self, branch: &str, from: &str) -> Result<()> {
        self.step(
            "create_remote_branch",
            format!("create_remote_branch {} {}", branch, from),
        )
        .await
    }

    async fn delete_remote_branch(&self, branch: &str) -> Result<()> {
        self.step(
            "delete_remote_branch",
            format!("delete_remote_branch {}", branch),
        )
        .await
    }

    async fn checkout_default_branch(&self) -> Result<String> {
        self.step("checkout_default_branch", "checkout_default_branch".to_string())
            .await?;
        Ok("main".to_string())
    }

    async fn start_local_branch(&self, branch: &str) -> Result<()> {
        self.step("start_local_branch", format!("start_local_branch {}", branch))
            .await
    }

    async fn delete_local_branch(&self, branch: &str) -> Result<()> {
        self.step("delete_local_branch", format!("delete_local_branch {}", branch))
            .await
    }

    async fn commit_and_push(&self, branch: &str, _message: &str) -> Result<()> {
        self.step("commit_and_push", format!("commit_and_push {}", branch))
            .await
    }

    async fn open_pull_request(&self, title: &str, head: &str, _body: &str) -> Result<u64> {
        self.step("open_pull_request", format!("open_pull_request {} {}", title, head))
            .await?;
        Ok(1)
    }
}

/// Factory handing out [`FakeRepository`] instances
#[derive(Debug, Default)]
pub struct FakeFactory {
    delay: Duration,
    opened: AtomicUsize,
    repos: Mutex<HashMap<String, Arc<FakeRepository>>>,
}

impl FakeFactory {
    /// Factory whose repositories take `delay` per operation
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// How many handles have been created
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// The fake created for `full_name`, if any
    pub fn repo(&self, full_name: &str) -> Option<Arc<FakeRepository>> {
        self.repos
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(full_name)
            .cloned()
    }
}

impl RepositoryFactory for FakeFactory {
    fn open(&self, config: &Config, full_name: &str) -> Result<Arc<dyn Repository>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let repo = Arc::new(
            FakeRepository::new(full_name, config.working_dir.join(full_name))
                .with_delay(self.delay),
        );
        self.repos
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(full_name.to_string(), Arc::clone(&repo));
        Ok(repo)
    }
}

/// One recorded `finish_release` call: (tag, repository, meta repository)
pub type FinalizeCall = (String, String, String);

/// Finalizer that records its calls
#[derive(Debug, Default)]
pub struct FakeFinalizer {
    calls: Mutex<Vec<FinalizeCall>>,
    fail: bool,
}

impl FakeFinalizer {
    /// A finalizer whose every call fails
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Calls made so far
    pub fn calls(&self) -> Vec<FinalizeCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ReleaseFinalizer for FakeFinalizer {
    async fn finish_release(
        &self,
        tag: &str,
        repo: &dyn Repository,
        _config: &Config,
        meta: &dyn Repository,
    ) -> Result<()> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push((
            tag.to_string(),
            repo.full_name().to_string(),
            meta.full_name().to_string(),
        ));

        if self.fail {
            Err(Error::Release(format!("Release of {} failed", tag)))
        } else {
            Ok(())
        }
    }
}

/// A bootstrapped context over fakes in a temporary working directory
pub struct TestContext {
    /// Working directory; removed on drop
    pub dir: TempDir,
    /// The context handlers see
    pub ctx: Arc<AppContext>,
    /// Factory that built the registry
    pub factory: Arc<FakeFactory>,
    /// Finalizer wired into the context
    pub finalizer: Arc<FakeFinalizer>,
}

impl TestContext {
    /// Context tracking `repos` with meta repository `org/meta`
    pub fn new(repos: &[&str], finalizer: FakeFinalizer) -> Self {
        Self::build(repos, finalizer, FakeFactory::default(), |_| {})
    }

    /// Context with a custom factory and config tweaks
    pub fn build(
        repos: &[&str],
        finalizer: FakeFinalizer,
        factory: FakeFactory,
        configure: impl FnOnce(&mut Config),
    ) -> Self {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let mut config = Config::new(dir.path().join("work"), "org/meta");
        config.api_key = "test-token".to_string();
        config.lock_timeout = Duration::from_secs(5);
        config.repos = repos.iter().map(|name| RepoConfig::new(*name)).collect();
        configure(&mut config);

        prepare_working_dir(&config).unwrap_or_else(|e| panic!("working dir: {e}"));
        let factory = Arc::new(factory);
        let finalizer = Arc::new(finalizer);
        let registry = RepoRegistry::build(&config, factory.as_ref())
            .unwrap_or_else(|e| panic!("registry: {e}"));
        let ctx = Arc::new(AppContext::new(
            config,
            registry,
            Arc::clone(&finalizer) as Arc<dyn ReleaseFinalizer>,
        ));

        Self {
            dir,
            ctx,
            factory,
            finalizer,
        }
    }

    /// The fake meta repository
    pub fn meta(&self) -> Arc<FakeRepository> {
        self.repo(&self.ctx.config().meta_repo)
    }

    /// The fake for a tracked repository
    pub fn repo(&self, full_name: &str) -> Arc<FakeRepository> {
        self.factory
            .repo(full_name)
            .unwrap_or_else(|| panic!("no fake repository {full_name}"))
    }
}
