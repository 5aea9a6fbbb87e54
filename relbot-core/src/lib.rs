//! Relbot Core - webhook handling and release automation
//!
//! This crate holds everything relbot does that is not HTTP: configuration,
//! the repository registry, named cross-process locks, webhook event
//! dispatch and the release pipeline. The GitHub-backed [`Repository`]
//! implementation lives in `relbot-github`; the server in `relbot-server`.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod events;
pub mod git;
pub mod lock;
pub mod registry;
pub mod release;
pub mod repository;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use bootstrap::{prepare_working_dir, AppContext, Bootstrap, ConfigSource};
pub use config::{BumpConfig, Config, RepoConfig, ServerConfig};
pub use error::{Error, Result};
pub use events::{EventHandler, EventRouter, Outcome};
pub use git::GitRepo;
pub use lock::{LockGuard, LockManager};
pub use registry::RepoRegistry;
pub use release::{ReleaseFinalizer, ReleaseProcess};
pub use repository::{Repository, RepositoryFactory, TagLog};
