//! Configuration management for relbot
//!
//! Configuration is loaded once at startup with the following priority
//! (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (GITHUB_TOKEN, RELBOT_*)
//! 3. Config file (`--config`, or ~/.config/relbot/config.toml)
//!
//! It is immutable after bootstrap.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default title of the automated meta-repository bump PR
pub const DEFAULT_BUMP_TITLE: &str = "Bump Meta";

/// Default branch used to stage the bump PR
pub const DEFAULT_BUMP_BRANCH: &str = "bump_meta";

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Meta-repository bump PR settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BumpConfig {
    /// File in the meta repository holding `package==version` pins.
    /// Bump PRs are only opened when this is set.
    pub pin_file: Option<PathBuf>,

    /// Exact title identifying the bump PR
    pub title: String,

    /// Branch the bump is staged on
    pub branch: String,
}

impl Default for BumpConfig {
    fn default() -> Self {
        Self {
            pin_file: None,
            title: DEFAULT_BUMP_TITLE.to_string(),
            branch: DEFAULT_BUMP_BRANCH.to_string(),
        }
    }
}

/// A tracked component repository
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepoConfig {
    /// Full name, `owner/name`
    pub name: String,

    /// Package name pinned in the meta repository's pin file
    #[serde(default)]
    pub package: Option<String>,

    /// Create a `stable/X.Y` branch when `X.Y.0` is tagged
    #[serde(default)]
    pub branch_on_release: bool,
}

impl RepoConfig {
    /// Descriptor with only a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: None,
            branch_on_release: false,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Directory holding clones and the lock directory
    pub working_dir: PathBuf,

    /// GitHub token
    #[serde(default)]
    pub api_key: String,

    /// Full name of the meta repository
    pub meta_repo: String,

    /// Tracked component repositories
    #[serde(default)]
    pub repos: Vec<RepoConfig>,

    /// How long to wait for a repository lock before giving up
    #[serde(default = "default_lock_timeout", with = "humantime_serde")]
    pub lock_timeout: Duration,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Bump PR settings
    #[serde(default)]
    pub bump: BumpConfig,
}

fn default_lock_timeout() -> Duration {
    Duration::from_secs(300)
}

impl Config {
    /// Minimal configuration, mostly useful for tests
    pub fn new(working_dir: impl Into<PathBuf>, meta_repo: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            api_key: String::new(),
            meta_repo: meta_repo.into(),
            repos: Vec::new(),
            lock_timeout: default_lock_timeout(),
            server: ServerConfig::default(),
            bump: BumpConfig::default(),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&contents)
    }

    /// Parse configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/relbot/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("relbot").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - GITHUB_TOKEN: API credential
    /// - RELBOT_WORKING_DIR: working directory
    /// - RELBOT_BIND: server listen address
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            let token = token.trim();
            if !token.is_empty() {
                self.api_key = token.to_string();
            }
        }

        if let Ok(dir) = std::env::var("RELBOT_WORKING_DIR") {
            self.working_dir = PathBuf::from(dir);
        }

        if let Ok(bind) = std::env::var("RELBOT_BIND") {
            self.server.bind = bind;
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, bind: Option<String>) -> Self {
        if let Some(bind) = bind {
            self.server.bind = bind;
        }
        self
    }

    /// Load, override and validate in one go
    ///
    /// Priority: CLI > env > config file
    pub fn load_with_overrides(path: &Path, bind: Option<String>) -> Result<Self> {
        let config = Self::load_from_file(path)?
            .with_env_overrides()
            .with_cli_overrides(bind);
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config(
                "No API key configured. Set api_key or GITHUB_TOKEN".to_string(),
            ));
        }

        check_full_name(&self.meta_repo, "meta_repo")?;

        let mut seen = HashSet::new();
        for repo in &self.repos {
            check_full_name(&repo.name, "repos.name")?;
            if !seen.insert(repo.name.as_str()) {
                return Err(Error::Config(format!(
                    "Repository {} is listed more than once",
                    repo.name
                )));
            }
        }

        if self.bump.title.is_empty() || self.bump.branch.is_empty() {
            return Err(Error::Config(
                "bump.title and bump.branch must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Directory holding per-repository lock files
    pub fn lock_dir(&self) -> PathBuf {
        self.working_dir.join("lock")
    }

    /// Look up a tracked repository descriptor
    pub fn repo(&self, full_name: &str) -> Option<&RepoConfig> {
        self.repos.iter().find(|r| r.name == full_name)
    }
}

fn check_full_name(name: &str, field: &str) -> Result<()> {
    match name.split_once('/') {
        Some((owner, repo))
            if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
        {
            Ok(())
        }
        _ => Err(Error::Config(format!(
            "Invalid {} '{}'. Expected owner/name",
            field, name
        ))),
    }
}
