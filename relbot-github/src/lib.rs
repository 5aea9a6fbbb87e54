//! Relbot GitHub - GitHub-backed repository handles
//!
//! [`GitHubRepoFactory`] is the [`relbot_core::RepositoryFactory`] the
//! server bootstraps with. Each [`GitHubRepo`] talks to the REST API through
//! octocrab and keeps a clone under the configured working directory.

mod client;
mod error;
mod repo;

pub use client::{parse_github_url, GitHubClient};
pub use error::{Error, Result};
pub use repo::{GitHubRepo, GitHubRepoFactory};
