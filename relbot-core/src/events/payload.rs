//! Webhook payload shapes
//!
//! Only the fields relbot reads are modelled; everything else in the
//! GitHub payload is ignored.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

/// `repository` object
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryRef {
    /// `owner/name`
    pub full_name: String,
}

/// `create` event
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEvent {
    /// Name of the created branch or tag
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// `tag` or `branch`
    pub ref_type: String,
    /// Repository the ref was created in
    pub repository: RepositoryRef,
}

impl CreateEvent {
    /// Whether the created ref is a tag
    pub fn is_tag(&self) -> bool {
        self.ref_type == "tag"
    }
}

/// `pull_request` event
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    /// `opened`, `closed`, `synchronize`, ...
    pub action: String,
    /// The pull request itself
    pub pull_request: PullRequestInfo,
    /// Repository the event was delivered for
    #[serde(default)]
    pub repository: Option<RepositoryRef>,
}

/// `pull_request` object
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestInfo {
    /// PR title
    pub title: String,
    /// Repository, when the payload carries it directly
    #[serde(default)]
    pub repo: Option<RepositoryRef>,
    /// Base branch, whose `repo` is where GitHub puts the target repository
    #[serde(default)]
    pub base: Option<BaseRef>,
}

/// `pull_request.base` object
#[derive(Debug, Clone, Deserialize)]
pub struct BaseRef {
    /// Target repository
    #[serde(default)]
    pub repo: Option<RepositoryRef>,
}

impl PullRequestEvent {
    /// Repository the pull request targets
    ///
    /// Checks `pull_request.repo`, then `pull_request.base.repo`, then the
    /// top-level `repository`.
    pub fn repository_name(&self) -> Option<&str> {
        self.pull_request
            .repo
            .as_ref()
            .or_else(|| self.pull_request.base.as_ref().and_then(|b| b.repo.as_ref()))
            .or(self.repository.as_ref())
            .map(|r| r.full_name.as_str())
    }
}

/// Deserialize a payload, reporting shape problems as malformed payloads
pub fn parse<T: DeserializeOwned>(event: &str, payload: &Value) -> Result<T> {
    T::deserialize(payload).map_err(|e| Error::malformed(event, e.to_string()))
}

/// Read a string at a JSON pointer, for handlers that tolerate missing fields
pub fn string_at<'a>(payload: &'a Value, pointer: &str) -> Option<&'a str> {
    payload.pointer(pointer).and_then(Value::as_str)
}
