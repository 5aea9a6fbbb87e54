//! Release finalization
//!
//! [`ReleaseFinalizer`] is what the `create` handler calls when a tag lands
//! on a tracked repository. [`ReleaseProcess`] is the default pipeline:
//!
//! 1. sync the component clone and collect the commits since the last tag
//!    (under the component's lock)
//! 2. publish a GitHub release with those commits as notes
//! 3. cut `stable/X.Y` for `X.Y.0` tags when the repository asks for it
//! 4. pin the new version in the meta repository and open the bump PR
//!    (under the meta repository's lock)
//!
//! Nothing here deduplicates by tag. A redelivered `create` event runs the
//! pipeline again, so every step has to tolerate having already happened.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::config::Config;
use crate::lock::LockManager;
use crate::repository::{Repository, TagLog};
use crate::{Error, Result};

/// Turns a freshly created tag into a finished release
#[async_trait]
pub trait ReleaseFinalizer: Send + Sync {
    /// Run the release pipeline for `tag` on `repo`
    async fn finish_release(
        &self,
        tag: &str,
        repo: &dyn Repository,
        config: &Config,
        meta: &dyn Repository,
    ) -> Result<()>;
}

/// Default release pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseProcess;

impl ReleaseProcess {
    /// Create the pipeline
    pub fn new() -> Self {
        Self
    }

    async fn bump_meta(
        &self,
        locks: &LockManager,
        config: &Config,
        meta: &dyn Repository,
        package: &str,
        version: &str,
    ) -> Result<Option<u64>> {
        let Some(pin_file) = config.bump.pin_file.as_deref() else {
            return Ok(None);
        };
        let branch = config.bump.branch.as_str();

        let _guard = locks.acquire(meta.full_name()).await?;

        meta.sync_clone().await?;
        meta.start_local_branch(branch).await?;

        let path = meta.local_path().join(pin_file);
        let contents = tokio::fs::read_to_string(&path).await.map_err(|e| {
            Error::Release(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let updated = match bump_pin(&contents, package, version) {
            Some(updated) if updated != contents => updated,
            Some(_) => {
                info!(package = %package, version = %version, "Meta repository already pins this version");
                meta.checkout_default_branch().await?;
                return Ok(None);
            }
            None => {
                warn!(package = %package, file = %pin_file.display(), "No pin found in meta repository");
                meta.checkout_default_branch().await?;
                return Ok(None);
            }
        };

        tokio::fs::write(&path, updated).await.map_err(|e| {
            Error::Release(format!("Failed to write {}: {}", path.display(), e))
        })?;

        meta.commit_and_push(branch, &format!("Bump {} to {}", package, version))
            .await?;
        let number = meta
            .open_pull_request(
                &config.bump.title,
                branch,
                "Automated update of pinned component versions after a release.",
            )
            .await?;
        meta.checkout_default_branch().await?;

        Ok(Some(number))
    }
}

#[async_trait]
impl ReleaseFinalizer for ReleaseProcess {
    async fn finish_release(
        &self,
        tag: &str,
        repo: &dyn Repository,
        config: &Config,
        meta: &dyn Repository,
    ) -> Result<()> {
        info!(repo = %repo.full_name(), tag = %tag, "Finishing release");
        let locks = LockManager::from_config(config);

        let log = {
            let _guard = locks.acquire(repo.full_name()).await?;
            repo.sync_clone().await?;
            repo.tag_log(tag).await?
        };

        let notes = release_notes(&log, Utc::now().date_naive());
        repo.create_release(tag, tag, &notes).await?;

        let descriptor = config.repo(repo.full_name());

        if descriptor.is_some_and(|d| d.branch_on_release) {
            if let Some(branch) = stable_branch_for(tag) {
                info!(repo = %repo.full_name(), branch = %branch, "Creating stable branch");
                repo.create_remote_branch(&branch, tag).await?;
            }
        }

        if let Some(package) = descriptor.and_then(|d| d.package.as_deref()) {
            let version = release_version(tag);
            if let Some(number) = self.bump_meta(&locks, config, meta, package, version).await? {
                info!(pr = number, package = %package, version = %version, "Bump PR ready");
            }
        }

        Ok(())
    }
}

/// Tag name without a leading `v`
pub fn release_version(tag: &str) -> &str {
    tag.strip_prefix('v').unwrap_or(tag)
}

/// `stable/X.Y` for an `X.Y.0` release tag, `None` otherwise
pub fn stable_branch_for(tag: &str) -> Option<String> {
    let version = semver::Version::parse(release_version(tag)).ok()?;
    (version.patch == 0 && version.pre.is_empty())
        .then(|| format!("stable/{}.{}", version.major, version.minor))
}

/// Markdown release notes from the commits since the previous tag
pub fn release_notes(log: &TagLog, date: NaiveDate) -> String {
    let mut notes = match &log.previous {
        Some(previous) => format!("Released {}. Changes since {}:\n\n", date, previous),
        None => format!("Released {}. Initial release.\n\n", date),
    };

    for subject in &log.subjects {
        notes.push_str("- ");
        notes.push_str(subject);
        notes.push('\n');
    }

    notes
}

/// Rewrite every `package==<version>` pin in `contents` to `version`
///
/// Returns `None` if the package is not pinned. Matches only whole package
/// names, so `foo` does not touch `my-foo==1.0`.
pub fn bump_pin(contents: &str, package: &str, version: &str) -> Option<String> {
    let needle = format!("{}==", package);
    let mut out = String::with_capacity(contents.len());
    let mut rest = contents;
    let mut found = false;

    while let Some(pos) = rest.find(&needle) {
        let preceded_by_name_char = rest[..pos]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'));

        let after = pos + needle.len();
        out.push_str(&rest[..after]);
        rest = &rest[after..];

        if preceded_by_name_char {
            continue;
        }

        let end = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | ',' | ';' | ')' | ']'))
            .unwrap_or(rest.len());
        out.push_str(version);
        rest = &rest[end..];
        found = true;
    }

    out.push_str(rest);
    found.then_some(out)
}
