//! `pull_request` events: clean up after a merged or closed bump PR

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::bootstrap::AppContext;
use crate::events::payload::{parse, PullRequestEvent};
use crate::events::{EventHandler, Outcome};
use crate::lock::LockManager;
use crate::repository::Repository;
use crate::{Error, Result};

/// Removes the bump branch once its pull request is closed
#[derive(Debug, Clone, Copy, Default)]
pub struct PullRequestHandler;

#[async_trait]
impl EventHandler for PullRequestHandler {
    async fn handle(&self, ctx: &AppContext, payload: &Value) -> Result<Outcome> {
        let event: PullRequestEvent = parse("pull_request", payload)?;

        if event.action != "closed" {
            return Ok(Outcome::ignored(format!("action {}", event.action)));
        }

        let repo_name = event
            .repository_name()
            .ok_or_else(|| Error::malformed("pull_request", "no repository in payload"))?;

        let config = ctx.config();
        if repo_name != config.meta_repo {
            debug!(repo = %repo_name, "Closed pull request outside the meta repository");
            return Ok(Outcome::ignored(format!("{} is not the meta repository", repo_name)));
        }
        if event.pull_request.title != config.bump.title {
            debug!(title = %event.pull_request.title, "Closed pull request is not a bump");
            return Ok(Outcome::ignored("not a bump pull request"));
        }

        info!(repo = %repo_name, branch = %config.bump.branch, "Bump pull request closed, cleaning up");
        cleanup_bump_branch(ctx.locks(), ctx.registry().meta().as_ref(), &config.bump.branch).await?;

        Ok(Outcome::Handled)
    }
}

/// Delete `branch` remotely, return the clone to its default branch and
/// delete `branch` locally
///
/// Runs under the meta repository's lock and stops at the first failure.
/// The lock is released either way.
pub async fn cleanup_bump_branch(
    locks: &LockManager,
    meta: &dyn Repository,
    branch: &str,
) -> Result<()> {
    let _guard = locks.acquire(meta.full_name()).await?;

    meta.delete_remote_branch(branch).await?;
    let default_branch = meta.checkout_default_branch().await?;
    meta.delete_local_branch(branch).await?;

    debug!(
        repo = %meta.full_name(),
        branch = %branch,
        default_branch = %default_branch,
        "Removed bump branch"
    );
    Ok(())
}
