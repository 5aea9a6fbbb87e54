//! `create` events: a new tag on a tracked repository starts a release

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::bootstrap::AppContext;
use crate::events::payload::{parse, CreateEvent};
use crate::events::{EventHandler, Outcome};
use crate::Result;

/// Hands new tags to the release finalizer
///
/// The finalizer is called at most once per delivery. Redelivered events
/// are not deduplicated.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateHandler;

#[async_trait]
impl EventHandler for CreateHandler {
    async fn handle(&self, ctx: &AppContext, payload: &Value) -> Result<Outcome> {
        let event: CreateEvent = parse("create", payload)?;

        if !event.is_tag() {
            return Ok(Outcome::ignored(format!("created a {}", event.ref_type)));
        }

        let tag = event.git_ref.as_str();
        let repo_name = event.repository.full_name.as_str();

        let Some(repo) = ctx.registry().get(repo_name) else {
            warn!(
                repo = %repo_name,
                tag = %tag,
                "Received tag for a repository that is not configured"
            );
            return Ok(Outcome::ignored(format!("{} is not tracked", repo_name)));
        };

        info!(repo = %repo_name, tag = %tag, "New release tag");
        ctx.finalizer()
            .finish_release(
                tag,
                repo.as_ref(),
                ctx.config(),
                ctx.registry().meta().as_ref(),
            )
            .await?;

        Ok(Outcome::Handled)
    }
}
