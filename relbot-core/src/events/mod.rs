//! Webhook event dispatch
//!
//! The [`EventRouter`] maps a GitHub event type (the `X-GitHub-Event`
//! header) to exactly one [`EventHandler`]. Handlers receive the shared
//! [`AppContext`] explicitly and decide from the payload alone whether to do
//! anything.
//!
//! | Event | Handler |
//! |-------|---------|
//! | `push` | [`PushHandler`] - logs only |
//! | `create` | [`CreateHandler`] - tag → release finalizer |
//! | `pull_request` | [`PullRequestHandler`] - bump PR closed → branch cleanup |
//! | `pull_request_review` | [`ReviewHandler`] - no-op |

mod handlers;
pub mod payload;
mod router;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::bootstrap::AppContext;
use crate::Result;

pub use handlers::{cleanup_bump_branch, CreateHandler, PullRequestHandler, PushHandler, ReviewHandler};
pub use router::EventRouter;

/// What a handler did with an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The handler performed its side effects
    Handled,
    /// Nothing to do; the reason is for logs
    Ignored(String),
}

impl Outcome {
    /// An ignored outcome with a reason
    pub fn ignored(reason: impl Into<String>) -> Self {
        Outcome::Ignored(reason.into())
    }

    /// Short label for responses
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Handled => "handled",
            Outcome::Ignored(_) => "ignored",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Handled => f.write_str("handled"),
            Outcome::Ignored(reason) => write!(f, "ignored ({})", reason),
        }
    }
}

/// Handler for one webhook event type
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// React to one delivery
    async fn handle(&self, ctx: &AppContext, payload: &Value) -> Result<Outcome>;
}
