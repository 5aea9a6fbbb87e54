//! `push` events: logged, nothing else yet

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::bootstrap::AppContext;
use crate::events::payload::string_at;
use crate::events::{EventHandler, Outcome};
use crate::Result;

/// Logs pushes; never fails, whatever the payload looks like
#[derive(Debug, Clone, Copy, Default)]
pub struct PushHandler;

#[async_trait]
impl EventHandler for PushHandler {
    async fn handle(&self, _ctx: &AppContext, payload: &Value) -> Result<Outcome> {
        let repo = string_at(payload, "/repository/full_name").unwrap_or("<unknown>");
        let head = string_at(payload, "/after").unwrap_or("<unknown>");

        debug!(repo = %repo, head = %head, "Received push");

        Ok(Outcome::ignored("push events are not acted on"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeFinalizer, TestContext};
    use serde_json::json;

    #[tokio::test]
    async fn test_push_never_fails() {
        let test = TestContext::new(&["org/repo"], FakeFinalizer::default());

        for payload in [
            json!({"repository": {"full_name": "org/repo"}, "after": "abc123"}),
            json!({}),
            json!("not even an object"),
        ] {
            let outcome = PushHandler.handle(&test.ctx, &payload).await.unwrap();
            assert!(matches!(outcome, Outcome::Ignored(_)));
        }

        assert!(test.repo("org/repo").calls().is_empty());
        assert!(test.finalizer.calls().is_empty());
    }
}
