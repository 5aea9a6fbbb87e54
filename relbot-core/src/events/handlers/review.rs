//! `pull_request_review` events

use async_trait::async_trait;
use serde_json::Value;

use crate::bootstrap::AppContext;
use crate::events::{EventHandler, Outcome};
use crate::Result;

/// Accepts reviews and does nothing with them
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewHandler;

#[async_trait]
impl EventHandler for ReviewHandler {
    async fn handle(&self, _ctx: &AppContext, _payload: &Value) -> Result<Outcome> {
        Ok(Outcome::ignored("reviews are not acted on"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeFinalizer, TestContext};
    use serde_json::json;

    #[tokio::test]
    async fn test_review_is_a_no_op() {
        let test = TestContext::new(&[], FakeFinalizer::default());
        let outcome = ReviewHandler
            .handle(&test.ctx, &json!({"action": "submitted"}))
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Ignored(_)));
        assert!(ReviewHandler.handle(&test.ctx, &json!(null)).await.is_ok());
        assert!(test.meta().calls().is_empty());
    }
}
