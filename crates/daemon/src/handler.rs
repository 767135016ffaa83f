// Default item handler for the standalone daemon
//
// Embedders inject their own `ItemHandler`; the daemon on its own just
// records what it drains so the queue can be observed end to end.

use async_trait::async_trait;
use hookline_core::domain::QueueItem;
use hookline_core::port::{HandlerError, ItemHandler};
use tracing::info;

/// Logs every item and accepts it.
///
/// Payloads must be JSON objects or arrays; scalars are rejected so that
/// malformed deliveries land in the dead-letter store for inspection.
pub struct LoggingHandler;

#[async_trait]
impl ItemHandler for LoggingHandler {
    async fn handle(&self, item: &QueueItem) -> Result<(), HandlerError> {
        if !(item.payload.is_object() || item.payload.is_array()) {
            return Err(HandlerError::new(format!(
                "payload must be a JSON object or array, got {}",
                kind(&item.payload)
            ))
            .with_frame(format!("source: {}", item.source)));
        }

        info!(
            item_id = %item.id,
            source = %item.source,
            enqueued_at = item.enqueued_at,
            "Item drained"
        );
        Ok(())
    }
}

fn kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_accepts_objects_and_arrays() {
        let handler = LoggingHandler;
        assert!(handler
            .handle(&QueueItem::new_test("github", json!({"action": "opened"})))
            .await
            .is_ok());
        assert!(handler
            .handle(&QueueItem::new_test("github", json!([1, 2])))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_rejects_scalars_with_context() {
        let err = LoggingHandler
            .handle(&QueueItem::new_test("stripe", json!("oops")))
            .await
            .unwrap_err();

        assert_eq!(err.message, "payload must be a JSON object or array, got string");
        assert_eq!(err.context, vec!["source: stripe".to_string()]);
    }
}
