// Item Handler Port
// The per-item processing step, injected by the owning subsystem

use crate::domain::QueueItem;
use async_trait::async_trait;
use thiserror::Error;

/// A single item's processing failure.
///
/// Contained per item: the worker routes it to the dead-letter store and
/// moves on to the next item.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
    /// Innermost-last chain of causes or frames (bounded when stored)
    pub context: Vec<String>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
        }
    }

    /// Append one context frame
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.context.push(frame.into());
        self
    }

    /// Build from any error; its `source()` chain becomes the context
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut context = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            context.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: err.to_string(),
            context,
        }
    }
}

/// Per-item processing handler
#[async_trait]
pub trait ItemHandler: Send + Sync {
    /// Process one item. `Err` marks only this item as failed.
    async fn handle(&self, item: &QueueItem) -> Result<(), HandlerError>;
}

/// Adapter for synchronous closures
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&QueueItem) -> Result<(), HandlerError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> ItemHandler for FnHandler<F>
where
    F: Fn(&QueueItem) -> Result<(), HandlerError> + Send + Sync,
{
    async fn handle(&self, item: &QueueItem) -> Result<(), HandlerError> {
        (self.f)(item)
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Handler that fails or panics on chosen payloads and records the rest
    pub struct ScriptedHandler {
        failures: Vec<(serde_json::Value, String)>,
        panics: Vec<serde_json::Value>,
        handled: Mutex<Vec<QueueItem>>,
        calls: Mutex<usize>,
    }

    impl ScriptedHandler {
        pub fn new() -> Self {
            Self {
                failures: Vec::new(),
                panics: Vec::new(),
                handled: Mutex::new(Vec::new()),
                calls: Mutex::new(0),
            }
        }

        /// Fail with `message` whenever the payload equals `payload`
        pub fn failing_on(mut self, payload: serde_json::Value, message: impl Into<String>) -> Self {
            self.failures.push((payload, message.into()));
            self
        }

        /// Panic whenever the payload equals `payload`
        pub fn panicking_on(mut self, payload: serde_json::Value) -> Self {
            self.panics.push(payload);
            self
        }

        /// Payloads handled successfully, in call order
        pub fn handled_payloads(&self) -> Vec<serde_json::Value> {
            self.handled
                .lock()
                .unwrap()
                .iter()
                .map(|item| item.payload.clone())
                .collect()
        }

        pub fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl Default for ScriptedHandler {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ItemHandler for ScriptedHandler {
        async fn handle(&self, item: &QueueItem) -> Result<(), HandlerError> {
            *self.calls.lock().unwrap() += 1;

            if self.panics.contains(&item.payload) {
                panic!("scripted panic on {}", item.payload);
            }
            if let Some((_, message)) = self.failures.iter().find(|(p, _)| *p == item.payload) {
                return Err(HandlerError::new(message.clone()).with_frame(format!("item {}", item.id)));
            }

            self.handled.lock().unwrap().push(item.clone());
            Ok(())
        }
    }
}
