// realtime-gateway/src/handlers/mod.rs
use common::ConnectionContext;
use futures::stream::BoxStream;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

pub mod query_stream;

pub use query_stream::QueryStreamHandler;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Results produced for one event, in emission order
pub type ResultStream = BoxStream<'static, Result<Value, HandlerError>>;

/// Produces the results for one named event.
///
/// Each call starts a fresh stream; nothing is shared between invocations except
/// what the handler itself holds.
pub trait EventHandler: Send + Sync {
    fn handle(&self, payload: Value, context: Arc<ConnectionContext>) -> ResultStream;
}
