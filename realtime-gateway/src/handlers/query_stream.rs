// realtime-gateway/src/handlers/query_stream.rs
use chrono::Utc;
use common::ConnectionContext;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;

use super::{EventHandler, HandlerError, ResultStream};

const DEFAULT_INTERVAL_MS: u64 = 1000;
const MIN_INTERVAL_MS: u64 = 1;

#[derive(Debug, Deserialize)]
struct QueryPayload {
    q: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    interval_ms: Option<u64>,
}

/// Streams results for a query until the client goes away or `limit` is reached
pub struct QueryStreamHandler {
    default_interval: Duration,
}

impl Default for QueryStreamHandler {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_INTERVAL_MS))
    }
}

impl QueryStreamHandler {
    pub fn new(default_interval: Duration) -> Self {
        Self { default_interval }
    }
}

impl EventHandler for QueryStreamHandler {
    fn handle(&self, payload: Value, context: Arc<ConnectionContext>) -> ResultStream {
        let query: QueryPayload = match serde_json::from_value(payload) {
            Ok(query) => query,
            Err(e) => {
                return stream::once(async move { Err(HandlerError::InvalidPayload(e.to_string())) })
                    .boxed();
            }
        };

        let interval = query
            .interval_ms
            .map(|ms| Duration::from_millis(ms.max(MIN_INTERVAL_MS)))
            .unwrap_or(self.default_interval);

        tracing::debug!(
            "Starting query stream '{}' for connection {}",
            query.q,
            context.connection_id
        );

        let user_id = context.user_id.clone().unwrap_or(Value::Null);
        let q = query.q;

        let results = IntervalStream::new(tokio::time::interval(interval))
            .enumerate()
            .map(move |(seq, _)| {
                Ok::<_, HandlerError>(json!({
                    "query": q,
                    "seq": seq,
                    "userId": user_id,
                    "emittedAt": Utc::now().to_rfc3339(),
                }))
            });

        match query.limit {
            Some(limit) => results.take(limit).boxed(),
            None => results.boxed(),
        }
    }
}
