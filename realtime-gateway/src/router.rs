// realtime-gateway/src/router.rs
use actix::prelude::SendError;
use actix::Recipient;
use actix_web::web;
use common::{GatewayError, ServerMessage, StreamRequest};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::handlers::EventHandler;
use crate::registry::ConnectionRegistry;

/// Where a dispatched stream sends its results
pub trait ResultSink: 'static {
    /// Deliver one message. Returns false once the connection is gone.
    fn emit(&self, message: ServerMessage) -> bool;
}

impl ResultSink for Recipient<ServerMessage> {
    fn emit(&self, message: ServerMessage) -> bool {
        match self.try_send(message) {
            Ok(()) => true,
            // No backpressure beyond the transport: a full mailbox still takes the message
            Err(SendError::Full(message)) => {
                self.do_send(message);
                true
            }
            Err(SendError::Closed(_)) => false,
        }
    }
}

impl ResultSink for UnboundedSender<ServerMessage> {
    fn emit(&self, message: ServerMessage) -> bool {
        self.send(message).is_ok()
    }
}

/// Routes named events from authorized connections to stream handlers
pub struct EventRouter {
    registry: web::Data<ConnectionRegistry>,
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl EventRouter {
    pub fn new(registry: web::Data<ConnectionRegistry>) -> Self {
        Self {
            registry,
            handlers: HashMap::new(),
        }
    }

    pub fn with_handler(mut self, event: impl Into<String>, handler: impl EventHandler + 'static) -> Self {
        self.handlers.insert(event.into(), Arc::new(handler));
        self
    }

    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Start the handler for `request` and forward its results to `sink`.
    ///
    /// Events from connections without a context never reach a handler. The returned
    /// handle lets the connection abort the stream when it closes.
    pub fn dispatch<S: ResultSink>(
        &self,
        connection_id: Uuid,
        request: StreamRequest,
        sink: S,
    ) -> Result<JoinHandle<()>, GatewayError> {
        let context = self
            .registry
            .get(&connection_id)
            .ok_or(GatewayError::UnauthorizedDispatch)?;

        let handler = self
            .handlers
            .get(&request.event)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownEvent(request.event.clone()))?;

        tracing::info!("Dispatching '{}' for connection {}", request.event, connection_id);

        let StreamRequest { event, payload, id } = request;
        let mut results = handler.handle(payload, context);

        Ok(actix_web::rt::spawn(async move {
            while let Some(result) = results.next().await {
                let message = match result {
                    Ok(data) => ServerMessage::Data {
                        event: event.clone(),
                        id: id.clone(),
                        data,
                    },
                    Err(e) => {
                        tracing::warn!("Stream '{}' failed for connection {}: {}", event, connection_id, e);
                        sink.emit(ServerMessage::Error {
                            event: Some(event),
                            id,
                            message: e.to_string(),
                        });
                        return;
                    }
                };

                if !sink.emit(message) {
                    tracing::debug!("Connection {} gone, stopping stream '{}'", connection_id, event);
                    return;
                }
            }

            sink.emit(ServerMessage::End { event, id });
        }))
    }
}
