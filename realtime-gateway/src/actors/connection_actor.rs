// realtime-gateway/src/actors/connection_actor.rs
use actix::{Actor, ActorContext, ActorFutureExt, AsyncContext, Handler, StreamHandler, WrapFuture};
use actix_web::web;
use actix_web_actors::ws;
use common::{ConnectionContext, GatewayError, HeartbeatConfig, ServerMessage, SessionIdentifier, StreamRequest};
use std::time::Instant;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::authorizer::{AuthState, ConnectionAuthorizer, HandshakeFlow};
use crate::registry::ConnectionRegistry;
use crate::router::EventRouter;

/// Actor managing one gateway WebSocket connection
pub struct ConnectionActor {
    connection_id: Uuid,
    flow: HandshakeFlow,
    // Taken when the store lookup is spawned
    session_id: Option<SessionIdentifier>,
    authorizer: web::Data<ConnectionAuthorizer>,
    registry: web::Data<ConnectionRegistry>,
    router: web::Data<EventRouter>,
    heartbeat: HeartbeatConfig,
    last_heartbeat: Instant,
    // Whether this actor owns its registry slot
    registered: bool,
    streams: Vec<JoinHandle<()>>,
}

impl ConnectionActor {
    /// `flow` must already be verifying, with `session_id` recovered from the cookie
    pub fn new(
        flow: HandshakeFlow,
        session_id: SessionIdentifier,
        authorizer: web::Data<ConnectionAuthorizer>,
        registry: web::Data<ConnectionRegistry>,
        router: web::Data<EventRouter>,
        heartbeat: HeartbeatConfig,
    ) -> Self {
        Self {
            connection_id: flow.connection_id(),
            flow,
            session_id: Some(session_id),
            authorizer,
            registry,
            router,
            heartbeat,
            last_heartbeat: Instant::now(),
            registered: false,
            streams: Vec::new(),
        }
    }

    // Heartbeat with timeout detection
    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.heartbeat.interval(), |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > act.heartbeat.timeout() {
                tracing::warn!("Heartbeat timeout for connection {}", act.connection_id);
                ctx.stop();
                return;
            }

            ctx.ping(b"");
        });
    }

    // Runs the store lookup without blocking the actor; dropped if the actor stops first
    fn start_verification(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let session_id = match self.session_id.take() {
            Some(session_id) => session_id,
            None => return,
        };

        let authorizer = self.authorizer.clone();
        let connection_id = self.connection_id;

        let lookup = async move { authorizer.resolve(connection_id, session_id).await };

        ctx.spawn(lookup.into_actor(self).map(|outcome, act, ctx| {
            act.finish_verification(outcome, ctx);
        }));
    }

    fn finish_verification(
        &mut self,
        outcome: Result<ConnectionContext, GatewayError>,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        match self.flow.settle(outcome, &self.registry) {
            Ok(context) => {
                tracing::info!("Connection {} authorized (user {:?})", self.connection_id, context.user_id);
                tracing::debug!("Connection {} bound to session {}", self.connection_id, context.session_id);
                self.send(ServerMessage::Ready { connection_id: self.connection_id }, ctx);
            }
            Err(GatewayError::DecisionFinal) => {
                tracing::debug!("Discarding stale lookup result for connection {}", self.connection_id);
            }
            Err(e) => {
                tracing::info!("Connection {} rejected: {}", self.connection_id, e);
                ctx.close(Some(ws::CloseReason {
                    code: ws::CloseCode::Policy,
                    description: Some(e.client_reason()),
                }));
                ctx.stop();
            }
        }
    }

    fn handle_request(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let request: StreamRequest = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Malformed message from connection {}: {}", self.connection_id, e);
                if self.flow.state() == AuthState::Authorized {
                    self.send(
                        ServerMessage::Error {
                            event: None,
                            id: None,
                            message: "malformed message".to_string(),
                        },
                        ctx,
                    );
                }
                return;
            }
        };

        let sink = ctx.address().recipient::<ServerMessage>();
        let event = request.event.clone();
        let id = request.id.clone();

        match self.router.dispatch(self.connection_id, request, sink) {
            Ok(handle) => {
                self.streams.retain(|stream| !stream.is_finished());
                self.streams.push(handle);
            }
            Err(GatewayError::UnauthorizedDispatch) => {
                tracing::debug!("Dropping '{}' from unauthorized connection {}", event, self.connection_id);
            }
            Err(e) => {
                tracing::warn!("Connection {}: {}", self.connection_id, e);
                self.send(
                    ServerMessage::Error {
                        event: Some(event),
                        id,
                        message: e.to_string(),
                    },
                    ctx,
                );
            }
        }
    }

    fn send(&self, message: ServerMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match serde_json::to_string(&message) {
            Ok(json) => ctx.text(json),
            Err(e) => tracing::error!("Failed to serialize message for {}: {}", self.connection_id, e),
        }
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("Connection opened: {}", self.connection_id);

        if !self.registry.open(self.connection_id) {
            tracing::error!("Duplicate connection id {}, closing", self.connection_id);
            ctx.stop();
            return;
        }
        self.registered = true;

        self.last_heartbeat = Instant::now();
        self.start_heartbeat(ctx);
        self.start_verification(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Connection closed: {}", self.connection_id);

        if self.registered {
            self.registry.remove(&self.connection_id);
        }

        for stream in self.streams.drain(..) {
            stream.abort();
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&msg);
            },
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            },
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();
                self.handle_request(&text, ctx);
            },
            Ok(ws::Message::Close(reason)) => {
                tracing::info!("Connection {} closing: {:?}", self.connection_id, reason);
                ctx.close(reason);
                ctx.stop();
            },
            Err(e) => {
                tracing::warn!("Protocol error on connection {}: {}", self.connection_id, e);
                ctx.stop();
            },
            _ => (),
        }
    }
}

impl Handler<ServerMessage> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, msg: ServerMessage, ctx: &mut Self::Context) -> Self::Result {
        self.send(msg, ctx);
    }
}

