// realtime-gateway/src/routing.rs
use actix_web::{web, HttpRequest, HttpResponse, Error};
use actix_web_actors::ws;
use common::{Config, GatewayError};
use serde_json::json;
use uuid::Uuid;

use crate::actors::connection_actor::ConnectionActor;
use crate::authorizer::{ConnectionAuthorizer, Handshake, HandshakeFlow};
use crate::registry::ConnectionRegistry;
use crate::router::EventRouter;

/// Configure routes for the gateway
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/ws")
            .route(web::get().to(gateway_ws_route))
    ).service(
        web::resource("/health")
            .route(web::get().to(health))
    );
}

/// WebSocket route for session-authenticated clients
async fn gateway_ws_route(
    req: HttpRequest,
    stream: web::Payload,
    authorizer: web::Data<ConnectionAuthorizer>,
    registry: web::Data<ConnectionRegistry>,
    router: web::Data<EventRouter>,
    config: web::Data<Config>,
) -> Result<HttpResponse, Error> {
    // Handshake is captured per connection and never shared
    let handshake = Handshake::from_request(&req);

    // Connection ids are assigned here, never taken from the client
    let mut flow = HandshakeFlow::new(Uuid::new_v4());

    let session_id = match flow.begin(&authorizer, &handshake) {
        Ok(session_id) => session_id,
        Err(GatewayError::MissingCredential) => {
            return Ok(HttpResponse::Unauthorized().json(json!({
                "error": "missing session cookie"
            })));
        },
        Err(e) => {
            return Ok(HttpResponse::Unauthorized().json(json!({
                "error": e.client_reason()
            })));
        },
    };

    let actor = ConnectionActor::new(
        flow,
        session_id,
        authorizer,
        registry,
        router,
        config.heartbeat.clone(),
    );

    ws::start(actor, &req, stream)
}

async fn health(registry: web::Data<ConnectionRegistry>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "connections": registry.len(),
        "authorized": registry.authorized_count(),
    }))
}
