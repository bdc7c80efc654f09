// realtime-gateway/src/main.rs

mod actors;
mod authorizer;
mod handlers;
mod registry;
mod router;
mod routing;
mod store;

use actix_web::{web, App, HttpServer};
use authorizer::ConnectionAuthorizer;
use common::{setup_tracing, Config};
use handlers::QueryStreamHandler;
use registry::ConnectionRegistry;
use router::EventRouter;
use routing::routes;
use std::path::Path;
use std::sync::Arc;
use store::{MemorySessionStore, SessionStore};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Setup tracing
    setup_tracing();

    // Load configuration
    let config = Config::from_env();

    // Save address before moving config into web::Data
    let server_addr = config.gateway_addr.clone();

    // Session store shared with the HTTP subsystem
    let memory_store = MemorySessionStore::new();
    if let Some(seed_file) = &config.store.seed_file {
        match memory_store.load_seed_file(Path::new(seed_file)) {
            Ok(count) => tracing::info!("Loaded {} sessions from {}", count, seed_file),
            Err(e) => tracing::error!("Failed to load sessions from {}: {}", seed_file, e),
        }
    }
    let store: Arc<dyn SessionStore> = Arc::new(memory_store);

    // Secret and store are fixed before the first connection is accepted
    let authorizer = ConnectionAuthorizer::new(
        store,
        &config.session,
        config.store.lookup_timeout(),
    );

    let registry = web::Data::new(ConnectionRegistry::new());

    let router = EventRouter::new(registry.clone())
        .with_handler("queryStream", QueryStreamHandler::default());

    tracing::info!(
        "Starting gateway on {} (session cookie '{}', events: {:?})",
        server_addr,
        config.session.cookie_name,
        router.events().collect::<Vec<_>>()
    );

    // Create data references
    let config_data = web::Data::new(config);
    let authorizer_data = web::Data::new(authorizer);
    let router_data = web::Data::new(router);

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(config_data.clone())
            .app_data(authorizer_data.clone())
            .app_data(registry.clone())
            .app_data(router_data.clone())
            .configure(routes)
    })
    .bind(&server_addr)?
    .run()
    .await
}
