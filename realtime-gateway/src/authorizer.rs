// realtime-gateway/src/authorizer.rs
use actix_web::http::header;
use actix_web::HttpRequest;
use common::cookies::parse_cookie_header;
use common::signature::verify_signed_cookie;
use common::{ConnectionContext, GatewayError, SessionConfig, SessionIdentifier, StoreError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::registry::ConnectionRegistry;
use crate::store::SessionStore;

/// Header data captured from one connection's upgrade request
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    cookie_header: Option<String>,
}

impl Handshake {
    pub fn new(cookie_header: Option<String>) -> Self {
        Self { cookie_header }
    }

    pub fn from_request(req: &HttpRequest) -> Self {
        // Multiple Cookie headers are joined the same way HTTP/2 splits them
        let values: Vec<&str> = req
            .headers()
            .get_all(header::COOKIE)
            .filter_map(|value| value.to_str().ok())
            .collect();

        if values.is_empty() {
            Self::new(None)
        } else {
            Self::new(Some(values.join("; ")))
        }
    }

    pub fn cookie_header(&self) -> Option<&str> {
        self.cookie_header.as_deref()
    }
}

/// Decides whether a connection may be admitted, based on its session cookie
pub struct ConnectionAuthorizer {
    store: Arc<dyn SessionStore>,
    cookie_name: String,
    secret: String,
    lookup_timeout: Duration,
}

impl ConnectionAuthorizer {
    pub fn new(store: Arc<dyn SessionStore>, session: &SessionConfig, lookup_timeout: Duration) -> Self {
        Self {
            store,
            cookie_name: session.cookie_name.clone(),
            secret: session.secret.clone(),
            lookup_timeout,
        }
    }

    /// Recover the session identifier from the handshake without touching the store
    pub fn extract_session_id(&self, handshake: &Handshake) -> Result<SessionIdentifier, GatewayError> {
        let header = handshake
            .cookie_header()
            .ok_or(GatewayError::MissingCredential)?;

        let jar = parse_cookie_header(Some(header));
        let raw = jar
            .get(&self.cookie_name)
            .ok_or(GatewayError::MissingCredential)?;

        Ok(verify_signed_cookie(raw, &self.secret)?)
    }

    /// Look the session up and build the connection's context.
    ///
    /// Only a present, unexpired record yields a context; an empty lookup is a rejection.
    pub async fn resolve(
        &self,
        connection_id: Uuid,
        session_id: SessionIdentifier,
    ) -> Result<ConnectionContext, GatewayError> {
        let lookup = tokio::time::timeout(self.lookup_timeout, self.store.get(&session_id));

        let record = match lookup.await {
            Ok(Ok(Some(record))) => record,
            Ok(Ok(None)) => {
                tracing::info!("Session not found for connection {}", connection_id);
                tracing::debug!("Connection {} presented unknown session {}", connection_id, session_id);
                return Err(GatewayError::SessionNotFound);
            }
            Ok(Err(e)) => {
                tracing::error!("Session store lookup failed for connection {}: {}", connection_id, e);
                return Err(GatewayError::StoreLookupFailed(e));
            }
            Err(_) => {
                tracing::error!(
                    "Session store lookup timed out after {:?} for connection {}",
                    self.lookup_timeout,
                    connection_id
                );
                return Err(GatewayError::StoreLookupFailed(StoreError::Timeout(self.lookup_timeout)));
            }
        };

        if record.is_expired(Utc::now()) {
            tracing::info!("Session expired for connection {}", connection_id);
            tracing::debug!("Connection {} presented expired session {}", connection_id, session_id);
            return Err(GatewayError::SessionExpired);
        }

        Ok(ConnectionContext::new(connection_id, session_id, record))
    }

    /// Full handshake check: cookie, signature, then store
    pub async fn authorize(
        &self,
        connection_id: Uuid,
        handshake: &Handshake,
    ) -> Result<ConnectionContext, GatewayError> {
        let session_id = self.extract_session_id(handshake)?;
        self.resolve(connection_id, session_id).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Connecting,
    Verifying,
    Authorized,
    Rejected,
}

/// Per-connection handshake state. Each transition happens at most once.
#[derive(Debug)]
pub struct HandshakeFlow {
    connection_id: Uuid,
    state: AuthState,
}

impl HandshakeFlow {
    pub fn new(connection_id: Uuid) -> Self {
        Self {
            connection_id,
            state: AuthState::Connecting,
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Connecting -> Verifying when a valid session cookie is presented, else Rejected
    pub fn begin(
        &mut self,
        authorizer: &ConnectionAuthorizer,
        handshake: &Handshake,
    ) -> Result<SessionIdentifier, GatewayError> {
        if self.state != AuthState::Connecting {
            return Err(GatewayError::DecisionFinal);
        }

        match authorizer.extract_session_id(handshake) {
            Ok(session_id) => {
                self.state = AuthState::Verifying;
                Ok(session_id)
            }
            Err(e) => {
                match &e {
                    GatewayError::InvalidSignature(reason) => {
                        tracing::warn!("Rejecting connection {}: {}", self.connection_id, reason)
                    }
                    _ => tracing::debug!("Rejecting connection {}: {}", self.connection_id, e),
                }
                self.state = AuthState::Rejected;
                Err(e)
            }
        }
    }

    /// Verifying -> Authorized or Rejected, given the outcome of the store lookup.
    ///
    /// The context is admitted only if the registry still has this connection pending.
    pub fn settle(
        &mut self,
        outcome: Result<ConnectionContext, GatewayError>,
        registry: &ConnectionRegistry,
    ) -> Result<Arc<ConnectionContext>, GatewayError> {
        if self.state != AuthState::Verifying {
            return Err(GatewayError::DecisionFinal);
        }

        let admitted = outcome.and_then(|context| {
            registry.put(context).ok_or(GatewayError::ConnectionClosed)
        });

        self.state = match admitted {
            Ok(_) => AuthState::Authorized,
            Err(_) => AuthState::Rejected,
        };

        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySessionStore;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use common::signature::sign_cookie;
    use common::SessionRecord;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    const SECRET: &str = "k";

    fn session_config() -> SessionConfig {
        SessionConfig {
            cookie_name: "express.sid".to_string(),
            secret: SECRET.to_string(),
        }
    }

    fn authorizer(store: Arc<dyn SessionStore>) -> ConnectionAuthorizer {
        ConnectionAuthorizer::new(store, &session_config(), Duration::from_millis(200))
    }

    fn cookie_for(id: &str) -> Handshake {
        let signed = sign_cookie(id, SECRET);
        Handshake::new(Some(format!(
            "theme=dark; express.sid={}",
            signed.replacen("s:", "s%3A", 1)
        )))
    }

    fn store_with(id: &str, record: serde_json::Value) -> Arc<MemorySessionStore> {
        let store = Arc::new(MemorySessionStore::new());
        store.insert(id, SessionRecord::from_value(record).unwrap());
        store
    }

    /// Counts lookups and returns a fixed answer
    struct ScriptedStore {
        lookups: AtomicUsize,
        answer: Result<Option<SessionRecord>, StoreError>,
    }

    impl ScriptedStore {
        fn new(answer: Result<Option<SessionRecord>, StoreError>) -> Arc<Self> {
            Arc::new(Self {
                lookups: AtomicUsize::new(0),
                answer,
            })
        }
    }

    #[async_trait]
    impl SessionStore for ScriptedStore {
        async fn get(&self, _id: &SessionIdentifier) -> Result<Option<SessionRecord>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }
    }

    /// Holds every lookup until released
    struct GatedStore {
        inner: MemorySessionStore,
        release: Notify,
    }

    #[async_trait]
    impl SessionStore for GatedStore {
        async fn get(&self, id: &SessionIdentifier) -> Result<Option<SessionRecord>, StoreError> {
            self.release.notified().await;
            self.inner.get(id).await
        }
    }

    #[actix_web::test]
    async fn test_valid_cookie_and_session_is_authorized() {
        let store = store_with("abc", json!({"userId": 42}));
        let authorizer = authorizer(store);
        let registry = ConnectionRegistry::new();
        let connection_id = Uuid::new_v4();
        registry.open(connection_id);

        let handshake = Handshake::new(Some(format!(
            "express.sid=s%3Aabc.{}",
            "NC5RnOCtbAOja5jus%2FHRMNtIE7nfTRFg7aSI1xLceO4"
        )));

        let mut flow = HandshakeFlow::new(connection_id);
        let session_id = flow.begin(&authorizer, &handshake).unwrap();
        assert_eq!(session_id.as_str(), "abc");
        assert_eq!(flow.state(), AuthState::Verifying);

        let outcome = authorizer.resolve(connection_id, session_id).await;
        let context = flow.settle(outcome, &registry).unwrap();

        assert_eq!(flow.state(), AuthState::Authorized);
        assert_eq!(context.session_id.as_str(), "abc");
        assert_eq!(context.user_id, Some(json!(42)));
        assert!(Arc::ptr_eq(&context, &registry.get(&connection_id).unwrap()));
    }

    #[actix_web::test]
    async fn test_missing_session_record_is_rejected() {
        let authorizer = authorizer(Arc::new(MemorySessionStore::new()));
        let registry = ConnectionRegistry::new();
        let connection_id = Uuid::new_v4();
        registry.open(connection_id);

        let mut flow = HandshakeFlow::new(connection_id);
        let session_id = flow.begin(&authorizer, &cookie_for("abc")).unwrap();
        let outcome = authorizer.resolve(connection_id, session_id).await;

        assert_eq!(flow.settle(outcome, &registry).unwrap_err(), GatewayError::SessionNotFound);
        assert_eq!(flow.state(), AuthState::Rejected);
        assert!(registry.get(&connection_id).is_none());
    }

    #[actix_web::test]
    async fn test_no_cookie_header_skips_lookup() {
        let store = ScriptedStore::new(Ok(Some(SessionRecord::default())));
        let authorizer = authorizer(store.clone());
        let connection_id = Uuid::new_v4();

        let mut flow = HandshakeFlow::new(connection_id);
        let err = flow.begin(&authorizer, &Handshake::new(None)).unwrap_err();
        assert_eq!(err, GatewayError::MissingCredential);
        assert_eq!(flow.state(), AuthState::Rejected);

        // Other cookies but not the session cookie
        let err = authorizer
            .authorize(connection_id, &Handshake::new(Some("theme=dark".to_string())))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::MissingCredential);

        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn test_forged_cookie_is_rejected_without_lookup() {
        let store = ScriptedStore::new(Ok(Some(SessionRecord::default())));
        let authorizer = authorizer(store.clone());

        let forged = Handshake::new(Some("express.sid=s%3Aabc.forged".to_string()));
        let err = authorizer.authorize(Uuid::new_v4(), &forged).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSignature(_)));

        let unsigned = Handshake::new(Some("express.sid=abc".to_string()));
        let err = authorizer.authorize(Uuid::new_v4(), &unsigned).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSignature(_)));

        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn test_store_failure_is_rejected() {
        let store = ScriptedStore::new(Err(StoreError::Unavailable("connection refused".to_string())));
        let authorizer = authorizer(store.clone());

        let err = authorizer
            .authorize(Uuid::new_v4(), &cookie_for("abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::StoreLookupFailed(StoreError::Unavailable(_))));
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn test_store_timeout_is_rejected() {
        let store = Arc::new(GatedStore {
            inner: MemorySessionStore::new(),
            release: Notify::new(),
        });
        let authorizer = authorizer(store);

        let err = authorizer
            .authorize(Uuid::new_v4(), &cookie_for("abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::StoreLookupFailed(StoreError::Timeout(_))));
    }

    #[actix_web::test]
    async fn test_expired_session_is_rejected() {
        let expired = (Utc::now() - ChronoDuration::minutes(5)).to_rfc3339();
        let store = store_with("abc", json!({"userId": 42, "cookie": {"expires": expired}}));
        let authorizer = authorizer(store);

        let err = authorizer
            .authorize(Uuid::new_v4(), &cookie_for("abc"))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::SessionExpired);
    }

    #[actix_web::test]
    async fn test_disconnect_while_verifying_creates_no_entry() {
        let inner = MemorySessionStore::new();
        inner.insert("abc", SessionRecord::from_value(json!({"userId": 42})).unwrap());
        let store = Arc::new(GatedStore {
            inner,
            release: Notify::new(),
        });

        let authorizer = Arc::new(ConnectionAuthorizer::new(
            store.clone(),
            &session_config(),
            Duration::from_secs(5),
        ));
        let registry = ConnectionRegistry::new();
        let connection_id = Uuid::new_v4();
        registry.open(connection_id);

        let mut flow = HandshakeFlow::new(connection_id);
        let session_id = flow.begin(&authorizer, &cookie_for("abc")).unwrap();

        let lookup = {
            let authorizer = authorizer.clone();
            actix_web::rt::spawn(async move { authorizer.resolve(connection_id, session_id).await })
        };

        // Client goes away while the lookup is outstanding
        registry.remove(&connection_id);
        store.release.notify_one();

        let outcome = lookup.await.unwrap();
        assert!(outcome.is_ok());

        assert_eq!(flow.settle(outcome, &registry).unwrap_err(), GatewayError::ConnectionClosed);
        assert_eq!(flow.state(), AuthState::Rejected);
        assert!(registry.get(&connection_id).is_none());
        assert_eq!(registry.len(), 0);
    }

    #[actix_web::test]
    async fn test_decision_is_final() {
        let store = store_with("abc", json!({"userId": 42}));
        let authorizer = authorizer(store);
        let registry = ConnectionRegistry::new();
        let connection_id = Uuid::new_v4();
        registry.open(connection_id);

        let mut flow = HandshakeFlow::new(connection_id);
        let session_id = flow.begin(&authorizer, &cookie_for("abc")).unwrap();
        assert_eq!(
            flow.begin(&authorizer, &cookie_for("abc")).unwrap_err(),
            GatewayError::DecisionFinal
        );

        let outcome = authorizer.resolve(connection_id, session_id.clone()).await;
        let first = flow.settle(outcome, &registry).unwrap();

        // A late second outcome changes nothing
        let late = authorizer.resolve(connection_id, session_id).await;
        assert_eq!(flow.settle(late, &registry).unwrap_err(), GatewayError::DecisionFinal);
        assert_eq!(flow.state(), AuthState::Authorized);
        assert!(Arc::ptr_eq(&first, &registry.get(&connection_id).unwrap()));

        // A rejected flow can't be admitted later either
        let mut rejected = HandshakeFlow::new(Uuid::new_v4());
        let _ = rejected.begin(&authorizer, &Handshake::new(None));
        let outcome = authorizer.resolve(rejected.connection_id(), SessionIdentifier::from("abc")).await;
        assert_eq!(rejected.settle(outcome, &registry).unwrap_err(), GatewayError::DecisionFinal);
        assert_eq!(rejected.state(), AuthState::Rejected);
    }

    #[actix_web::test]
    async fn test_handshake_joins_cookie_headers() {
        let req = actix_web::test::TestRequest::default()
            .append_header((header::COOKIE, "a=1"))
            .append_header((header::COOKIE, "express.sid=s%3Aabc.x"))
            .to_http_request();

        let handshake = Handshake::from_request(&req);
        assert_eq!(handshake.cookie_header(), Some("a=1; express.sid=s%3Aabc.x"));

        let bare = actix_web::test::TestRequest::default().to_http_request();
        assert_eq!(Handshake::from_request(&bare).cookie_header(), None);
    }
}
