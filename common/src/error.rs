// common/src/error.rs
use std::time::Duration;
use thiserror::Error;

/// Why a signed cookie value failed verification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("cookie value is not signed")]
    MissingPrefix,
    #[error("signed value has no signature separator")]
    MissingSeparator,
    #[error("signature does not match payload")]
    Mismatch,
}

/// Failures reported by a session store backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("session store lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed session record: {0}")]
    Malformed(String),
}

/// Everything that can stop a connection from being admitted or an event from being routed.
///
/// None of these leave the connection that produced them: handshake errors reject the
/// connection, dispatch errors drop the event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("no session cookie presented")]
    MissingCredential,
    #[error("invalid session cookie: {0}")]
    InvalidSignature(#[from] SignatureError),
    #[error("session lookup failed: {0}")]
    StoreLookupFailed(#[from] StoreError),
    #[error("session not found")]
    SessionNotFound,
    #[error("session expired")]
    SessionExpired,
    #[error("event received on a connection that is not authorized")]
    UnauthorizedDispatch,
    #[error("no handler registered for event '{0}'")]
    UnknownEvent(String),
    #[error("connection closed before authorization completed")]
    ConnectionClosed,
    #[error("authorization decision already made for this connection")]
    DecisionFinal,
}

impl GatewayError {
    /// Text sent to the client in a close frame or error message
    pub fn client_reason(&self) -> String {
        match self {
            // Don't leak backend details to the client
            GatewayError::StoreLookupFailed(_) => "session lookup failed".to_string(),
            other => other.to_string(),
        }
    }
}
