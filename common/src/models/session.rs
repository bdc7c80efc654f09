// common/src/models/session.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Primary key of a session in the external session store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionIdentifier(String);

impl SessionIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionIdentifier {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionIdentifier {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session data as persisted by the HTTP session subsystem.
///
/// The gateway only reads records, so the shape is left open: known attributes are
/// exposed through accessors and everything else stays in the attribute map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl SessionRecord {
    /// Build a record from a JSON object; anything else is not a session
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(attributes) => Some(Self { attributes }),
            _ => None,
        }
    }

    /// The logged-in user, from `userId` or passport's `passport.user`
    pub fn user_id(&self) -> Option<&Value> {
        self.attributes
            .get("userId")
            .or_else(|| self.attributes.get("passport").and_then(|p| p.get("user")))
            .filter(|v| !v.is_null())
    }

    /// Expiry stored by express-session in `cookie.expires`
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.attributes
            .get("cookie")
            .and_then(|cookie| cookie.get("expires"))
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Records without an expiry are treated as live
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expires) => expires <= now,
            None => false,
        }
    }
}

/// Identity resolved for one authorized connection, valid for that connection's lifetime
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionContext {
    pub connection_id: Uuid,
    pub session_id: SessionIdentifier,
    pub user_id: Option<Value>,
    pub session: SessionRecord,
    pub authorized_at: DateTime<Utc>,
}

impl ConnectionContext {
    pub fn new(connection_id: Uuid, session_id: SessionIdentifier, session: SessionRecord) -> Self {
        Self {
            connection_id,
            user_id: session.user_id().cloned(),
            session_id,
            session,
            authorized_at: Utc::now(),
        }
    }
}
