// common/src/messages.rs
use actix::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Named event sent by a client over an authorized connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRequest {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    /// Client-chosen correlation id, echoed on every result
    #[serde(default)]
    pub id: Option<String>,
}

/// Frame sent from the gateway to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Message)]
#[rtype(result = "()")]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection passed authorization and accepts events
    Ready {
        connection_id: Uuid,
    },
    Data {
        event: String,
        id: Option<String>,
        data: Value,
    },
    /// The handler's stream finished
    End {
        event: String,
        id: Option<String>,
    },
    Error {
        event: Option<String>,
        id: Option<String>,
        message: String,
    },
}
