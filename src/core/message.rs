use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Frame sent by clients. Any `ip` field they include is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    pub username: String,
    pub content: String,
}

/// A message that passed the gates and waits for the broadcast consumer
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub sender_name: String,
    pub content: String,
    pub source_address: SocketAddr,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Build from a client frame, stamping the observed remote address
    pub fn from_client(message: ClientMessage, source_address: SocketAddr) -> Self {
        Self {
            sender_name: message.username,
            content: message.content,
            source_address,
            received_at: Utc::now(),
        }
    }
}

/// What every connected client receives
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub display_name: String,
    pub content: String,
    pub source_address: SocketAddr,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    username: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip: Option<String>,
}

impl OutboundMessage {
    /// Serialize to the text frame broadcast to all clients
    pub fn to_wire(&self, expose_source_address: bool) -> serde_json::Result<String> {
        serde_json::to_string(&WireMessage {
            username: &self.display_name,
            content: &self.content,
            ip: expose_source_address.then(|| self.source_address.to_string()),
        })
    }
}
