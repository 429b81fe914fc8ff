//! WebSocket connection handle
//! Handles the outbound side of a single client connection

use log::warn;
use std::net::SocketAddr;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;
use warp::ws::Message;

/// Opaque identity of a connection, never reused
pub type ConnectionId = Uuid;

/// Represents the outbound state of a single WebSocket connection
#[derive(Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub remote_addr: SocketAddr,
    pub sender: mpsc::Sender<Message>,
}

impl Connection {
    /// Create a new connection with a unique ID
    pub fn new(remote_addr: SocketAddr, sender: mpsc::Sender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote_addr,
            sender,
        }
    }

    /// Queue a text frame for the writer task without waiting.
    /// False means the writer is gone or its queue is full.
    pub fn send_text(&self, text: &str) -> bool {
        match self.sender.try_send(Message::text(text)) {
            Ok(_) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Outbound queue full for client {} ({}), dropping slow reader",
                    self.id, self.remote_addr
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Failed to send message to client {} ({})", self.id, self.remote_addr);
                false
            }
        }
    }
}
