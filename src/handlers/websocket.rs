use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::constants::OUTBOUND_QUEUE_CAPACITY;
use crate::core::connection::Connection;
use crate::core::message::{ClientMessage, InboundMessage};
use crate::core::relay::{Admission, SharedRelay};

// Handle a WebSocket connection until the client goes away
pub async fn handle_connection(ws: WebSocket, remote_addr: Option<SocketAddr>, relay: SharedRelay) {
    let remote_addr = match remote_addr {
        Some(addr) => addr,
        None => {
            error!("Refusing WebSocket connection without a remote address");
            return;
        }
    };

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE_CAPACITY);

    // The registry holds the only sender; once the connection is removed
    // the channel closes and the writer shuts the socket.
    tokio::task::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_tx.send(message).await {
                warn!("Failed to send WebSocket message to {}: {}", remote_addr, e);
                break;
            }
        }
        if let Err(e) = ws_tx.close().await {
            debug!("Error closing WebSocket to {}: {}", remote_addr, e);
        }
    });

    let connection = Connection::new(remote_addr, tx);
    let client_id = connection.id;
    relay.register(connection).await;

    loop {
        let next = match relay.idle_timeout() {
            Some(limit) => match tokio::time::timeout(limit, ws_rx.next()).await {
                Ok(next) => next,
                Err(_) => {
                    info!("Closing idle connection {} ({})", client_id, remote_addr);
                    break;
                }
            },
            None => ws_rx.next().await,
        };

        match next {
            Some(Ok(msg)) => {
                if msg.is_close() {
                    break;
                }
                // Only process text messages
                if msg.is_text() {
                    process_message(msg, remote_addr, &relay).await;
                }
            }
            Some(Err(e)) => {
                warn!("WebSocket error from {}: {}", remote_addr, e);
                break;
            }
            None => break,
        }
    }

    relay.unregister(&client_id).await;
}

// Process an incoming WebSocket text frame
async fn process_message(msg: Message, remote_addr: SocketAddr, relay: &SharedRelay) {
    let msg_str = match msg.to_str() {
        Ok(s) => s,
        Err(_) => {
            warn!("Failed to extract text from message sent by {}", remote_addr);
            return;
        }
    };

    let client_message = match serde_json::from_str::<ClientMessage>(msg_str) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Failed to parse message from {}: {}", remote_addr, e);
            return;
        }
    };

    match relay
        .accept(InboundMessage::from_client(client_message, remote_addr))
        .await
    {
        Ok(Admission::Accepted) => debug!("Queued message from {}", remote_addr),
        Ok(admission) => debug!("Dropped message from {}: {:?}", remote_addr, admission),
        Err(e) => error!("Failed to queue message from {}: {}", remote_addr, e),
    }
}
