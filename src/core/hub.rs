//! Ordered broadcast pipeline
//!
//! Accepted messages are queued to a single consumer task which decorates,
//! moderates and fans out one message at a time. Because there is exactly
//! one consumer and every connection's outbound channel is FIFO, all
//! recipients observe the same delivery order.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::message::{InboundMessage, OutboundMessage};
use crate::core::registry::{BroadcastReport, SharedRegistry};
use crate::core::roles::RoleTable;
use crate::error::{RelayError, Result};
use crate::moderation::ModerationGateway;

/// Producer side of the pipeline, cheap to clone
#[derive(Clone)]
pub struct BroadcastHub {
    sender: mpsc::Sender<InboundMessage>,
}

struct HubWorker {
    registry: SharedRegistry,
    gateway: Arc<ModerationGateway>,
    roles: Arc<RoleTable>,
    expose_source_address: bool,
}

impl BroadcastHub {
    /// Start the consumer task. It runs until every hub handle is dropped.
    pub fn spawn(
        registry: SharedRegistry,
        gateway: Arc<ModerationGateway>,
        roles: Arc<RoleTable>,
        expose_source_address: bool,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = HubWorker {
            registry,
            gateway,
            roles,
            expose_source_address,
        };
        let handle = tokio::spawn(worker.run(receiver));
        (Self { sender }, handle)
    }

    /// Queue an accepted message, waiting for room if the queue is full
    pub async fn submit(&self, message: InboundMessage) -> Result<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| RelayError::PipelineClosed)
    }
}

impl HubWorker {
    async fn run(self, mut receiver: mpsc::Receiver<InboundMessage>) {
        log::info!(
            "Broadcast pipeline started (moderation backend: {})",
            self.gateway.backend_name()
        );
        while let Some(message) = receiver.recv().await {
            match self.process(message).await {
                Ok(report) => log::debug!(
                    "Delivered to {} clients, removed {} dead connections",
                    report.delivered,
                    report.removed
                ),
                Err(e) => log::error!("Failed to broadcast message: {}", e),
            }
        }
        log::info!("Broadcast pipeline stopped");
    }

    async fn process(&self, message: InboundMessage) -> Result<BroadcastReport> {
        let display_name = self.roles.decorate(&message.sender_name);

        let moderated = self.gateway.moderate(&message.content).await;
        if let Some(failure) = &moderated.failure {
            log::warn!(
                "Moderation failed for message from {} ({}), sending marker: {}",
                display_name,
                message.source_address,
                failure
            );
        }

        let outbound = OutboundMessage {
            display_name,
            content: moderated.content,
            source_address: message.source_address,
        };
        log::info!(
            "Broadcasting message from {} (IP: {}): {}",
            outbound.display_name,
            outbound.source_address,
            outbound.content
        );

        let frame = outbound.to_wire(self.expose_source_address)?;
        Ok(self.registry.broadcast(&frame).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connection::Connection;
    use crate::core::registry::ConnectionRegistry;
    use crate::moderation::{ModerationBackend, ModerationRequest, PassthroughBackend};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;
    use warp::ws::Message;

    struct UnreachableBackend;

    #[async_trait]
    impl ModerationBackend for UnreachableBackend {
        fn name(&self) -> &'static str {
            "unreachable"
        }

        async fn call(&self, _request: &ModerationRequest) -> Result<String> {
            Err(RelayError::ModerationFailure("connection refused".to_string()))
        }
    }

    fn inbound(name: &str, content: &str) -> InboundMessage {
        InboundMessage {
            sender_name: name.to_string(),
            content: content.to_string(),
            source_address: "203.0.113.7:51000".parse().unwrap(),
            received_at: Utc::now(),
        }
    }

    async fn join(registry: &SharedRegistry) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(64);
        registry
            .add(Connection::new("127.0.0.1:40000".parse().unwrap(), tx))
            .await;
        rx
    }

    fn start_hub(registry: SharedRegistry, backend: Arc<dyn ModerationBackend>) -> BroadcastHub {
        let gateway = Arc::new(ModerationGateway::new(
            backend,
            Duration::from_secs(1),
            1,
            "[message restricted]",
        ));
        let (hub, _handle) =
            BroadcastHub::spawn(registry, gateway, Arc::new(RoleTable::default()), false, 16);
        hub
    }

    async fn next_text(rx: &mut mpsc::Receiver<Message>) -> String {
        let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for broadcast")
            .expect("channel closed");
        message.to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_decorated_broadcast_reaches_everyone() {
        let registry: SharedRegistry = Arc::new(ConnectionRegistry::new());
        let mut a = join(&registry).await;
        let mut b = join(&registry).await;
        let hub = start_hub(registry.clone(), Arc::new(PassthroughBackend));

        hub.submit(inbound("Mike", "hello")).await.unwrap();

        let expected = r#"{"username":"Mike [VOLUNTEER]","content":"hello"}"#;
        assert_eq!(next_text(&mut a).await, expected);
        assert_eq!(next_text(&mut b).await, expected);
    }

    #[tokio::test]
    async fn test_all_recipients_see_same_order() {
        let registry: SharedRegistry = Arc::new(ConnectionRegistry::new());
        let mut receivers = Vec::new();
        for _ in 0..4 {
            receivers.push(join(&registry).await);
        }
        let hub = start_hub(registry.clone(), Arc::new(PassthroughBackend));

        for i in 0..20 {
            hub.submit(inbound("Stranger", &format!("message {}", i)))
                .await
                .unwrap();
        }

        for rx in receivers.iter_mut() {
            for i in 0..20 {
                let text = next_text(rx).await;
                assert!(text.contains(&format!("\"message {}\"", i)), "out of order: {}", text);
            }
        }
    }

    #[tokio::test]
    async fn test_moderation_outage_still_broadcasts_marker() {
        let registry: SharedRegistry = Arc::new(ConnectionRegistry::new());
        let mut a = join(&registry).await;
        let hub = start_hub(registry.clone(), Arc::new(UnreachableBackend));

        hub.submit(inbound("Rich", "hello")).await.unwrap();

        assert_eq!(
            next_text(&mut a).await,
            r#"{"username":"Rich [MDPD]","content":"[message restricted]"}"#
        );
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_dead_connection_does_not_block_others() {
        let registry: SharedRegistry = Arc::new(ConnectionRegistry::new());
        let mut alive = join(&registry).await;
        let dead = join(&registry).await;
        drop(dead);
        let hub = start_hub(registry.clone(), Arc::new(PassthroughBackend));

        hub.submit(inbound("Jake", "one")).await.unwrap();
        hub.submit(inbound("Jake", "two")).await.unwrap();

        assert!(next_text(&mut alive).await.contains("\"one\""));
        assert!(next_text(&mut alive).await.contains("\"two\""));
        assert_eq!(registry.len().await, 1);
    }
}
