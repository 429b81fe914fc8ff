//! The relay: one object owning every piece of shared state
//!
//! Built once at startup and handed to each route as a [`SharedRelay`].

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::RelayConfig;
use crate::constants::RATE_LIMIT_CLEANUP_INTERVAL_SECS;
use crate::core::connection::{Connection, ConnectionId};
use crate::core::hub::BroadcastHub;
use crate::core::message::InboundMessage;
use crate::core::rate_limiter::MessageRateLimiter;
use crate::core::registry::{ConnectionRegistry, SharedRegistry};
use crate::core::roles::RoleTable;
use crate::core::validator::{MessageValidator, ValidationResult};
use crate::error::Result;
use crate::moderation::{
    backend_from_source, Moderated, ModerationBackend, ModerationGateway, SummaryRequest,
};
use crate::storage::audit_log::{AuditRecord, JsonlAuditLog, SharedAuditSink};

/// What happened to an inbound message at the gates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Queued for broadcast
    Accepted,
    /// Dropped by the validator
    Rejected(ValidationResult),
    /// Dropped because the sender's cooldown has not elapsed
    RateLimited,
}

pub struct Relay {
    registry: SharedRegistry,
    rate_limiter: Arc<MessageRateLimiter>,
    validator: MessageValidator,
    gateway: Arc<ModerationGateway>,
    hub: BroadcastHub,
    audit: SharedAuditSink,
    idle_timeout: Option<Duration>,
    max_frame_bytes: usize,
    hub_task: JoinHandle<()>,
    cleanup_task: JoinHandle<()>,
}

impl Relay {
    /// Assemble the relay from its collaborators and start its tasks
    pub fn new(
        config: &RelayConfig,
        backend: Arc<dyn ModerationBackend>,
        roles: RoleTable,
        audit: SharedAuditSink,
    ) -> Self {
        let registry: SharedRegistry = Arc::new(ConnectionRegistry::new());
        let rate_limiter = Arc::new(MessageRateLimiter::new(
            config.cooldown,
            config.rate_limit_max_tracked,
        ));
        let gateway = Arc::new(ModerationGateway::from_config(backend, config));

        let (hub, hub_task) = BroadcastHub::spawn(
            registry.clone(),
            gateway.clone(),
            Arc::new(roles),
            config.expose_source_address,
            config.queue_capacity,
        );
        let cleanup_task = rate_limiter
            .clone()
            .start_cleanup_task(Duration::from_secs(RATE_LIMIT_CLEANUP_INTERVAL_SECS));

        Self {
            registry,
            rate_limiter,
            validator: MessageValidator::new(config.max_message_chars),
            gateway,
            hub,
            audit,
            idle_timeout: config.idle_timeout,
            max_frame_bytes: config.max_frame_bytes,
            hub_task,
            cleanup_task,
        }
    }

    /// Build the production collaborators described by the configuration
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let roles = match &config.roles_file {
            Some(path) => RoleTable::from_file(path)?,
            None => RoleTable::default(),
        };
        log::info!("Loaded {} role tags", roles.len());

        let backend = backend_from_source(&config.moderation);
        let audit: SharedAuditSink = Arc::new(JsonlAuditLog::spawn(
            config.audit_dir.clone(),
            config.audit_timezone,
        ));

        Ok(Self::new(config, backend, roles, audit))
    }

    /// Register a freshly upgraded connection
    pub async fn register(&self, connection: Connection) {
        let id = connection.id;
        let addr = connection.remote_addr;
        self.registry.add(connection).await;
        log::info!("Client connected: {} ({})", id, addr);
        log::info!("Current connections: {}", self.registry.len().await);
    }

    /// Remove a connection. Safe to call after the hub already dropped it.
    pub async fn unregister(&self, id: &ConnectionId) -> bool {
        let removed = self.registry.remove(id).await;
        log::info!("Client disconnected: {}", id);
        log::info!("Current connections: {}", self.registry.len().await);
        removed
    }

    /// Run the gates and queue the message for broadcast if it passes.
    /// Rejections are only logged; the sender is not told.
    pub async fn accept(&self, message: InboundMessage) -> Result<Admission> {
        let source = message.source_address;

        let verdict = self.validator.validate(&message.content);
        if !verdict.is_ok() {
            log::info!(
                "Ignored message from {} (IP: {}): {}",
                message.sender_name,
                source,
                verdict
            );
            return Ok(Admission::Rejected(verdict));
        }

        if !self.rate_limiter.allow(source.ip()).await {
            log::info!(
                "Rate limited message from {} (IP: {})",
                message.sender_name,
                source
            );
            return Ok(Admission::RateLimited);
        }

        let record = AuditRecord {
            username: message.sender_name.clone(),
            ip: source.to_string(),
            content: message.content.clone(),
            time_sent: message.received_at,
        };

        // Only messages that actually entered the pipeline are audited
        self.hub.submit(message).await?;
        log::debug!("Accepted message from {} (IP: {})", record.username, source);
        self.audit.record(record);
        Ok(Admission::Accepted)
    }

    /// Recommendation summary through the moderation backend
    pub async fn summarize(&self, request: &SummaryRequest) -> Moderated {
        self.gateway.summarize(request).await
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.hub_task.abort();
        self.cleanup_task.abort();
    }
}

// Shared reference to the relay
pub type SharedRelay = Arc<Relay>;
