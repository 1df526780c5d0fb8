//! In-process event bus.
//!
//! Listeners register once at startup, either as required or best-effort.
//! [`EventBus::dispatch`] fails on the first required listener error and only
//! logs best-effort failures; [`EventBus::dispatch_robust`] logs every failure.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::{RepositoryError, Store};
use crate::domain::events::DomainEvent;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Storage error: {0}")]
    Storage(#[from] RepositoryError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Publish error: {0}")]
    Publish(String),
}

/// Handles domain events.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Listener name, used in logs.
    fn name(&self) -> &str;
    async fn handle(&self, event: &DomainEvent) -> Result<(), EventError>;
}

/// A listener that failed during robust dispatch.
#[derive(Debug)]
pub struct ListenerFailure {
    pub listener: String,
    pub error: EventError,
}

#[derive(Clone, Default)]
pub struct EventBus {
    required: Vec<Arc<dyn EventListener>>,
    listeners: Vec<Arc<dyn EventListener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener whose failure fails [`EventBus::dispatch`].
    pub fn register_required(&mut self, listener: Arc<dyn EventListener>) {
        tracing::debug!(listener = listener.name(), "required event listener registered");
        self.required.push(listener);
    }

    /// Adds a best-effort listener.
    pub fn register(&mut self, listener: Arc<dyn EventListener>) {
        tracing::debug!(listener = listener.name(), "event listener registered");
        self.listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.required.len() + self.listeners.len()
    }

    /// Runs required listeners in registration order, then the best-effort ones.
    ///
    /// # Errors
    ///
    /// Returns the first required listener error; nothing after it runs.
    pub async fn dispatch(&self, event: &DomainEvent) -> Result<Vec<ListenerFailure>, EventError> {
        for listener in &self.required {
            listener.handle(event).await?;
        }
        Ok(Self::run_all(&self.listeners, event).await)
    }

    /// Runs every listener, required ones included, regardless of failures.
    pub async fn dispatch_robust(&self, event: &DomainEvent) -> Vec<ListenerFailure> {
        let mut failures = Self::run_all(&self.required, event).await;
        failures.extend(Self::run_all(&self.listeners, event).await);
        failures
    }

    async fn run_all(listeners: &[Arc<dyn EventListener>], event: &DomainEvent) -> Vec<ListenerFailure> {
        let mut failures = Vec::new();
        for listener in listeners {
            if let Err(error) = listener.handle(event).await {
                tracing::warn!(listener = listener.name(), subject = event.subject(), error = %error, "event listener failed");
                failures.push(ListenerFailure { listener: listener.name().to_owned(), error });
            }
        }
        failures
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |ls: &[Arc<dyn EventListener>]| ls.iter().map(|l| l.name().to_owned()).collect::<Vec<_>>();
        f.debug_struct("EventBus")
            .field("required", &names(&self.required[..]))
            .field("listeners", &names(&self.listeners[..]))
            .finish()
    }
}

/// Gives every new user a customer profile at the default membership tier.
pub struct CustomerProvisioner {
    store: Arc<dyn Store>,
}

impl CustomerProvisioner {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventListener for CustomerProvisioner {
    fn name(&self) -> &str {
        "customer_provisioner"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), EventError> {
        if let DomainEvent::UserCreated { user_id } = event {
            let customer = self.store.provision_customer(*user_id).await?;
            tracing::info!(%user_id, customer_id = %customer.id, "customer provisioned");
        }
        Ok(())
    }
}

/// Publishes every event as JSON on `<prefix>.<subject>`.
pub struct NatsPublisher {
    client: async_nats::Client,
    prefix: String,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self {
        Self { client, prefix: prefix.into() }
    }
}

#[async_trait]
impl EventListener for NatsPublisher {
    fn name(&self) -> &str {
        "nats_publisher"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), EventError> {
        let payload = serde_json::to_vec(event)?;
        let subject = format!("{}.{}", self.prefix, event.subject());
        self.client
            .publish(subject, payload.into())
            .await
            .map_err(|e| EventError::Publish(e.to_string()))
    }
}
