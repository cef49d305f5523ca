/// Outbound account events
///
/// Publishing never blocks a request: handlers push onto an unbounded
/// channel through an [`EventSink`], and a dispatcher task drains the
/// channel into an [`EventPublisher`] (the Redis stream in production, the
/// log on the memory backend).
///
/// ```text
/// handler ──publish──> ChannelEventSink ──mpsc──> run_dispatcher ──> EventPublisher
///                                                                   ├─ StreamWriter (XADD events:accounts)
///                                                                   └─ LogPublisher
/// ```
///
/// # Example
///
/// ```
/// use driverdesk_shared::events::{event_bus, run_dispatcher, AccountEvent, EventSink, LogPublisher};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use uuid::Uuid;
///
/// # async fn example() {
/// let (sink, receiver) = event_bus();
/// let shutdown = CancellationToken::new();
/// let dispatcher = tokio::spawn(run_dispatcher(receiver, Arc::new(LogPublisher), shutdown.clone()));
///
/// sink.publish(AccountEvent::RoleChanged {
///     account_id: Uuid::new_v4(),
///     name: "Jane".to_string(),
///     roles: vec!["driver".to_string()],
/// });
///
/// shutdown.cancel();
/// dispatcher.await.unwrap();
/// # }
/// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::Account;

pub mod serialization;

/// Event published on account changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccountEvent {
    /// The role set of an account changed
    RoleChanged {
        account_id: Uuid,
        name: String,
        roles: Vec<String>,
    },
}

impl AccountEvent {
    /// `RoleChanged` snapshot of an account
    pub fn role_changed(account: &Account) -> Self {
        AccountEvent::RoleChanged {
            account_id: account.id,
            name: account.name.clone(),
            roles: account.roles.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AccountEvent::RoleChanged { .. } => "role_changed",
        }
    }

    pub fn account_id(&self) -> Uuid {
        match self {
            AccountEvent::RoleChanged { account_id, .. } => *account_id,
        }
    }
}

/// Event delivery errors
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serialization::SerializationError),

    #[error("Failed to deliver event after {attempts} attempts: {last_error}")]
    DeliveryFailed { attempts: u32, last_error: String },
}

/// Fire-and-forget event publication
pub trait EventSink: Send + Sync {
    fn publish(&self, event: AccountEvent);
}

/// Delivers events to their final destination
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn deliver(&self, event: &AccountEvent) -> Result<(), EventError>;
}

/// Sink that enqueues onto the dispatcher channel
#[derive(Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<AccountEvent>,
}

impl EventSink for ChannelEventSink {
    fn publish(&self, event: AccountEvent) {
        if let Err(e) = self.sender.send(event) {
            warn!(kind = e.0.kind(), account_id = %e.0.account_id(), "Event bus closed, event dropped");
        }
    }
}

/// Creates the sink and the receiving half for the dispatcher
pub fn event_bus() -> (ChannelEventSink, mpsc::UnboundedReceiver<AccountEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (ChannelEventSink { sender }, receiver)
}

/// Publisher that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn deliver(&self, event: &AccountEvent) -> Result<(), EventError> {
        info!(kind = event.kind(), account_id = %event.account_id(), "Account event");
        Ok(())
    }
}

/// Drains the event channel until shutdown
///
/// Events still queued when `shutdown` fires are delivered before the task
/// returns. Delivery failures are logged and the event is dropped.
pub async fn run_dispatcher(
    mut receiver: mpsc::UnboundedReceiver<AccountEvent>,
    publisher: Arc<dyn EventPublisher>,
    shutdown: CancellationToken,
) {
    debug!("Event dispatcher started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            next = receiver.recv() => match next {
                Some(event) => deliver(publisher.as_ref(), &event).await,
                None => break,
            },
        }
    }

    receiver.close();
    while let Some(event) = receiver.recv().await {
        deliver(publisher.as_ref(), &event).await;
    }

    debug!("Event dispatcher stopped");
}

async fn deliver(publisher: &dyn EventPublisher, event: &AccountEvent) {
    if let Err(e) = publisher.deliver(event).await {
        error!(kind = event.kind(), account_id = %event.account_id(), error = %e, "Event delivery failed");
    }
}
