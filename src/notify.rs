//! Outbound order notifications.
//!
//! Publishing is fire-and-forget: callers never wait on delivery and a failed
//! publish is only logged.

use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::domain::events::{EventEnvelope, OrderEvent};

pub trait Notifier: Send + Sync {
    fn publish(&self, event: OrderEvent);
}

/// Publishes events as JSON on a NATS subject.
pub struct NatsNotifier {
    client: async_nats::Client,
    subject: String,
}

impl NatsNotifier {
    pub async fn connect(url: &str, subject: impl Into<String>) -> Result<Self, async_nats::ConnectError> {
        let client = async_nats::connect(url).await?;
        Ok(Self { client, subject: subject.into() })
    }
}

impl Notifier for NatsNotifier {
    fn publish(&self, event: OrderEvent) {
        let order_id = event.order_id().to_string();
        let payload = match serde_json::to_vec(&EventEnvelope::from(event)) {
            Ok(p) => p,
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "could not encode order event");
                return;
            }
        };
        let client = self.client.clone();
        let subject = self.subject.clone();
        tokio::spawn(async move {
            if let Err(e) = client.publish(subject, payload.into()).await {
                warn!(order_id = %order_id, error = %e, "order event publish failed");
            }
        });
    }
}

/// Writes events to the log. Used when no message bus is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn publish(&self, event: OrderEvent) {
        info!(order_id = %event.order_id(), event = ?event, "order event");
    }
}

/// Keeps published events in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<OrderEvent>>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<OrderEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn publish(&self, event: OrderEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
