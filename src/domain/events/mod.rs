//! Domain events
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::OrderStatus;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: String, customer: String, phone: String, total: Decimal, seller: String },
    Deleted { order_id: String },
    PaymentChanged { order_id: String, paid: bool },
    StatusChanged { order_id: String, status: OrderStatus },
}

impl OrderEvent {
    pub fn order_id(&self) -> &str {
        match self {
            Self::Created { order_id, .. }
            | Self::Deleted { order_id }
            | Self::PaymentChanged { order_id, .. }
            | Self::StatusChanged { order_id, .. } => order_id,
        }
    }
}

/// Wire form of an event as handed to the notification channel.
#[derive(Clone, Debug, Serialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: OrderEvent,
}

impl From<OrderEvent> for EventEnvelope {
    fn from(event: OrderEvent) -> Self {
        Self { event_id: Uuid::now_v7(), occurred_at: Utc::now(), event }
    }
}
