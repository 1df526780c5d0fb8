//! Domain events
use serde::Serialize;
use crate::domain::value_objects::{CustomerId, OrderId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    UserCreated { user_id: UserId },
    OrderCreated { order_id: OrderId, customer_id: CustomerId, item_count: usize },
}

impl DomainEvent {
    /// Subject suffix used when the event leaves the process.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::UserCreated { .. } => "users.created",
            Self::OrderCreated { .. } => "orders.created",
        }
    }
}
