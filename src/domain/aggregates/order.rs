//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::cart::Cart;
use crate::domain::aggregates::product::ProductSummary;
use crate::domain::value_objects::{CustomerId, OrderId, OrderItemId, ProductId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub placed_at: DateTime<Utc>,
    pub payment_status: PaymentStatus,
    pub items: Vec<OrderItem>,
}

/// An order line. The nested product is read at query time, so the price
/// shown is the product's current one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub quantity: i32,
    pub product: ProductSummary,
}

/// A line to be written when a cart becomes an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    #[serde(rename = "P")]
    Pending,
    #[serde(rename = "C")]
    Complete,
    #[serde(rename = "F")]
    Failed,
}

impl PaymentStatus {
    pub fn code(&self) -> &'static str {
        match self { Self::Pending => "P", Self::Complete => "C", Self::Failed => "F" }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code { "P" => Some(Self::Pending), "C" => Some(Self::Complete), "F" => Some(Self::Failed), _ => None }
    }

    /// Pending settles to Complete or Failed; a settled status never moves.
    pub fn transition_to(self, next: Self) -> Result<Self, OrderError> {
        match (self, next) {
            (a, b) if a == b => Ok(b),
            (Self::Pending, Self::Complete | Self::Failed) => Ok(next),
            _ => Err(OrderError::InvalidTransition { from: self, to: next }),
        }
    }
}

impl Order {
    pub fn item_count(&self) -> usize { self.items.len() }

    /// One order line per cart line, carrying product and quantity only.
    pub fn lines_from_cart(cart: &Cart) -> Result<Vec<OrderLine>, OrderError> {
        if cart.is_empty() { return Err(OrderError::EmptyCart); }
        Ok(cart.items.iter().map(|i| OrderLine { product_id: i.product.id, quantity: i.quantity }).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("No cart with that ID exists")]
    CartNotFound,
    #[error("Cart is empty")]
    EmptyCart,
    #[error("No customer profile exists for this user")]
    CustomerNotFound,
    #[error("Payment status cannot change from {from:?} to {to:?}")]
    InvalidTransition { from: PaymentStatus, to: PaymentStatus },
}
