//! Cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use crate::domain::aggregates::product::ProductSummary;
use crate::domain::value_objects::{line_total, CartId, CartItemId, ProductId, MAX_QUANTITY};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Cart {
    pub id: CartId,
    pub created_at: DateTime<Utc>,
    pub items: Vec<CartItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product: ProductSummary,
    pub quantity: i32,
}

impl CartItem {
    /// Priced from the product's current unit price.
    pub fn total_price(&self) -> Decimal { line_total(self.product.unit_price, self.quantity) }

    /// Adds `quantity` more units of the same product to this line.
    pub fn absorb(&mut self, quantity: i32) -> Result<(), CartError> {
        self.quantity = merged_quantity(self.quantity, quantity)?;
        Ok(())
    }
}

impl Cart {
    pub fn new() -> Self { Self { id: CartId::generate(), created_at: Utc::now(), items: vec![] } }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn item_count(&self) -> usize { self.items.len() }

    pub fn item_for(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product.id == product_id)
    }

    pub fn total_price(&self) -> Decimal {
        self.items.iter().map(CartItem::total_price).sum()
    }
}

impl Default for Cart {
    fn default() -> Self { Self::new() }
}

/// Quantity after adding `added` units to a line already holding `current`.
pub fn merged_quantity(current: i32, added: i32) -> Result<i32, CartError> {
    if added < 1 { return Err(CartError::InvalidQuantity); }
    current
        .checked_add(added)
        .filter(|q| *q <= MAX_QUANTITY)
        .ok_or(CartError::QuantityTooLarge)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Quantity exceeds the maximum of 32767")]
    QuantityTooLarge,
}
