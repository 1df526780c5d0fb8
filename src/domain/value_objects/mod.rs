//! Value objects for the store domain

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::ValidationError;

/// Defines an integer-backed entity id.
///
/// The wrapper is transparent for serde and sqlx, so it binds and decodes
/// as a plain `BIGINT` and serializes as a JSON number.
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(id: i64) -> Self { Self(id) }
            pub const fn as_i64(&self) -> i64 { self.0 }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self { Self(id) }
        }
    };
}

define_id!(ProductId);
define_id!(CollectionId);
define_id!(PromotionId);
define_id!(ReviewId);
define_id!(ImageId);
define_id!(CartItemId);
define_id!(OrderId);
define_id!(OrderItemId);
define_id!(CustomerId);
define_id!(UserId);

/// Cart identifier, generated when the cart is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct CartId(Uuid);

impl CartId {
    pub fn generate() -> Self { Self(Uuid::new_v4()) }
    pub const fn from_uuid(id: Uuid) -> Self { Self(id) }
    pub const fn as_uuid(&self) -> &Uuid { &self.0 }
}

impl fmt::Display for CartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Highest price a product may carry (`NUMERIC(6, 2)`).
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(999_999, 0, 0, false, 2);

/// Multiplier applied to a unit price to show it with tax.
pub const TAX_MULTIPLIER: Decimal = Decimal::from_parts(11, 0, 0, false, 1);

/// Largest quantity or inventory count a row can store.
pub const MAX_QUANTITY: i32 = i16::MAX as i32;

/// Checks a unit price is non-negative, fits in six digits and has at most
/// two decimal places.
pub fn validate_unit_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::new("negative_price"));
    }
    if *price > MAX_UNIT_PRICE {
        return Err(ValidationError::new("price_too_large"));
    }
    if price.normalize().scale() > 2 {
        return Err(ValidationError::new("price_precision"));
    }
    Ok(())
}

/// Unit price with tax, rounded to cents.
pub fn price_with_tax(unit_price: Decimal) -> Decimal {
    (unit_price * TAX_MULTIPLIER).round_dp(2)
}

/// Total for `quantity` units at `unit_price`.
pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}
