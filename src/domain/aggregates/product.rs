//! Catalog aggregates: products, collections, promotions, reviews, images

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{
    price_with_tax, CollectionId, ImageId, ProductId, PromotionId, ReviewId,
};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub slug: Option<String>,
    pub inventory: i32,
    pub unit_price: Decimal,
    pub collection: CollectionId,
    pub promotions: Vec<PromotionId>,
    pub images: Vec<ProductImage>,
    pub last_update: DateTime<Utc>,
}

/// Fields an admin supplies when creating or replacing a product.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductDraft {
    pub title: String,
    pub description: String,
    pub slug: Option<String>,
    pub inventory: i32,
    pub unit_price: Decimal,
    pub collection: CollectionId,
    pub promotions: Vec<PromotionId>,
}

/// The short product form nested in cart and order lines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub title: String,
    pub unit_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: ImageId,
    pub image: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Collection {
    pub id: CollectionId,
    pub title: String,
    pub featured_product: Option<ProductId>,
    pub products_count: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionDraft {
    pub title: String,
    pub featured_product: Option<ProductId>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Promotion {
    pub id: PromotionId,
    pub description: String,
    pub discount: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PromotionDraft {
    pub description: String,
    pub discount: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub name: String,
    pub description: String,
    pub date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewDraft {
    pub name: String,
    pub description: String,
}

impl Product {
    pub fn price_with_tax(&self) -> Decimal { price_with_tax(self.unit_price) }

    pub fn summary(&self) -> ProductSummary {
        ProductSummary { id: self.id, title: self.title.clone(), unit_price: self.unit_price }
    }

    /// A product stays while any order line points at it.
    pub fn ensure_deletable(order_item_refs: i64) -> Result<(), CatalogError> {
        if order_item_refs > 0 { return Err(CatalogError::ProductInOrders); }
        Ok(())
    }
}

impl Collection {
    /// A collection stays while it features a product or still holds products.
    pub fn ensure_deletable(&self) -> Result<(), CatalogError> {
        if self.featured_product.is_some() { return Err(CatalogError::CollectionFeaturesProduct); }
        if self.products_count > 0 { return Err(CatalogError::CollectionHasProducts); }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("product cannot be deleted, associated with orderitem")]
    ProductInOrders,
    #[error("collection could not be deleted, featuring a product")]
    CollectionFeaturesProduct,
    #[error("collection could not be deleted, it still contains products")]
    CollectionHasProducts,
}
