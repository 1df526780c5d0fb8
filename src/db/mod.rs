//! Storage for the store API.
//!
//! Handlers talk to a [`Store`], which bundles one repository trait per
//! aggregate family. Two backends implement it:
//!
//! - [`postgres::PgStore`] - production backend on `PostgreSQL`, schema in
//!   `migrations/`, applied at startup with `sqlx::migrate!`
//! - [`memory::MemoryStore`] - in-process backend for tests and local runs
//!
//! Rules that span rows (protected deletes, cart line merging, cart-to-order
//! conversion) are enforced by both backends through the same domain checks.

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

use crate::domain::aggregates::{
    CartError, CatalogError, Cart, CartItem, Collection, CollectionDraft, Customer, CustomerError,
    CustomerProfile, NewUser, Order, OrderError, PaymentStatus, Product, ProductDraft, ProductImage, Promotion,
    PromotionDraft, Review, ReviewDraft, User,
};
use crate::domain::value_objects::{
    CartId, CartItemId, CollectionId, CustomerId, ImageId, OrderId, ProductId, PromotionId, ReviewId, UserId,
};

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The database driver failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The parent resource of a nested operation does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The request refers to something missing or breaks a domain rule.
    #[error("{0}")]
    Invalid(String),

    /// Another record still references the one being deleted.
    #[error("{0}")]
    Protected(String),

    /// A uniqueness constraint would be violated.
    #[error("{0}")]
    Conflict(String),

    /// Stored data could not be mapped back to the domain.
    #[error("Data corruption: {0}")]
    DataCorruption(String),
}

impl From<CatalogError> for RepositoryError {
    fn from(e: CatalogError) -> Self { Self::Protected(e.to_string()) }
}

impl From<CartError> for RepositoryError {
    fn from(e: CartError) -> Self { Self::Invalid(e.to_string()) }
}

impl From<OrderError> for RepositoryError {
    fn from(e: OrderError) -> Self { Self::Invalid(e.to_string()) }
}

impl From<CustomerError> for RepositoryError {
    fn from(e: CustomerError) -> Self {
        match e {
            CustomerError::HasOrders => Self::Protected(e.to_string()),
            CustomerError::UnknownUser => Self::Invalid(e.to_string()),
        }
    }
}

pub type RepoResult<T> = std::result::Result<T, RepositoryError>;

pub const NO_SUCH_PRODUCT: &str = "No product with that product ID exists";
pub const NO_SUCH_COLLECTION: &str = "No collection with that ID exists";
pub const NO_SUCH_PROMOTION: &str = "No promotion with that ID exists";
pub const NO_SUCH_CART: &str = "Cart not found";

/// Sort orders accepted by the product listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductOrdering {
    PriceAsc,
    PriceDesc,
    LastUpdateAsc,
    LastUpdateDesc,
}

impl ProductOrdering {
    /// Parses the `ordering` query value (`unit_price`, `-last_update`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unit_price" => Some(Self::PriceAsc),
            "-unit_price" => Some(Self::PriceDesc),
            "last_update" => Some(Self::LastUpdateAsc),
            "-last_update" => Some(Self::LastUpdateDesc),
            _ => None,
        }
    }
}

/// Filters, ordering and paging for the product listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub collection_id: Option<CollectionId>,
    pub price_above: Option<Decimal>,
    pub price_below: Option<Decimal>,
    pub ordering: Option<ProductOrdering>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            search: None,
            collection_id: None,
            price_above: None,
            price_below: None,
            ordering: None,
            page: 1,
            page_size: 10,
        }
    }
}

impl ProductQuery {
    pub fn offset(&self) -> i64 { i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size) }

    /// Case-insensitive substring match over title and description.
    pub fn matches_search(&self, title: &str, description: &str) -> bool {
        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                title.to_lowercase().contains(&term) || description.to_lowercase().contains(&term)
            }
            None => true,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool { i64::from(self.page) * i64::from(self.page_size) < self.total }
    pub fn has_previous(&self) -> bool { self.page > 1 }
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn list_collections(&self) -> RepoResult<Vec<Collection>>;
    async fn get_collection(&self, id: CollectionId) -> RepoResult<Option<Collection>>;
    async fn create_collection(&self, draft: &CollectionDraft) -> RepoResult<Collection>;
    async fn update_collection(&self, id: CollectionId, draft: &CollectionDraft) -> RepoResult<Option<Collection>>;
    /// Fails with [`RepositoryError::Protected`] while the collection features a product or holds products.
    async fn delete_collection(&self, id: CollectionId) -> RepoResult<bool>;

    async fn list_promotions(&self) -> RepoResult<Vec<Promotion>>;
    async fn get_promotion(&self, id: PromotionId) -> RepoResult<Option<Promotion>>;
    async fn create_promotion(&self, draft: &PromotionDraft) -> RepoResult<Promotion>;
    async fn update_promotion(&self, id: PromotionId, draft: &PromotionDraft) -> RepoResult<Option<Promotion>>;
    async fn delete_promotion(&self, id: PromotionId) -> RepoResult<bool>;

    async fn list_products(&self, query: &ProductQuery) -> RepoResult<Page<Product>>;
    async fn get_product(&self, id: ProductId) -> RepoResult<Option<Product>>;
    async fn create_product(&self, draft: &ProductDraft) -> RepoResult<Product>;
    async fn update_product(&self, id: ProductId, draft: &ProductDraft) -> RepoResult<Option<Product>>;
    /// Fails with [`RepositoryError::Protected`] while any order item references the product.
    async fn delete_product(&self, id: ProductId) -> RepoResult<bool>;

    async fn list_reviews(&self, product_id: ProductId) -> RepoResult<Vec<Review>>;
    async fn get_review(&self, product_id: ProductId, id: ReviewId) -> RepoResult<Option<Review>>;
    async fn create_review(&self, product_id: ProductId, draft: &ReviewDraft) -> RepoResult<Review>;
    async fn update_review(&self, product_id: ProductId, id: ReviewId, draft: &ReviewDraft) -> RepoResult<Option<Review>>;
    async fn delete_review(&self, product_id: ProductId, id: ReviewId) -> RepoResult<bool>;

    async fn list_images(&self, product_id: ProductId) -> RepoResult<Vec<ProductImage>>;
    async fn get_image(&self, product_id: ProductId, id: ImageId) -> RepoResult<Option<ProductImage>>;
    async fn create_image(&self, product_id: ProductId, image: &str) -> RepoResult<ProductImage>;
    async fn update_image(&self, product_id: ProductId, id: ImageId, image: &str) -> RepoResult<Option<ProductImage>>;
    async fn delete_image(&self, product_id: ProductId, id: ImageId) -> RepoResult<bool>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn create_cart(&self) -> RepoResult<Cart>;
    async fn get_cart(&self, id: CartId) -> RepoResult<Option<Cart>>;
    async fn delete_cart(&self, id: CartId) -> RepoResult<bool>;
    /// Adds a line, or grows the existing line for the same product.
    async fn add_cart_item(&self, cart_id: CartId, product_id: ProductId, quantity: i32) -> RepoResult<CartItem>;
    async fn update_cart_item(&self, cart_id: CartId, id: CartItemId, quantity: i32) -> RepoResult<Option<CartItem>>;
    async fn delete_cart_item(&self, cart_id: CartId, id: CartItemId) -> RepoResult<bool>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Turns the cart into an order for `customer_id` and removes the cart,
    /// all in one transaction. Nothing is written when the cart is missing or empty.
    async fn place_order(&self, cart_id: CartId, customer_id: CustomerId) -> RepoResult<Order>;
    /// Every order when `customer_id` is `None`.
    async fn list_orders(&self, customer_id: Option<CustomerId>) -> RepoResult<Vec<Order>>;
    async fn get_order(&self, id: OrderId) -> RepoResult<Option<Order>>;
    async fn update_payment_status(&self, id: OrderId, status: PaymentStatus) -> RepoResult<Option<Order>>;
    async fn delete_order(&self, id: OrderId) -> RepoResult<bool>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Fails with [`RepositoryError::Conflict`] when the username is taken.
    async fn create_user(&self, user: &NewUser) -> RepoResult<User>;
    async fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// The user and stored password hash for `username`.
    async fn find_credentials(&self, username: &str) -> RepoResult<Option<(User, String)>>;
    async fn store_token(&self, token: &str, user_id: UserId, expires_at: DateTime<Utc>) -> RepoResult<()>;
    async fn user_for_token(&self, token: &str, now: DateTime<Utc>) -> RepoResult<Option<User>>;
    /// Deletes tokens that expired at or before `now`, returning how many went.
    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> RepoResult<u64>;

    /// Creates the default customer for `user_id` unless one exists.
    async fn provision_customer(&self, user_id: UserId) -> RepoResult<Customer>;
    async fn list_customers(&self) -> RepoResult<Vec<Customer>>;
    async fn get_customer(&self, id: CustomerId) -> RepoResult<Option<Customer>>;
    async fn customer_for_user(&self, user_id: UserId) -> RepoResult<Option<Customer>>;
    /// Returns the user's existing customer untouched if there is one.
    async fn create_customer(&self, user_id: UserId, profile: &CustomerProfile) -> RepoResult<Customer>;
    async fn update_customer(&self, id: CustomerId, profile: &CustomerProfile) -> RepoResult<Option<Customer>>;
    /// Fails with [`RepositoryError::Protected`] while the customer has orders.
    async fn delete_customer(&self, id: CustomerId) -> RepoResult<bool>;
}

/// Everything the API needs from a backend.
#[async_trait]
pub trait Store: CatalogRepository + CartRepository + OrderRepository + AccountRepository {
    /// Cheap round trip used by the readiness probe.
    async fn ping(&self) -> RepoResult<()>;
}

/// Create a `PostgreSQL` connection pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
