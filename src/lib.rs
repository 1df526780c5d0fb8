//! OpenSASE Store - self-hosted store API
//!
//! ## Features
//! - Product catalog: collections, promotions, reviews and images
//! - Shopping carts keyed by generated ids
//! - Checkout turning a cart into an order in one transaction
//! - Customer profiles provisioned on signup
//! - Bearer-token accounts with staff and customer roles
//! - Domain events, optionally published to NATS

pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod notifications;
pub mod routes;
pub mod state;

pub use config::StoreConfig;
pub use error::{AppError, Result};
pub use state::AppState;
