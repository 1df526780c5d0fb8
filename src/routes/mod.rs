//! HTTP routes.
//!
//! Each resource module exposes a `router()`; they are merged here with the
//! health probes, token authentication and the tracing/CORS layers.

mod accounts;
mod carts;
mod collections;
mod customers;
mod images;
mod orders;
mod products;
mod promotions;
mod reviews;

use axum::{extract::State, http::StatusCode, middleware, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth;
use crate::db::Page;
use crate::state::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .merge(products::router())
        .merge(reviews::router())
        .merge(images::router())
        .merge(collections::router())
        .merge(promotions::router())
        .merge(carts::router())
        .merge(customers::router())
        .merge(orders::router())
        .merge(accounts::router())
        .layer(middleware::from_fn_with_state(state.clone(), auth::authenticate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "service": "opensase-store" }))
}

async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    match state.store().ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "unavailable" })))
        }
    }
}

/// One page of a listing, with the neighbouring page numbers.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub next_page: Option<u32>,
    pub previous_page: Option<u32>,
}

impl<T> PaginatedResponse<T> {
    pub fn from_page<U>(page: Page<U>, f: impl FnMut(U) -> T) -> Self {
        Self {
            next_page: page.has_next().then_some(page.page + 1),
            previous_page: page.has_previous().then(|| page.page - 1),
            data: page.items.into_iter().map(f).collect(),
            total: page.total,
            page: page.page,
        }
    }
}
