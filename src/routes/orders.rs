//! Order endpoints, including checkout of a cart.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::auth::{RequireAdmin, RequireUser, ValidatedJson};
use crate::domain::aggregates::{Order, OrderError, PaymentStatus, User};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{CartId, CustomerId, OrderId};
use crate::error::{AppError, Result};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/:order_id", get(get_order).patch(update_order).delete(delete_order))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub cart_id: CartId,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrderRequest {
    pub payment_status: PaymentStatus,
}

fn not_found() -> AppError {
    AppError::NotFound("Order not found.".to_owned())
}

/// Orders a user may see.
enum Visibility {
    Everything,
    /// Only the user's own customer's orders, if there is a customer.
    Own(Option<CustomerId>),
}

async fn visibility(state: &AppState, user: &User) -> Result<Visibility> {
    if user.is_staff {
        return Ok(Visibility::Everything);
    }
    let customer = state.store().customer_for_user(user.id).await?;
    Ok(Visibility::Own(customer.map(|c| c.id)))
}

async fn create_order(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ValidatedJson(body): ValidatedJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let store = state.store();
    let cart = store.get_cart(body.cart_id).await?.ok_or(OrderError::CartNotFound).map_err(bad_request)?;
    if cart.is_empty() {
        return Err(bad_request(OrderError::EmptyCart));
    }
    let customer = store
        .customer_for_user(user.id)
        .await?
        .ok_or(OrderError::CustomerNotFound)
        .map_err(bad_request)?;

    let order = store.place_order(cart.id, customer.id).await?;
    tracing::info!(order_id = %order.id, customer_id = %customer.id, items = order.item_count(), "order placed");

    let event = DomainEvent::OrderCreated { order_id: order.id, customer_id: customer.id, item_count: order.item_count() };
    state.events().dispatch_robust(&event).await;

    Ok((StatusCode::CREATED, Json(order)))
}

fn bad_request(e: OrderError) -> AppError {
    AppError::BadRequest(e.to_string())
}

async fn list_orders(State(state): State<AppState>, RequireUser(user): RequireUser) -> Result<Json<Vec<Order>>> {
    let orders = match visibility(&state, &user).await? {
        Visibility::Everything => state.store().list_orders(None).await?,
        Visibility::Own(Some(customer_id)) => state.store().list_orders(Some(customer_id)).await?,
        Visibility::Own(None) => vec![],
    };
    Ok(Json(orders))
}

async fn get_order(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = state.store().get_order(id).await?.ok_or_else(not_found)?;
    match visibility(&state, &user).await? {
        Visibility::Own(own) if own != Some(order.customer_id) => Err(not_found()),
        _ => Ok(Json(order)),
    }
}

async fn update_order(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<OrderId>,
    ValidatedJson(body): ValidatedJson<UpdateOrderRequest>,
) -> Result<Json<Order>> {
    let order = state.store().update_payment_status(id, body.payment_status).await?.ok_or_else(not_found)?;
    tracing::info!(order_id = %id, status = body.payment_status.code(), "payment status updated");
    Ok(Json(order))
}

async fn delete_order(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<StatusCode> {
    if !state.store().delete_order(id).await? {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
