//! Cart and cart item endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::{RequireUser, ValidatedJson};
use crate::db::NO_SUCH_CART;
use crate::domain::aggregates::{Cart, CartItem, ProductSummary};
use crate::domain::value_objects::{CartId, CartItemId, ProductId};
use crate::error::{AppError, Result};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/carts", post(create_cart))
        .route("/carts/:cart_id", get(get_cart).delete(delete_cart))
        .route("/carts/:cart_id/items", get(list_items).post(add_item))
        .route(
            "/carts/:cart_id/items/:item_id",
            get(get_item).put(update_item).patch(update_item).delete(delete_item),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[validate(range(min = 1, max = 32767))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(range(min = 1, max = 32767))]
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CartItemResponse {
    pub id: CartItemId,
    pub product: ProductSummary,
    pub quantity: i32,
    pub item_total_price: Decimal,
}

impl From<CartItem> for CartItemResponse {
    fn from(item: CartItem) -> Self {
        Self { item_total_price: item.total_price(), id: item.id, product: item.product, quantity: item.quantity }
    }
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub id: CartId,
    pub items: Vec<CartItemResponse>,
    pub cart_total_price: Decimal,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            cart_total_price: cart.total_price(),
            id: cart.id,
            items: cart.items.into_iter().map(CartItemResponse::from).collect(),
        }
    }
}

fn cart_not_found() -> AppError {
    AppError::NotFound(NO_SUCH_CART.to_owned())
}

fn item_not_found() -> AppError {
    AppError::NotFound("Cart item not found.".to_owned())
}

async fn create_cart(
    State(state): State<AppState>,
    RequireUser(_): RequireUser,
) -> Result<(StatusCode, Json<CartResponse>)> {
    let cart = state.store().create_cart().await?;
    tracing::debug!(cart_id = %cart.id, "cart created");
    Ok((StatusCode::CREATED, Json(cart.into())))
}

async fn get_cart(
    State(state): State<AppState>,
    RequireUser(_): RequireUser,
    Path(id): Path<CartId>,
) -> Result<Json<CartResponse>> {
    let cart = state.store().get_cart(id).await?.ok_or_else(cart_not_found)?;
    Ok(Json(cart.into()))
}

async fn delete_cart(
    State(state): State<AppState>,
    RequireUser(_): RequireUser,
    Path(id): Path<CartId>,
) -> Result<StatusCode> {
    if !state.store().delete_cart(id).await? {
        return Err(cart_not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_items(
    State(state): State<AppState>,
    RequireUser(_): RequireUser,
    Path(cart_id): Path<CartId>,
) -> Result<Json<Vec<CartItemResponse>>> {
    let cart = state.store().get_cart(cart_id).await?.ok_or_else(cart_not_found)?;
    Ok(Json(cart.items.into_iter().map(CartItemResponse::from).collect()))
}

async fn get_item(
    State(state): State<AppState>,
    RequireUser(_): RequireUser,
    Path((cart_id, id)): Path<(CartId, CartItemId)>,
) -> Result<Json<CartItemResponse>> {
    let cart = state.store().get_cart(cart_id).await?.ok_or_else(cart_not_found)?;
    let item = cart.items.into_iter().find(|i| i.id == id).ok_or_else(item_not_found)?;
    Ok(Json(item.into()))
}

async fn add_item(
    State(state): State<AppState>,
    RequireUser(_): RequireUser,
    Path(cart_id): Path<CartId>,
    ValidatedJson(body): ValidatedJson<AddItemRequest>,
) -> Result<(StatusCode, Json<CartItemResponse>)> {
    let item = state.store().add_cart_item(cart_id, body.product_id, body.quantity).await?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

async fn update_item(
    State(state): State<AppState>,
    RequireUser(_): RequireUser,
    Path((cart_id, id)): Path<(CartId, CartItemId)>,
    ValidatedJson(body): ValidatedJson<UpdateItemRequest>,
) -> Result<Json<CartItemResponse>> {
    let item = state.store().update_cart_item(cart_id, id, body.quantity).await?.ok_or_else(item_not_found)?;
    Ok(Json(item.into()))
}

async fn delete_item(
    State(state): State<AppState>,
    RequireUser(_): RequireUser,
    Path((cart_id, id)): Path<(CartId, CartItemId)>,
) -> Result<StatusCode> {
    if !state.store().delete_cart_item(cart_id, id).await? {
        return Err(item_not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
