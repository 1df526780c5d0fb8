//! Product image endpoints, nested under a product. Images are stored as
//! URL or path references.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::auth::{RequireAdmin, ValidatedJson};
use crate::domain::aggregates::ProductImage;
use crate::domain::value_objects::{ImageId, ProductId};
use crate::error::{AppError, Result};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products/:product_id/images", get(list_images).post(create_image))
        .route(
            "/products/:product_id/images/:image_id",
            get(get_image).put(update_image).delete(delete_image),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct ImageRequest {
    #[validate(length(min = 1, max = 255))]
    pub image: String,
}

fn not_found() -> AppError {
    AppError::NotFound("Image not found.".to_owned())
}

async fn list_images(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Vec<ProductImage>>> {
    if state.store().get_product(product_id).await?.is_none() {
        return Err(AppError::NotFound("Product not found.".to_owned()));
    }
    Ok(Json(state.store().list_images(product_id).await?))
}

async fn get_image(
    State(state): State<AppState>,
    Path((product_id, id)): Path<(ProductId, ImageId)>,
) -> Result<Json<ProductImage>> {
    Ok(Json(state.store().get_image(product_id, id).await?.ok_or_else(not_found)?))
}

async fn create_image(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(product_id): Path<ProductId>,
    ValidatedJson(body): ValidatedJson<ImageRequest>,
) -> Result<(StatusCode, Json<ProductImage>)> {
    let image = state.store().create_image(product_id, &body.image).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

async fn update_image(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path((product_id, id)): Path<(ProductId, ImageId)>,
    ValidatedJson(body): ValidatedJson<ImageRequest>,
) -> Result<Json<ProductImage>> {
    Ok(Json(state.store().update_image(product_id, id, &body.image).await?.ok_or_else(not_found)?))
}

async fn delete_image(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path((product_id, id)): Path<(ProductId, ImageId)>,
) -> Result<StatusCode> {
    if !state.store().delete_image(product_id, id).await? {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
