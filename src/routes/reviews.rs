//! Product review endpoints, nested under a product.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::auth::{RequireUser, ValidatedJson};
use crate::domain::aggregates::{Review, ReviewDraft};
use crate::domain::value_objects::{ProductId, ReviewId};
use crate::error::{AppError, Result};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products/:product_id/reviews", get(list_reviews).post(create_review))
        .route(
            "/products/:product_id/reviews/:review_id",
            get(get_review).put(update_review).delete(delete_review),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1))]
    pub description: String,
}

impl From<ReviewRequest> for ReviewDraft {
    fn from(r: ReviewRequest) -> Self {
        Self { name: r.name, description: r.description }
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Review not found.".to_owned())
}

async fn list_reviews(State(state): State<AppState>, Path(product_id): Path<ProductId>) -> Result<Json<Vec<Review>>> {
    if state.store().get_product(product_id).await?.is_none() {
        return Err(AppError::NotFound("Product not found.".to_owned()));
    }
    Ok(Json(state.store().list_reviews(product_id).await?))
}

async fn get_review(
    State(state): State<AppState>,
    Path((product_id, id)): Path<(ProductId, ReviewId)>,
) -> Result<Json<Review>> {
    Ok(Json(state.store().get_review(product_id, id).await?.ok_or_else(not_found)?))
}

async fn create_review(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product_id): Path<ProductId>,
    ValidatedJson(body): ValidatedJson<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    let review = state.store().create_review(product_id, &body.into()).await?;
    tracing::debug!(review_id = %review.id, %product_id, user_id = %user.id, "review created");
    Ok((StatusCode::CREATED, Json(review)))
}

async fn update_review(
    State(state): State<AppState>,
    RequireUser(_): RequireUser,
    Path((product_id, id)): Path<(ProductId, ReviewId)>,
    ValidatedJson(body): ValidatedJson<ReviewRequest>,
) -> Result<Json<Review>> {
    Ok(Json(state.store().update_review(product_id, id, &body.into()).await?.ok_or_else(not_found)?))
}

async fn delete_review(
    State(state): State<AppState>,
    RequireUser(_): RequireUser,
    Path((product_id, id)): Path<(ProductId, ReviewId)>,
) -> Result<StatusCode> {
    if !state.store().delete_review(product_id, id).await? {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
