//! Promotion endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::auth::{RequireAdmin, ValidatedJson};
use crate::domain::aggregates::{Promotion, PromotionDraft};
use crate::domain::value_objects::PromotionId;
use crate::error::{AppError, Result};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/promotions", get(list_promotions).post(create_promotion))
        .route(
            "/promotions/:promotion_id",
            get(get_promotion).put(update_promotion).delete(delete_promotion),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct PromotionRequest {
    #[validate(length(min = 1, max = 255))]
    pub description: String,
    #[validate(range(min = 0.0))]
    pub discount: f64,
}

impl From<PromotionRequest> for PromotionDraft {
    fn from(r: PromotionRequest) -> Self {
        Self { description: r.description, discount: r.discount }
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Promotion not found.".to_owned())
}

async fn list_promotions(State(state): State<AppState>) -> Result<Json<Vec<Promotion>>> {
    Ok(Json(state.store().list_promotions().await?))
}

async fn get_promotion(State(state): State<AppState>, Path(id): Path<PromotionId>) -> Result<Json<Promotion>> {
    Ok(Json(state.store().get_promotion(id).await?.ok_or_else(not_found)?))
}

async fn create_promotion(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ValidatedJson(body): ValidatedJson<PromotionRequest>,
) -> Result<(StatusCode, Json<Promotion>)> {
    let promotion = state.store().create_promotion(&body.into()).await?;
    Ok((StatusCode::CREATED, Json(promotion)))
}

async fn update_promotion(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<PromotionId>,
    ValidatedJson(body): ValidatedJson<PromotionRequest>,
) -> Result<Json<Promotion>> {
    Ok(Json(state.store().update_promotion(id, &body.into()).await?.ok_or_else(not_found)?))
}

async fn delete_promotion(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<PromotionId>,
) -> Result<StatusCode> {
    if !state.store().delete_promotion(id).await? {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
