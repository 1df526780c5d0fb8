//! Collection endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::auth::{RequireAdmin, ValidatedJson};
use crate::domain::aggregates::{Collection, CollectionDraft};
use crate::domain::value_objects::{CollectionId, ProductId};
use crate::error::{AppError, Result};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/collections", get(list_collections).post(create_collection))
        .route(
            "/collections/:collection_id",
            get(get_collection).put(update_collection).delete(delete_collection),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct CollectionRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default)]
    pub featured_product: Option<ProductId>,
}

impl From<CollectionRequest> for CollectionDraft {
    fn from(r: CollectionRequest) -> Self {
        Self { title: r.title, featured_product: r.featured_product }
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Collection not found.".to_owned())
}

async fn list_collections(State(state): State<AppState>) -> Result<Json<Vec<Collection>>> {
    Ok(Json(state.store().list_collections().await?))
}

async fn get_collection(State(state): State<AppState>, Path(id): Path<CollectionId>) -> Result<Json<Collection>> {
    let collection = state.store().get_collection(id).await?.ok_or_else(not_found)?;
    Ok(Json(collection))
}

async fn create_collection(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ValidatedJson(body): ValidatedJson<CollectionRequest>,
) -> Result<(StatusCode, Json<Collection>)> {
    let collection = state.store().create_collection(&body.into()).await?;
    Ok((StatusCode::CREATED, Json(collection)))
}

async fn update_collection(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<CollectionId>,
    ValidatedJson(body): ValidatedJson<CollectionRequest>,
) -> Result<Json<Collection>> {
    let collection = state.store().update_collection(id, &body.into()).await?.ok_or_else(not_found)?;
    Ok(Json(collection))
}

async fn delete_collection(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<CollectionId>,
) -> Result<StatusCode> {
    if !state.store().delete_collection(id).await? {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
