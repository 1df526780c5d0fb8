//! Product catalog endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::PaginatedResponse;
use crate::auth::{RequireAdmin, ValidatedJson};
use crate::db::{ProductOrdering, ProductQuery};
use crate::domain::aggregates::{Product, ProductDraft};
use crate::domain::value_objects::{validate_unit_price, CollectionId, ProductId, PromotionId};
use crate::error::{AppError, Result};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/:product_id", get(get_product).put(update_product).delete(delete_product))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub collection_id: Option<CollectionId>,
    #[serde(rename = "unit_price__gt")]
    pub unit_price_gt: Option<Decimal>,
    #[serde(rename = "unit_price__lt")]
    pub unit_price_lt: Option<Decimal>,
    pub page: Option<u32>,
}

impl ListParams {
    fn into_query(self, page_size: u32) -> Result<ProductQuery> {
        let ordering = match self.ordering.as_deref() {
            None | Some("") => None,
            Some(value) => Some(
                ProductOrdering::parse(value)
                    .ok_or_else(|| AppError::BadRequest(format!("Unsupported ordering: {value}")))?,
            ),
        };
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(AppError::BadRequest("Invalid page.".to_owned()));
        }
        Ok(ProductQuery {
            search: self.search.filter(|s| !s.trim().is_empty()),
            collection_id: self.collection_id,
            price_above: self.unit_price_gt,
            price_below: self.unit_price_lt,
            ordering,
            page,
            page_size,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 255))]
    pub slug: Option<String>,
    #[validate(range(min = 0, max = 32767))]
    pub inventory: i32,
    #[validate(custom = "validate_unit_price")]
    pub unit_price: Decimal,
    pub collection: CollectionId,
    #[serde(default)]
    pub promotions: Vec<PromotionId>,
}

impl From<ProductRequest> for ProductDraft {
    fn from(r: ProductRequest) -> Self {
        Self {
            title: r.title,
            description: r.description,
            slug: r.slug,
            inventory: r.inventory,
            unit_price: r.unit_price,
            collection: r.collection,
            promotions: r.promotions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub price_with_tax: Decimal,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self { price_with_tax: product.price_with_tax(), product }
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Product not found.".to_owned())
}

async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<PaginatedResponse<ProductResponse>>> {
    let query = params.into_query(state.config().page_size)?;
    let page = state.store().list_products(&query).await?;
    Ok(Json(PaginatedResponse::from_page(page, ProductResponse::from)))
}

async fn get_product(State(state): State<AppState>, Path(id): Path<ProductId>) -> Result<Json<ProductResponse>> {
    let product = state.store().get_product(id).await?.ok_or_else(not_found)?;
    Ok(Json(product.into()))
}

async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ValidatedJson(body): ValidatedJson<ProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>)> {
    let product = state.store().create_product(&body.into()).await?;
    tracing::info!(product_id = %product.id, "product created");
    Ok((StatusCode::CREATED, Json(product.into())))
}

async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
    ValidatedJson(body): ValidatedJson<ProductRequest>,
) -> Result<Json<ProductResponse>> {
    let product = state.store().update_product(id, &body.into()).await?.ok_or_else(not_found)?;
    Ok(Json(product.into()))
}

async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    if !state.store().delete_product(id).await? {
        return Err(not_found());
    }
    tracing::info!(product_id = %id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(ordering: Option<&str>, page: Option<u32>) -> ListParams {
        ListParams {
            search: Some("  ".into()),
            ordering: ordering.map(str::to_owned),
            collection_id: None,
            unit_price_gt: None,
            unit_price_lt: None,
            page,
        }
    }

    #[test]
    fn test_list_params_into_query() {
        let q = params(Some("-last_update"), Some(2)).into_query(25).unwrap();
        assert_eq!(q.ordering, Some(ProductOrdering::LastUpdateDesc));
        assert_eq!(q.page, 2);
        assert_eq!(q.page_size, 25);
        assert_eq!(q.search, None);
    }

    #[test]
    fn test_list_params_rejects_unknown_ordering_and_page_zero() {
        assert!(params(Some("title"), None).into_query(10).is_err());
        assert!(params(None, Some(0)).into_query(10).is_err());
    }
}
