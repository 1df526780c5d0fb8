//! Customer profile endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use crate::auth::{RequireAdmin, RequireUser, ValidatedJson};
use crate::domain::aggregates::{Customer, CustomerProfile, Membership};
use crate::domain::value_objects::{CustomerId, UserId};
use crate::error::{AppError, Result};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list_customers).post(create_customer))
        .route("/customers/me", get(get_me).put(update_me))
        .route(
            "/customers/:customer_id",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileRequest {
    #[serde(default)]
    #[validate(length(max = 255))]
    pub phone: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub membership: Membership,
}

impl From<ProfileRequest> for CustomerProfile {
    fn from(r: ProfileRequest) -> Self {
        Self { phone: r.phone, birth_date: r.birth_date, membership: r.membership }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    pub user_id: UserId,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub phone: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub membership: Membership,
}

fn not_found() -> AppError {
    AppError::NotFound("Customer not found.".to_owned())
}

async fn list_customers(State(state): State<AppState>, RequireAdmin(_): RequireAdmin) -> Result<Json<Vec<Customer>>> {
    Ok(Json(state.store().list_customers().await?))
}

async fn get_customer(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<CustomerId>,
) -> Result<Json<Customer>> {
    Ok(Json(state.store().get_customer(id).await?.ok_or_else(not_found)?))
}

async fn create_customer(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ValidatedJson(body): ValidatedJson<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<Customer>)> {
    let profile = CustomerProfile { phone: body.phone, birth_date: body.birth_date, membership: body.membership };
    let customer = state.store().create_customer(body.user_id, &profile).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

async fn update_customer(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<CustomerId>,
    ValidatedJson(body): ValidatedJson<ProfileRequest>,
) -> Result<Json<Customer>> {
    Ok(Json(state.store().update_customer(id, &body.into()).await?.ok_or_else(not_found)?))
}

async fn delete_customer(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<CustomerId>,
) -> Result<StatusCode> {
    if !state.store().delete_customer(id).await? {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn get_me(State(state): State<AppState>, RequireUser(user): RequireUser) -> Result<Json<Customer>> {
    Ok(Json(state.store().customer_for_user(user.id).await?.ok_or_else(not_found)?))
}

async fn update_me(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ValidatedJson(body): ValidatedJson<ProfileRequest>,
) -> Result<Json<Customer>> {
    let customer = state.store().customer_for_user(user.id).await?.ok_or_else(not_found)?;
    Ok(Json(state.store().update_customer(customer.id, &body.into()).await?.ok_or_else(not_found)?))
}
