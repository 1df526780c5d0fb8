//! Signup, token issue and the current user.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::auth::{self, IssuedToken, Registration, RequireUser, ValidatedJson};
use crate::domain::aggregates::User;
use crate::error::Result;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/users", post(register))
        .route("/auth/users/me", get(me))
        .route("/auth/tokens", post(create_token))
}

#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

async fn register(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<Registration>,
) -> Result<(StatusCode, Json<User>)> {
    let user = auth::register_user(state.store(), state.events(), body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn create_token(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<TokenRequest>,
) -> Result<(StatusCode, Json<IssuedToken>)> {
    let token = auth::issue_token(state.store(), &body.username, &body.password, state.config().token_ttl()).await?;
    Ok((StatusCode::CREATED, Json(token)))
}

async fn me(RequireUser(user): RequireUser) -> Json<User> {
    Json(user)
}
