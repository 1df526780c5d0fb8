//! Authentication middleware and extractors.
//!
//! [`authenticate`] resolves a bearer token once per request and stores the
//! [`User`] in the request extensions; the extractors below read it from there.

use axum::{
    extract::{FromRequest, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Json,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use validator::Validate;

use super::AuthError;
use crate::domain::aggregates::User;
use crate::error::AppError;
use crate::state::AppState;

fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| Some(t.to_owned()))
        .ok_or(AuthError::InvalidToken)
}

/// Middleware resolving `Authorization: Bearer <token>`.
///
/// A request without the header passes through anonymously; a token that
/// does not resolve to a live session is rejected with 401 on every route.
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, AppError> {
    if let Some(token) = bearer_token(request.headers())? {
        let user = state
            .store()
            .user_for_token(&token, Utc::now())
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::InvalidToken)?;
        request.extensions_mut().insert(user);
    }
    Ok(next.run(request).await)
}

/// The caller, if the request was authenticated.
pub struct OptionalUser(pub Option<User>);

/// Extractor that requires an authenticated user.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct RequireUser(pub User);

/// Extractor that requires a staff user.
pub struct RequireAdmin(pub User);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<User>().cloned()))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let OptionalUser(user) = OptionalUser::from_request_parts(parts, state).await?;
        Ok(Self(user.ok_or(AuthError::MissingCredentials)?))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(AuthError::NotStaff.into());
        }
        Ok(Self(user))
    }
}

/// JSON body that has passed `validator` checks.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&HeaderMap::new()).unwrap(), None);
        assert_eq!(bearer_token(&headers("Bearer abc")).unwrap().as_deref(), Some("abc"));
        assert!(matches!(bearer_token(&headers("Basic abc")), Err(AuthError::InvalidToken)));
        assert!(matches!(bearer_token(&headers("Bearer ")), Err(AuthError::InvalidToken)));
    }
}
