//! Request extractors: the authenticated caller, plus JSON, query and path
//! wrappers whose rejections answer with the usual JSON error body.
//!
//! Tokens arrive as `Authorization: Bearer <jwt>`. The caller's role and
//! activity are re-read from the database on every request.

use crate::{
    errors::AppError, models::user::Principal, services::auth_service::AuthError,
    state::AppState,
};
use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::{header, request::Parts},
};
use serde::de::DeserializeOwned;

/// A signed-in, active caller.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Principal);

/// The caller if a token was sent. A token that is present but invalid is
/// still rejected.
#[derive(Debug, Clone, Copy)]
pub struct MaybeAuthUser(pub Option<Principal>);

/// A signed-in caller with the ADMIN role.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Principal);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AuthError> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| AuthError::InvalidToken)?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidToken)?;
    Ok(Some(token))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.ok_or(AuthError::MissingToken)?;
        let principal = state.auth.authenticate(token).await?;
        Ok(AuthUser(principal))
    }
}

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => Ok(MaybeAuthUser(Some(state.auth.authenticate(token).await?))),
            None => Ok(MaybeAuthUser(None)),
        }
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(principal) = AuthUser::from_request_parts(parts, state).await?;
        if !principal.is_admin() {
            return Err(AppError::forbidden("administrator access required"));
        }
        Ok(AdminUser(principal))
    }
}

/// `Json<T>` whose rejections become a 400 [`AppError`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

/// `Query<T>` whose rejections become a 400 [`AppError`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AppQuery<T>(pub T);

/// `Path<T>` whose rejections become a 400 [`AppError`].
#[derive(Debug, Clone, Copy)]
pub struct AppPath<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(AppJson(value))
    }
}

impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(AppQuery(value))
    }
}

impl<S, T> FromRequestParts<S> for AppPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(AppPath(value))
    }
}

/// 403 unless the caller is `user_id` or an admin.
pub fn ensure_acts_for(principal: &Principal, user_id: i64) -> Result<(), AppError> {
    if principal.acts_for(user_id) {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "not allowed to act for user {}",
            user_id
        )))
    }
}
