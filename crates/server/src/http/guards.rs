//! Request gates applied in front of every handler.

use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::{CookieJar, TypedHeader};
use axum_extra::headers::authorization::Basic;
use axum_extra::headers::Authorization;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{AppState, MUTATING_ROUTES};
use crate::auth::TOKEN_COOKIE;
use crate::error::ApiError;

/// Refuse modifying routes on a read-only server.
pub async fn reject_when_readonly(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.readonly && MUTATING_ROUTES.contains(&request.uri().path()) {
        warn!(path = %request.uri().path(), "modifying request refused in read-only mode");
        return Err(ApiError::ReadOnly);
    }
    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    token: Option<String>,
}

/// Let a request through if it carries the token in its query string or
/// cookie, or valid basic-auth credentials.
///
/// A correct query token also sets the token cookie, so links followed
/// after the first page load stay authenticated.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<TokenQuery>,
    basic: Option<TypedHeader<Authorization<Basic>>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = query.token {
        if state.auth.check_token(&token) {
            let response = next.run(request).await;
            let cookie = Cookie::build((TOKEN_COOKIE, token)).path("/").http_only(true);
            return Ok((jar.add(cookie), response).into_response());
        }
    }

    if jar
        .get(TOKEN_COOKIE)
        .is_some_and(|cookie| state.auth.check_token(cookie.value()))
    {
        return Ok(next.run(request).await);
    }

    if let Some(TypedHeader(credentials)) = basic {
        if state.auth.check_user(credentials.username(), credentials.password()) {
            return Ok(next.run(request).await);
        }
    }

    debug!(path = %request.uri().path(), "rejecting unauthenticated request");
    Err(ApiError::Unauthorized)
}
