use crate::auth::jwt::TokenVerifier;
use crate::router::Middleware;
use crate::types::{AppError, Claims};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Returns the token of an `Authorization: Bearer <token>` header.
///
/// The header is split on single spaces; the second segment is returned only
/// when the first one is exactly `Bearer`. Anything else yields `None`.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut segments = value.split(' ');

    if segments.next()? != "Bearer" {
        return None;
    }

    segments.next().filter(|token| !token.is_empty())
}

/// Verifies the bearer token (if any) and stores the claims in the request.
///
/// A missing token is an error only when `credentials_required` is set;
/// a token that fails verification is always rejected.
pub async fn verify_request(
    verifier: Arc<TokenVerifier>,
    credentials_required: bool,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = match extract_bearer_token(req.headers()) {
        Some(token) => Some(verifier.verify(token)?),
        None if credentials_required => return Err(AppError::credentials_required()),
        None => None,
    };

    if let Some(claims) = claims {
        req.extensions_mut().insert(claims);
    }

    Ok(next.run(req).await)
}

/// Middleware rejecting requests without a valid bearer token.
pub fn required(verifier: Arc<TokenVerifier>) -> Middleware {
    Middleware::from_fn("auth:required", move |req: Request, next: Next| {
        verify_request(verifier.clone(), true, req, next)
    })
}

/// Middleware parsing a bearer token when one is sent, without requiring it.
pub fn optional(verifier: Arc<TokenVerifier>) -> Middleware {
    Middleware::from_fn("auth:optional", move |req: Request, next: Next| {
        verify_request(verifier.clone(), false, req, next)
    })
}

/// Extractor for the claims placed in the request by the auth middlewares.
///
/// Use `Option<AuthUser>` on routes where authentication is optional.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(AppError::credentials_required)
    }
}

impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Claims>().cloned().map(AuthUser))
    }
}
