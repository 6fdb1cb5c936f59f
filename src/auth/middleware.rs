//! Authentication Middleware
//!
//! Axum middleware for JWT token validation and user authentication.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::auth::{jwt::JwtService, models::AuthUser};
use crate::error::ApiError;

/// Authentication middleware that validates JWT tokens and injects user info
pub struct AuthMiddleware;

impl AuthMiddleware {
    /// Middleware function for validating JWT tokens
    pub async fn validate_token(
        State(jwt_service): State<Arc<JwtService>>,
        mut req: Request,
        next: Next,
    ) -> Result<Response, ApiError> {
        tracing::debug!("[AuthMiddleware] Incoming request: {} {}", req.method(), req.uri());

        let token = extract_token(&req).ok_or_else(|| {
            tracing::warn!("[AuthMiddleware] Missing Authorization header and access_token cookie");
            ApiError::Unauthorized("Missing access token".to_string())
        })?;

        let claims = match jwt_service.validate_token(&token) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::warn!("[AuthMiddleware] JWT validation failed: {:?}", e);
                return Err(ApiError::Unauthorized("Invalid access token".to_string()));
            }
        };

        let auth_user = AuthUser {
            id: claims.sub,
            email: claims.email,
        };
        tracing::debug!("[AuthMiddleware] AuthUser injected: id={}", auth_user.id);

        req.extensions_mut().insert(auth_user);

        Ok(next.run(req).await)
    }
}

/// Bearer token from the Authorization header, or the `access_token` cookie.
fn extract_token(req: &Request) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    bearer.or_else(|| {
        CookieJar::from_headers(req.headers())
            .get("access_token")
            .map(|cookie| cookie.value().to_string())
    })
}
