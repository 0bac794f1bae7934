//! API middleware

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{info, warn};

use crate::auth::{Capability, Claims};
use crate::error::ApiError;

/// Secret used to verify bearer tokens
#[derive(Clone)]
pub struct AuthKey(pub String);

/// Authentication middleware
///
/// Validates JWT tokens and extracts user claims
pub async fn auth_middleware(
    State(AuthKey(secret)): State<AuthKey>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "));

    let Some(token) = token else {
        warn!("Missing or invalid Authorization header");
        return ApiError::Unauthorized.into_response();
    };

    match crate::auth::validate_token(token, &secret) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            warn!(error = %e, "Token validation failed");
            ApiError::Unauthorized.into_response()
        }
    }
}

/// Capability gate for one route group
///
/// Runs inside [`auth_middleware`], so claims are always present on
/// an authenticated request.
pub async fn capability_gate(
    State(capability): State<Capability>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let allowed = request
        .extensions()
        .get::<Claims>()
        .map(|claims| claims.can(capability))
        .unwrap_or(false);

    if !allowed {
        let user = request
            .extensions()
            .get::<Claims>()
            .map(|c| c.sub.as_str())
            .unwrap_or("anonymous");
        warn!(user = %user, capability = %capability, "capability denied");
        return ApiError::Forbidden(format!("requires {}", capability)).into_response();
    }

    next.run(request).await
}

/// Audit logging middleware
///
/// Logs every API request with its caller, outcome and request id
pub async fn audit_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let user_id = request
        .extensions()
        .get::<Claims>()
        .map(|c| c.sub.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    let start = Utc::now();

    let response = next.run(request).await;

    let duration = Utc::now() - start;
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        request_id = %request_id,
        user = %user_id,
        status = %status.as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}
