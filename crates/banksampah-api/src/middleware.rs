use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use banksampah_core::security::{AuthContext, TokenKind};
use chrono::Utc;

use crate::{metrics::HTTP_REQUESTS_TOTAL, ApiError, AppState};

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Rejects requests without a valid access token for a live session and
/// attaches the caller's [`AuthContext`] to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req)
        .ok_or_else(|| ApiError::unauthorized("Authorization token is required."))?;
    let claims = state.jwt.validate(token, TokenKind::Access)?;

    // Access tokens die with their session (logout, refresh reuse, expiry).
    let now = Utc::now();
    let session = state.store.get_session(&claims.sid).await?;
    if !session.is_some_and(|s| !s.revoked && s.expires_at > now) {
        return Err(ApiError::unauthorized("Session is no longer active."));
    }

    req.extensions_mut().insert(AuthContext::from(claims));
    Ok(next.run(req).await)
}

pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

pub async fn record_metrics(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let response = next.run(req).await;
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), response.status().as_str()])
        .inc();
    response
}
