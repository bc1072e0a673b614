use axum::{extract::State, http::StatusCode, Json};
use banksampah_core::{
    new_id,
    security::{
        hash_password, verify_password, SecurityError, SecurityEvent, SecurityLogger, TokenKind,
        TokenPair,
    },
    NewUser, Session, SessionRotation, User,
};
use serde::{Deserialize, Serialize};

use crate::{
    handlers::required, metrics::LOGIN_FAILURES_TOTAL, ApiError, ApiJson, ApiResult, AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub message: String,
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl TokenResponse {
    fn new(message: &str, user: &User, pair: TokenPair) -> Self {
        Self {
            message: message.to_string(),
            user_id: user.id.clone(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: pair.expires_in,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Argon2 is CPU bound; keep it off the async workers.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, SecurityError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let (Some(email), Some(password), Some(confirm), Some(username)) = (
        required(&req.email),
        req.password.filter(|p| !p.is_empty()),
        req.confirm_password.filter(|p| !p.is_empty()),
        required(&req.username),
    ) else {
        return Err(ApiError::validation(
            "All fields (email, password, confirm password, and username) are required.",
        ));
    };

    if password != confirm {
        return Err(ApiError::validation("Passwords do not match."));
    }

    let password_hash = blocking(move || hash_password(&password)).await?;
    let user = state
        .store
        .insert_user(NewUser {
            email,
            username,
            password_hash,
        })
        .await?;

    SecurityLogger::log_event(SecurityEvent::Registered {
        user_id: user.id.clone(),
        username: user.username.clone(),
    });

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User added".to_string(),
            user_id: user.id,
        }),
    ))
}

fn login_failure(username: &str, reason: &str) -> ApiError {
    LOGIN_FAILURES_TOTAL.inc();
    SecurityLogger::log_event(SecurityEvent::LoginFailure {
        username: username.to_string(),
        reason: reason.to_string(),
    });
    ApiError::from(SecurityError::InvalidCredentials)
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let (Some(username), Some(password)) = (
        required(&req.username),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::validation("Username and password must be provided."));
    };

    if state
        .login_limiter
        .check_key(&username.to_lowercase())
        .is_err()
    {
        LOGIN_FAILURES_TOTAL.inc();
        SecurityLogger::log_event(SecurityEvent::LoginThrottled {
            username: username.clone(),
        });
        return Err(ApiError::TooManyRequests(
            "Too many login attempts. Please try again later.".to_string(),
        ));
    }

    let Some(user) = state.store.find_user_by_username(&username).await? else {
        return Err(login_failure(&username, "unknown user"));
    };

    let hash = user.password_hash.clone();
    if !blocking(move || verify_password(&password, &hash)).await? {
        return Err(login_failure(&username, "wrong password"));
    }

    let session_id = new_id();
    let pair = state.jwt.issue_pair(&user, &session_id)?;
    state
        .store
        .insert_session(Session {
            id: session_id.clone(),
            user_id: user.id.clone(),
            refresh_jti: pair.refresh_jti.clone(),
            expires_at: pair.refresh_expires_at,
            revoked: false,
        })
        .await?;

    SecurityLogger::log_event(SecurityEvent::LoginSuccess {
        user_id: user.id.clone(),
        session_id,
    });

    Ok(Json(TokenResponse::new("Login successful", &user, pair)))
}

/// Exchanges a refresh token for a new pair. Each refresh token is single
/// use; presenting a rotated one revokes the whole session.
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let token = required(&req.refresh_token)
        .ok_or_else(|| ApiError::validation("Refresh token must be provided."))?;
    let claims = state.jwt.validate(&token, TokenKind::Refresh)?;

    let user = state
        .store
        .get_user(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Session is no longer active."))?;

    let pair = state.jwt.issue_pair(&user, &claims.sid)?;
    let rotation = state
        .store
        .rotate_session(
            &claims.sid,
            &claims.jti,
            pair.refresh_jti.clone(),
            pair.refresh_expires_at,
        )
        .await?;

    match rotation {
        SessionRotation::Rotated => Ok(Json(TokenResponse::new("Token refreshed", &user, pair))),
        SessionRotation::Reused => {
            SecurityLogger::log_event(SecurityEvent::RefreshTokenReuse {
                user_id: user.id,
                session_id: claims.sid,
            });
            Err(ApiError::unauthorized("Refresh token has already been used."))
        }
        SessionRotation::Inactive => Err(ApiError::unauthorized("Session is no longer active.")),
    }
}

pub async fn logout(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let token = required(&req.refresh_token)
        .ok_or_else(|| ApiError::validation("Refresh token must be provided."))?;
    let claims = state.jwt.validate(&token, TokenKind::Refresh)?;

    if state.store.revoke_session(&claims.sid).await? {
        SecurityLogger::log_event(SecurityEvent::SessionRevoked {
            session_id: claims.sid,
        });
    }

    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}
