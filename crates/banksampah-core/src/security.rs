use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{new_id, User};

#[derive(Error, Debug)]
pub enum SecurityError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),
    #[error("Cryptographic operation failed: {0}")]
    CryptographicFailure(String),
}

/// Hashes a password into an argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, SecurityError> {
    let mut salt_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| SecurityError::CryptographicFailure(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| SecurityError::CryptographicFailure(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, SecurityError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| SecurityError::CryptographicFailure(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// Random secret for development runs without a configured one.
pub fn generate_secret() -> String {
    use base64::{engine::general_purpose, Engine as _};
    let mut key = [0u8; 48];
    rand::rng().fill_bytes(&mut key);
    general_purpose::URL_SAFE_NO_PAD.encode(key)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub sid: String,
    pub jti: String,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// Identity attached to authenticated requests.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub username: String,
    pub session_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
            session_id: claims.sid,
            issued_at: DateTime::from_timestamp(claims.iat, 0).unwrap_or_default(),
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    pub refresh_jti: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// HS256 token issuer for access and refresh tokens.
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl JwtManager {
    pub fn new(secret: &SecretString, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issues an access/refresh pair for `session_id`. The refresh token
    /// carries a fresh jti which the caller must record on the session.
    pub fn issue_pair(&self, user: &User, session_id: &str) -> Result<TokenPair, SecurityError> {
        let now = Utc::now();
        let access_exp = now + self.access_ttl;
        let refresh_exp = now + self.refresh_ttl;
        let refresh_jti = new_id();

        let access_token = self.sign(&Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            sid: session_id.to_string(),
            jti: new_id(),
            kind: TokenKind::Access,
            iat: now.timestamp(),
            exp: access_exp.timestamp(),
        })?;
        let refresh_token = self.sign(&Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            sid: session_id.to_string(),
            jti: refresh_jti.clone(),
            kind: TokenKind::Refresh,
            iat: now.timestamp(),
            exp: refresh_exp.timestamp(),
        })?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl.num_seconds(),
            refresh_jti,
            refresh_expires_at: refresh_exp,
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, SecurityError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| SecurityError::TokenGeneration(e.to_string()))
    }

    /// Decodes and checks signature, expiry and token kind.
    pub fn validate(&self, token: &str, kind: TokenKind) -> Result<Claims, SecurityError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| SecurityError::InvalidToken)?;
        if data.claims.kind != kind {
            return Err(SecurityError::InvalidToken);
        }
        Ok(data.claims)
    }
}

#[derive(Debug, Clone)]
pub enum SecurityEvent {
    Registered {
        user_id: String,
        username: String,
    },
    LoginSuccess {
        user_id: String,
        session_id: String,
    },
    LoginFailure {
        username: String,
        reason: String,
    },
    LoginThrottled {
        username: String,
    },
    RefreshTokenReuse {
        user_id: String,
        session_id: String,
    },
    SessionRevoked {
        session_id: String,
    },
}

pub struct SecurityLogger;

impl SecurityLogger {
    pub fn log_event(event: SecurityEvent) {
        use tracing::{info, warn};

        match event {
            SecurityEvent::Registered { user_id, username } => {
                info!(user_id = %user_id, username = %username, "User registered");
            }
            SecurityEvent::LoginSuccess { user_id, session_id } => {
                info!(user_id = %user_id, session_id = %session_id, "Authentication success");
            }
            SecurityEvent::LoginFailure { username, reason } => {
                warn!(username = %username, reason = %reason, "Authentication failure");
            }
            SecurityEvent::LoginThrottled { username } => {
                warn!(username = %username, "Login attempts throttled");
            }
            SecurityEvent::RefreshTokenReuse { user_id, session_id } => {
                warn!(
                    user_id = %user_id,
                    session_id = %session_id,
                    "Refresh token reuse detected, session revoked"
                );
            }
            SecurityEvent::SessionRevoked { session_id } => {
                info!(session_id = %session_id, "Session revoked");
            }
        }
    }
}
