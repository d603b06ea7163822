use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::services::ServiceError;

/// Token codec. Access and refresh tokens are signed with independent keys
/// and independently configured lifetimes, so neither kind can be presented
/// where the other is expected.
#[derive(Clone)]
pub struct JwtService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

/// Claims for access tokens (short-lived)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Role carried through for the authorization layer
    pub role_id: String,
    /// Owning session ID
    pub sid: String,
    /// Token ID (matches the persisted token row)
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Claims for refresh tokens (longer-lived, single use)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Role carried through for the authorization layer
    pub role_id: String,
    /// Owning session ID
    pub sid: String,
    /// Token ID (matches the persisted token row)
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl JwtService {
    /// Create the codec from validated configuration.
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_token_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_token_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            access_ttl_secs: config.access_token_ttl_secs,
            refresh_ttl_secs: config.refresh_token_ttl_secs,
        }
    }

    /// Mint an access token. Returns the raw token and its `jti`, which is
    /// also the ID of the persisted token row.
    pub fn mint_access(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        session_id: Uuid,
    ) -> Result<(String, Uuid), ServiceError> {
        let token_id = Uuid::new_v4();
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            role_id: role_id.to_string(),
            sid: session_id.to_string(),
            jti: token_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.access_ttl_secs)).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))?;

        Ok((token, token_id))
    }

    /// Mint a refresh token. Returns the raw token and its `jti`.
    pub fn mint_refresh(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        session_id: Uuid,
    ) -> Result<(String, Uuid), ServiceError> {
        let token_id = Uuid::new_v4();
        let now = Utc::now();
        let claims = RefreshTokenClaims {
            sub: user_id.to_string(),
            role_id: role_id.to_string(),
            sid: session_id.to_string(),
            jti: token_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.refresh_ttl_secs)).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding)
            .map_err(|e| anyhow::anyhow!("Failed to encode refresh token: {}", e))?;

        Ok((token, token_id))
    }

    /// Validate and decode an access token.
    pub fn verify_access(&self, token: &str) -> Result<AccessTokenClaims, ServiceError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<AccessTokenClaims>(token, &self.access_decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => ServiceError::TokenExpired,
                _ => ServiceError::InvalidToken,
            })
    }

    /// Validate and decode a refresh token. Signature and expiry failures map
    /// to distinct domain errors without touching the database.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshTokenClaims, ServiceError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<RefreshTokenClaims>(token, &self.refresh_decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ServiceError::RefreshTokenExpired
                }
                _ => ServiceError::InvalidRefreshToken,
            })
    }

    /// Access token lifetime in seconds (for client info and cookie max-age).
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Refresh token lifetime in seconds; also the session lifetime.
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }
}
