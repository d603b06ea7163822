//! Token model - persisted as a one-way hash, never the raw value.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use uuid::Uuid;

/// Token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "access" => Some(TokenType::Access),
            "refresh" => Some(TokenType::Refresh),
            _ => None,
        }
    }
}

/// Token row. `token_id` doubles as the `jti` claim of the signed token, so
/// a decoded token can be cross-checked against its row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Token {
    pub token_id: Uuid,
    pub user_id: Uuid,
    pub session_id: Option<Uuid>,
    pub token_type_code: String,
    pub token_hash_text: String,
    pub issued_utc: DateTime<Utc>,
    pub expiry_utc: DateTime<Utc>,
    pub revoked_flag: bool,
}

impl Token {
    /// Build the row for a freshly minted raw token.
    pub fn issue(
        token_id: Uuid,
        user_id: Uuid,
        session_id: Option<Uuid>,
        kind: TokenType,
        raw_token: &str,
        ttl_secs: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            token_id,
            user_id,
            session_id,
            token_type_code: kind.as_str().to_string(),
            token_hash_text: Self::hash_token(raw_token),
            issued_utc: now,
            expiry_utc: now + Duration::seconds(ttl_secs),
            revoked_flag: false,
        }
    }

    /// Hash a raw token using SHA-256.
    pub fn hash_token(raw_token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(raw_token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Check if this token is expired.
    pub fn is_expired(&self) -> bool {
        self.expiry_utc <= Utc::now()
    }

    pub fn kind(&self) -> Option<TokenType> {
        TokenType::parse(&self.token_type_code)
    }
}
