use chrono::{DateTime, Utc};
use service_core::error::AppError;
use thiserror::Error;

/// Domain errors for the identity service. Variants are constructed once at
/// the point of detection and propagated unmodified to the boundary; the
/// conversion below fixes the HTTP-adjacent status for each.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    /// Single message for "no such user", "wrong password" and "inactive
    /// account" so account existence never leaks.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account locked until {lockout_ends_at}")]
    AccountLocked { lockout_ends_at: DateTime<Utc> },

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Refresh token expired")]
    RefreshTokenExpired,

    #[error("Invalid session")]
    InvalidSession,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Record not found")]
    NotFound,
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::anyhow!(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::InvalidCredentials => {
                AppError::AuthError(anyhow::anyhow!("Invalid credentials"))
            }
            ServiceError::AccountLocked { lockout_ends_at } => {
                AppError::AccountLocked { lockout_ends_at }
            }
            ServiceError::InvalidToken => AppError::AuthError(anyhow::anyhow!("Invalid token")),
            ServiceError::TokenExpired => AppError::AuthError(anyhow::anyhow!("Token expired")),
            ServiceError::InvalidRefreshToken => {
                AppError::AuthError(anyhow::anyhow!("Invalid refresh token"))
            }
            ServiceError::RefreshTokenExpired => {
                AppError::AuthError(anyhow::anyhow!("Refresh token expired"))
            }
            ServiceError::InvalidSession => AppError::AuthError(anyhow::anyhow!("Invalid session")),
            ServiceError::Validation(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            ServiceError::NotFound => AppError::NotFound(anyhow::anyhow!("Record not found")),
        }
    }
}
