pub mod auth;

pub use auth::{ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, TokenResponse};

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
