//! Services layer for the identity service.
//!
//! Business logic for authentication, token lifecycle and auditing.

mod audit;
mod auth;
pub mod error;
mod jwt;
mod lifecycle;
pub mod policy;

pub use audit::{AuditSink, MemoryAuditSink, PgAuditSink};
pub use auth::AuthService;
pub use error::ServiceError;
pub use jwt::{AccessTokenClaims, JwtService, RefreshTokenClaims};
pub use lifecycle::{IssuedSession, IssuedTokens, SessionLifecycle};
pub use policy::{MinLengthPolicy, PasswordStrength};
