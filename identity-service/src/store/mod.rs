//! Persistence seams for the identity service.
//!
//! [`AuthStore::begin`] opens a unit of work; the returned [`AuthTx`] is the
//! explicit transaction handle every repository-level operation takes.
//! Committing applies all mutations atomically; dropping the handle without
//! committing rolls them back. Credential, session and token access are
//! separate traits so each collaborator depends only on the rows it owns,
//! but one handle implements all three: a login revokes sessions, writes
//! tokens and stamps the credential row in a single transaction.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{AuthRecord, PasswordHistoryEntry, Session, Token};
use crate::services::ServiceError;

pub use memory::MemoryAuthStore;
pub use postgres::PgAuthStore;

/// Credential-row operations. Reads take the row lock that serializes
/// concurrent logins and password changes for the same user.
#[async_trait]
pub trait CredentialAccess {
    /// Lock and fetch the credential record of an *active* user by email.
    /// `None` means no such record; the caller decides whether absence may
    /// be disclosed.
    async fn lock_by_email(&mut self, email: &str) -> Result<Option<AuthRecord>, ServiceError>;

    /// Lock and fetch the credential record of an active user by ID.
    async fn lock_by_user_id(&mut self, user_id: Uuid)
        -> Result<Option<AuthRecord>, ServiceError>;

    /// Persist a failed attempt. `lockout_until_utc` is set when the count
    /// has crossed the lockout threshold.
    async fn record_failed_attempt(
        &mut self,
        user_id: Uuid,
        failed_attempt_count: i32,
        lockout_until_utc: Option<DateTime<Utc>>,
    ) -> Result<(), ServiceError>;

    /// Zero the counter, clear any lockout and stamp the login time.
    async fn reset_failed_attempts(
        &mut self,
        user_id: Uuid,
        last_login_utc: DateTime<Utc>,
    ) -> Result<(), ServiceError>;

    /// Replace the password hash and its history (already truncated by the
    /// caller).
    async fn update_password(
        &mut self,
        user_id: Uuid,
        password_hash_text: &str,
        history: &[PasswordHistoryEntry],
    ) -> Result<(), ServiceError>;
}

/// Session-row operations.
#[async_trait]
pub trait SessionAccess {
    async fn insert_session(&mut self, session: &Session) -> Result<(), ServiceError>;

    /// Fetch a session under the transaction's lock, serializing concurrent
    /// refresh attempts against the same session.
    async fn find_session(&mut self, session_id: Uuid) -> Result<Option<Session>, ServiceError>;

    async fn sessions_for_user(&mut self, user_id: Uuid) -> Result<Vec<Session>, ServiceError>;

    /// Revoke a session. `at` stamps `revoked_utc`; already-revoked sessions
    /// are left untouched.
    async fn revoke_session(&mut self, session_id: Uuid, at: DateTime<Utc>)
        -> Result<(), ServiceError>;

    /// Revoke a session on explicit logout, stamping both `revoked_utc` and
    /// `logged_out_utc`. Idempotent.
    async fn mark_logged_out(&mut self, session_id: Uuid, at: DateTime<Utc>)
        -> Result<(), ServiceError>;

    /// Revoke every live session owned by the user. Returns how many rows
    /// were revoked.
    async fn revoke_sessions_for_user(
        &mut self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, ServiceError>;
}

/// Token-row operations. Only hashes of raw tokens are ever stored.
#[async_trait]
pub trait TokenAccess {
    async fn insert_token(&mut self, token: &Token) -> Result<(), ServiceError>;

    async fn find_token_by_hash(
        &mut self,
        token_hash: &str,
    ) -> Result<Option<Token>, ServiceError>;

    async fn revoke_token(&mut self, token_id: Uuid) -> Result<(), ServiceError>;

    async fn revoke_tokens_for_session(&mut self, session_id: Uuid) -> Result<u64, ServiceError>;

    /// Revoke the not-yet-revoked access tokens of a session, so a rotation
    /// leaves no stale access token alive.
    async fn revoke_live_access_tokens(&mut self, session_id: Uuid) -> Result<u64, ServiceError>;

    async fn revoke_tokens_for_user(&mut self, user_id: Uuid) -> Result<u64, ServiceError>;
}

/// The unit-of-work handle.
#[async_trait]
pub trait AuthTx: CredentialAccess + SessionAccess + TokenAccess + Send {
    /// Apply every mutation made through this handle. Dropping the handle
    /// without calling this rolls everything back.
    async fn commit(self: Box<Self>) -> Result<(), ServiceError>;
}

/// Factory for units of work.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn AuthTx>, ServiceError>;
}
