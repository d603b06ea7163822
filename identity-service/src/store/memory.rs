//! In-memory implementation of the identity store.
//!
//! Backs the integration tests and local development without a database.
//! One async mutex serializes transactions, which is strictly stronger than
//! the per-row lock the PostgreSQL store takes; mutations are staged on a
//! copy of the state and swapped in on commit, so an uncommitted handle
//! rolls back on drop exactly like a database transaction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::{AuthRecord, PasswordHistoryEntry, Session, Token, UserState};
use crate::services::ServiceError;
use crate::store::{AuthStore, AuthTx, CredentialAccess, SessionAccess, TokenAccess};

/// One provisioned account: the credential record plus the user state the
/// login join would read.
#[derive(Debug, Clone)]
pub struct MemoryAccount {
    pub state: UserState,
    pub record: AuthRecord,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    accounts: HashMap<Uuid, MemoryAccount>,
    sessions: HashMap<Uuid, Session>,
    tokens: HashMap<Uuid, Token>,
}

/// In-memory store.
#[derive(Clone, Default)]
pub struct MemoryAuthStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision an account (normally done by the user-management service).
    pub async fn seed_account(&self, record: AuthRecord, state: UserState) {
        let mut guard = self.state.lock().await;
        guard
            .accounts
            .insert(record.user_id, MemoryAccount { state, record });
    }

    /// Read a credential record outside any transaction.
    pub async fn record(&self, user_id: Uuid) -> Option<AuthRecord> {
        let guard = self.state.lock().await;
        guard.accounts.get(&user_id).map(|a| a.record.clone())
    }

    /// Mutate a credential record in place (test fixture, e.g. rewinding a
    /// lockout window).
    pub async fn update_record(&self, user_id: Uuid, mutate: impl FnOnce(&mut AuthRecord)) {
        let mut guard = self.state.lock().await;
        if let Some(account) = guard.accounts.get_mut(&user_id) {
            mutate(&mut account.record);
        }
    }

    pub async fn session(&self, session_id: Uuid) -> Option<Session> {
        let guard = self.state.lock().await;
        guard.sessions.get(&session_id).cloned()
    }

    /// Mutate a session row in place (test fixture).
    pub async fn update_session(&self, session_id: Uuid, mutate: impl FnOnce(&mut Session)) {
        let mut guard = self.state.lock().await;
        if let Some(session) = guard.sessions.get_mut(&session_id) {
            mutate(session);
        }
    }

    pub async fn sessions_for_user(&self, user_id: Uuid) -> Vec<Session> {
        let guard = self.state.lock().await;
        let mut sessions: Vec<Session> = guard
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.created_utc);
        sessions
    }

    pub async fn tokens_for_session(&self, session_id: Uuid) -> Vec<Token> {
        let guard = self.state.lock().await;
        let mut tokens: Vec<Token> = guard
            .tokens
            .values()
            .filter(|t| t.session_id == Some(session_id))
            .cloned()
            .collect();
        tokens.sort_by_key(|t| t.issued_utc);
        tokens
    }

    /// Mutate a token row in place (test fixture, e.g. forcing expiry).
    pub async fn update_token(&self, token_id: Uuid, mutate: impl FnOnce(&mut Token)) {
        let mut guard = self.state.lock().await;
        if let Some(token) = guard.tokens.get_mut(&token_id) {
            mutate(token);
        }
    }
}

#[async_trait]
impl AuthStore for MemoryAuthStore {
    async fn begin(&self) -> Result<Box<dyn AuthTx>, ServiceError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = (*guard).clone();
        Ok(Box::new(MemoryTx { guard, staged }))
    }
}

/// One open transaction against the in-memory state.
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl CredentialAccess for MemoryTx {
    async fn lock_by_email(&mut self, email: &str) -> Result<Option<AuthRecord>, ServiceError> {
        Ok(self
            .staged
            .accounts
            .values()
            .find(|a| a.state == UserState::Active && a.record.email == email)
            .map(|a| a.record.clone()))
    }

    async fn lock_by_user_id(
        &mut self,
        user_id: Uuid,
    ) -> Result<Option<AuthRecord>, ServiceError> {
        Ok(self
            .staged
            .accounts
            .get(&user_id)
            .filter(|a| a.state == UserState::Active)
            .map(|a| a.record.clone()))
    }

    async fn record_failed_attempt(
        &mut self,
        user_id: Uuid,
        failed_attempt_count: i32,
        lockout_until_utc: Option<DateTime<Utc>>,
    ) -> Result<(), ServiceError> {
        if let Some(account) = self.staged.accounts.get_mut(&user_id) {
            account.record.failed_attempt_count = failed_attempt_count;
            account.record.lockout_until_utc = lockout_until_utc;
        }
        Ok(())
    }

    async fn reset_failed_attempts(
        &mut self,
        user_id: Uuid,
        last_login_utc: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if let Some(account) = self.staged.accounts.get_mut(&user_id) {
            account.record.failed_attempt_count = 0;
            account.record.lockout_until_utc = None;
            account.record.last_login_utc = Some(last_login_utc);
        }
        Ok(())
    }

    async fn update_password(
        &mut self,
        user_id: Uuid,
        password_hash_text: &str,
        history: &[PasswordHistoryEntry],
    ) -> Result<(), ServiceError> {
        if let Some(account) = self.staged.accounts.get_mut(&user_id) {
            account.record.password_hash_text = password_hash_text.to_string();
            account.record.password_history = sqlx::types::Json(history.to_vec());
        }
        Ok(())
    }
}

#[async_trait]
impl SessionAccess for MemoryTx {
    async fn insert_session(&mut self, session: &Session) -> Result<(), ServiceError> {
        self.staged
            .sessions
            .insert(session.session_id, session.clone());
        Ok(())
    }

    async fn find_session(&mut self, session_id: Uuid) -> Result<Option<Session>, ServiceError> {
        Ok(self.staged.sessions.get(&session_id).cloned())
    }

    async fn sessions_for_user(&mut self, user_id: Uuid) -> Result<Vec<Session>, ServiceError> {
        let mut sessions: Vec<Session> = self
            .staged
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.created_utc);
        Ok(sessions)
    }

    async fn revoke_session(
        &mut self,
        session_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if let Some(session) = self.staged.sessions.get_mut(&session_id) {
            session.revoked_utc.get_or_insert(at);
        }
        Ok(())
    }

    async fn mark_logged_out(
        &mut self,
        session_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if let Some(session) = self.staged.sessions.get_mut(&session_id) {
            session.revoked_utc.get_or_insert(at);
            session.logged_out_utc.get_or_insert(at);
        }
        Ok(())
    }

    async fn revoke_sessions_for_user(
        &mut self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        let mut revoked = 0;
        for session in self.staged.sessions.values_mut() {
            if session.user_id == user_id && session.revoked_utc.is_none() {
                session.revoked_utc = Some(at);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

#[async_trait]
impl TokenAccess for MemoryTx {
    async fn insert_token(&mut self, token: &Token) -> Result<(), ServiceError> {
        self.staged.tokens.insert(token.token_id, token.clone());
        Ok(())
    }

    async fn find_token_by_hash(
        &mut self,
        token_hash: &str,
    ) -> Result<Option<Token>, ServiceError> {
        // Constant-time comparison: the hash is derived from a secret.
        Ok(self
            .staged
            .tokens
            .values()
            .find(|t| {
                t.token_hash_text
                    .as_bytes()
                    .ct_eq(token_hash.as_bytes())
                    .into()
            })
            .cloned())
    }

    async fn revoke_token(&mut self, token_id: Uuid) -> Result<(), ServiceError> {
        if let Some(token) = self.staged.tokens.get_mut(&token_id) {
            token.revoked_flag = true;
        }
        Ok(())
    }

    async fn revoke_tokens_for_session(&mut self, session_id: Uuid) -> Result<u64, ServiceError> {
        let mut revoked = 0;
        for token in self.staged.tokens.values_mut() {
            if token.session_id == Some(session_id) && !token.revoked_flag {
                token.revoked_flag = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn revoke_live_access_tokens(&mut self, session_id: Uuid) -> Result<u64, ServiceError> {
        let mut revoked = 0;
        for token in self.staged.tokens.values_mut() {
            if token.session_id == Some(session_id)
                && token.token_type_code == "access"
                && !token.revoked_flag
            {
                token.revoked_flag = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn revoke_tokens_for_user(&mut self, user_id: Uuid) -> Result<u64, ServiceError> {
        let mut revoked = 0;
        for token in self.staged.tokens.values_mut() {
            if token.user_id == user_id && !token.revoked_flag {
                token.revoked_flag = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

#[async_trait]
impl AuthTx for MemoryTx {
    async fn commit(self: Box<Self>) -> Result<(), ServiceError> {
        let MemoryTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
