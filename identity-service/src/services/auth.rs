use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, TokenResponse};
use crate::models::{
    ClientContext, LoginAudit, Session, Token, TokenActivity, TokenActivityKind, TokenType,
};
use crate::services::policy::{self, PasswordStrength};
use crate::services::{AuditSink, JwtService, ServiceError, SessionLifecycle};
use crate::store::{AuthStore, AuthTx, CredentialAccess, SessionAccess, TokenAccess};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

/// Top-level authentication service: login, refresh, logout and password
/// change. Each operation runs in a single transaction; audit entries are
/// written after commit, best effort.
pub struct AuthService {
    store: Arc<dyn AuthStore>,
    jwt: JwtService,
    lifecycle: SessionLifecycle,
    password_policy: Arc<dyn PasswordStrength>,
    audit: Arc<dyn AuditSink>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn AuthStore>,
        jwt: JwtService,
        password_policy: Arc<dyn PasswordStrength>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let lifecycle = SessionLifecycle::new(jwt.clone());
        Self {
            store,
            jwt,
            lifecycle,
            password_policy,
            audit,
        }
    }

    pub fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Authenticate with email and password and issue a fresh session.
    ///
    /// Failure modes never disclose whether the account exists; the single
    /// persisted side effect of a wrong password is the failed-attempt
    /// counter, which commits even though the login fails.
    pub async fn login(
        &self,
        req: LoginRequest,
        client: ClientContext,
    ) -> Result<LoginResponse, ServiceError> {
        req.validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let mut tx = self.store.begin().await?;

        let Some(record) = tx.lock_by_email(&req.email).await? else {
            // Same error as a wrong password: existence must not leak.
            return Err(ServiceError::InvalidCredentials);
        };

        let now = Utc::now();
        if let Some(until) = record.lockout_until_utc {
            if now < until {
                return Err(ServiceError::AccountLocked {
                    lockout_ends_at: until,
                });
            }
        }

        let presented = Password::new(req.password);
        let stored = PasswordHashString::new(record.password_hash_text.clone());
        if verify_password(&presented, &stored).is_err() {
            let failed_attempt_count = record.failed_attempt_count + 1;
            let lockout_until = policy::lockout_after_failure(failed_attempt_count, now);

            tx.record_failed_attempt(record.user_id, failed_attempt_count, lockout_until)
                .await?;
            // The counter is the one side effect of a failed attempt; it must
            // survive even though the login itself fails.
            tx.commit().await?;

            if let Some(until) = lockout_until {
                tracing::warn!(
                    user_id = %record.user_id,
                    lockout_until = %until,
                    "Account locked after repeated failed login attempts"
                );
            }
            return Err(ServiceError::InvalidCredentials);
        }

        let previous_login = record.last_login_utc;
        tx.reset_failed_attempts(record.user_id, now).await?;

        // Single-session policy: a new login invalidates everything issued
        // before it.
        self.lifecycle
            .revoke_all_for_user(tx.as_mut(), record.user_id, now)
            .await?;

        let issued = self
            .lifecycle
            .issue_session(tx.as_mut(), record.user_id, record.role_id, &client)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %record.user_id, session_id = %issued.session.session_id, "User logged in");
        self.audit_login(&issued.session, &client);

        Ok(LoginResponse::new(
            issued.tokens.access_token,
            issued.tokens.refresh_token,
            self.jwt.access_ttl_secs(),
            previous_login,
        ))
    }

    /// Exchange a refresh token for a new access/refresh pair.
    ///
    /// Not idempotent: each refresh token is consumed by the rotation that
    /// validates it, and presenting a consumed token revokes the whole
    /// session.
    pub async fn refresh(&self, req: RefreshRequest) -> Result<TokenResponse, ServiceError> {
        if req.refresh_token.is_empty() {
            return Err(ServiceError::InvalidRefreshToken);
        }

        // Signature and expiry are checked before any database work.
        let claims = self.jwt.verify_refresh(&req.refresh_token)?;

        let mut tx = self.store.begin().await?;

        let token_hash = Token::hash_token(&req.refresh_token);
        let Some(token) = tx.find_token_by_hash(&token_hash).await? else {
            return Err(ServiceError::InvalidRefreshToken);
        };

        if token.kind() != Some(TokenType::Refresh) {
            return Err(ServiceError::InvalidRefreshToken);
        }

        // The signed claims and the stored row must describe the same token.
        if claims.jti != token.token_id.to_string()
            || claims.sub != token.user_id.to_string()
        {
            return Err(ServiceError::InvalidRefreshToken);
        }

        let now = Utc::now();

        if token.revoked_flag {
            // Reuse of a consumed refresh token: treat the session as
            // compromised and revoke it entirely.
            if let Some(session_id) = token.session_id {
                self.lifecycle
                    .revoke_session(tx.as_mut(), session_id, now, false)
                    .await?;
                tx.commit().await?;

                tracing::warn!(
                    user_id = %token.user_id,
                    session_id = %session_id,
                    "Refresh token reuse detected; session revoked"
                );
                self.audit_token_activity(TokenActivity::new(
                    TokenActivityKind::ReuseDetected,
                    token.user_id,
                    Some(session_id),
                    "revoked session after refresh token reuse",
                ));
            }
            return Err(ServiceError::InvalidRefreshToken);
        }

        if token.is_expired() {
            return Err(ServiceError::RefreshTokenExpired);
        }

        let Some(session_id) = token.session_id else {
            return Err(ServiceError::InvalidSession);
        };
        let Some(session) = tx.find_session(session_id).await? else {
            return Err(ServiceError::InvalidSession);
        };
        if !session.is_active() {
            return Err(ServiceError::InvalidSession);
        }

        let tokens = self.lifecycle.rotate(tx.as_mut(), &session, &token).await?;
        tx.commit().await?;

        tracing::info!(user_id = %session.user_id, session_id = %session.session_id, "Tokens rotated");
        self.audit_token_activity(TokenActivity::new(
            TokenActivityKind::Rotated,
            session.user_id,
            Some(session.session_id),
            "refresh token exchanged for a new pair",
        ));

        Ok(TokenResponse::new(
            tokens.access_token,
            tokens.refresh_token,
            self.jwt.access_ttl_secs(),
        ))
    }

    /// Revoke one session and its tokens. Idempotent: repeated calls and
    /// missing identifiers are no-ops, not errors.
    pub async fn logout(
        &self,
        user_id: Option<Uuid>,
        session_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let (Some(user_id), Some(session_id)) = (user_id, session_id) else {
            return Ok(());
        };

        let mut tx = self.store.begin().await?;

        let Some(session) = tx.find_session(session_id).await? else {
            return Ok(());
        };
        if session.user_id != user_id {
            return Ok(());
        }

        let now = Utc::now();
        self.lifecycle
            .revoke_session(tx.as_mut(), session_id, now, true)
            .await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, session_id = %session_id, "User logged out");
        self.audit_token_activity(TokenActivity::new(
            TokenActivityKind::Revoked,
            user_id,
            Some(session_id),
            "session revoked on logout",
        ));

        Ok(())
    }

    /// Change a password, rejecting any of the last five passwords, and
    /// invalidate every outstanding session and token for the user.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        req: ChangePasswordRequest,
    ) -> Result<(), ServiceError> {
        req.validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let mut tx = self.store.begin().await?;

        // The caller is authenticated, so a missing credential row is an
        // anomaly rather than something to hide.
        let Some(record) = tx.lock_by_user_id(user_id).await? else {
            return Err(ServiceError::NotFound);
        };

        let current = Password::new(req.current_password);
        let stored = PasswordHashString::new(record.password_hash_text.clone());
        if verify_password(&current, &stored).is_err() {
            return Err(ServiceError::InvalidCredentials);
        }

        self.password_policy
            .check(&req.new_password)
            .map_err(ServiceError::Validation)?;

        let new_password = Password::new(req.new_password);
        for entry in record.history() {
            let old_hash = PasswordHashString::new(entry.password_hash_text.clone());
            if verify_password(&new_password, &old_hash).is_ok() {
                return Err(ServiceError::Validation(
                    "Cannot reuse a recent password".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let new_hash = hash_password(&new_password)?;
        let history = record.next_history(new_hash.as_str(), now);
        tx.update_password(user_id, new_hash.as_str(), &history)
            .await?;

        // A changed password invalidates every outstanding credential.
        self.lifecycle
            .revoke_all_for_user(tx.as_mut(), user_id, now)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user_id, "Password changed; all sessions revoked");
        self.audit_token_activity(TokenActivity::new(
            TokenActivityKind::Revoked,
            user_id,
            None,
            "all sessions revoked on password change",
        ));

        Ok(())
    }

    /// Write the login audit trail after commit. Failures are logged and
    /// swallowed; they never affect the login result.
    fn audit_login(&self, session: &Session, client: &ClientContext) {
        let sink = Arc::clone(&self.audit);
        let login = LoginAudit::new(session.user_id, session.session_id, client);
        let activity = TokenActivity::new(
            TokenActivityKind::Issued,
            session.user_id,
            Some(session.session_id),
            "session issued at login",
        );
        tokio::spawn(async move {
            if let Err(e) = sink.record_login(login).await {
                tracing::warn!(error = %e, "Failed to write login history entry");
            }
            if let Err(e) = sink.record_token_activity(activity).await {
                tracing::warn!(error = %e, "Failed to write token activity entry");
            }
        });
    }

    /// Write a token-activity entry after commit, best effort.
    fn audit_token_activity(&self, entry: TokenActivity) {
        let sink = Arc::clone(&self.audit);
        tokio::spawn(async move {
            if let Err(e) = sink.record_token_activity(entry).await {
                tracing::warn!(error = %e, "Failed to write token activity entry");
            }
        });
    }
}
