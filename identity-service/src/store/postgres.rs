//! PostgreSQL implementation of the identity store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::models::{AuthRecord, PasswordHistoryEntry, Session, Token};
use crate::services::ServiceError;
use crate::store::{AuthStore, AuthTx, CredentialAccess, SessionAccess, TokenAccess};

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgAuthStore {
    pool: PgPool,
}

impl PgAuthStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthStore for PgAuthStore {
    async fn begin(&self) -> Result<Box<dyn AuthTx>, ServiceError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgAuthTx { tx }))
    }
}

/// One open transaction against PostgreSQL.
pub struct PgAuthTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CredentialAccess for PgAuthTx {
    async fn lock_by_email(&mut self, email: &str) -> Result<Option<AuthRecord>, ServiceError> {
        let record = sqlx::query_as::<_, AuthRecord>(
            r#"
            SELECT c.user_id, u.email, u.role_id, c.password_hash_text,
                   c.failed_attempt_count, c.lockout_until_utc, c.last_login_utc,
                   c.password_history
            FROM auth_credentials c
            JOIN users u ON u.user_id = c.user_id
            WHERE u.email = $1 AND u.user_state_code = 'active'
            FOR UPDATE OF c
            "#,
        )
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn lock_by_user_id(
        &mut self,
        user_id: Uuid,
    ) -> Result<Option<AuthRecord>, ServiceError> {
        let record = sqlx::query_as::<_, AuthRecord>(
            r#"
            SELECT c.user_id, u.email, u.role_id, c.password_hash_text,
                   c.failed_attempt_count, c.lockout_until_utc, c.last_login_utc,
                   c.password_history
            FROM auth_credentials c
            JOIN users u ON u.user_id = c.user_id
            WHERE u.user_id = $1 AND u.user_state_code = 'active'
            FOR UPDATE OF c
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn record_failed_attempt(
        &mut self,
        user_id: Uuid,
        failed_attempt_count: i32,
        lockout_until_utc: Option<DateTime<Utc>>,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            UPDATE auth_credentials
            SET failed_attempt_count = $2, lockout_until_utc = $3, updated_utc = now()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(failed_attempt_count)
        .bind(lockout_until_utc)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn reset_failed_attempts(
        &mut self,
        user_id: Uuid,
        last_login_utc: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            UPDATE auth_credentials
            SET failed_attempt_count = 0, lockout_until_utc = NULL,
                last_login_utc = $2, updated_utc = now()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(last_login_utc)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_password(
        &mut self,
        user_id: Uuid,
        password_hash_text: &str,
        history: &[PasswordHistoryEntry],
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            UPDATE auth_credentials
            SET password_hash_text = $2, password_history = $3, updated_utc = now()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(password_hash_text)
        .bind(Json(history))
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SessionAccess for PgAuthTx {
    async fn insert_session(&mut self, session: &Session) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, user_id, role_id, device_id, ip_address,
                                  user_agent, created_utc, expiry_utc, revoked_utc, logged_out_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(session.session_id)
        .bind(session.user_id)
        .bind(session.role_id)
        .bind(&session.device_id)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.created_utc)
        .bind(session.expiry_utc)
        .bind(session.revoked_utc)
        .bind(session.logged_out_utc)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_session(&mut self, session_id: Uuid) -> Result<Option<Session>, ServiceError> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE session_id = $1 FOR UPDATE",
        )
        .bind(session_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(session)
    }

    async fn sessions_for_user(&mut self, user_id: Uuid) -> Result<Vec<Session>, ServiceError> {
        let sessions = sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE user_id = $1 ORDER BY created_utc DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(sessions)
    }

    async fn revoke_session(
        &mut self,
        session_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            "UPDATE sessions SET revoked_utc = $2 WHERE session_id = $1 AND revoked_utc IS NULL",
        )
        .bind(session_id)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn mark_logged_out(
        &mut self,
        session_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            UPDATE sessions
            SET revoked_utc = COALESCE(revoked_utc, $2),
                logged_out_utc = COALESCE(logged_out_utc, $2)
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn revoke_sessions_for_user(
        &mut self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_utc = $2 WHERE user_id = $1 AND revoked_utc IS NULL",
        )
        .bind(user_id)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TokenAccess for PgAuthTx {
    async fn insert_token(&mut self, token: &Token) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO tokens (token_id, user_id, session_id, token_type_code,
                                token_hash_text, issued_utc, expiry_utc, revoked_flag)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(token.token_id)
        .bind(token.user_id)
        .bind(token.session_id)
        .bind(&token.token_type_code)
        .bind(&token.token_hash_text)
        .bind(token.issued_utc)
        .bind(token.expiry_utc)
        .bind(token.revoked_flag)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_token_by_hash(
        &mut self,
        token_hash: &str,
    ) -> Result<Option<Token>, ServiceError> {
        let token = sqlx::query_as::<_, Token>(
            "SELECT * FROM tokens WHERE token_hash_text = $1 FOR UPDATE",
        )
        .bind(token_hash)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(token)
    }

    async fn revoke_token(&mut self, token_id: Uuid) -> Result<(), ServiceError> {
        sqlx::query("UPDATE tokens SET revoked_flag = TRUE WHERE token_id = $1")
            .bind(token_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn revoke_tokens_for_session(&mut self, session_id: Uuid) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            "UPDATE tokens SET revoked_flag = TRUE WHERE session_id = $1 AND revoked_flag = FALSE",
        )
        .bind(session_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn revoke_live_access_tokens(&mut self, session_id: Uuid) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE tokens SET revoked_flag = TRUE
            WHERE session_id = $1 AND token_type_code = 'access' AND revoked_flag = FALSE
            "#,
        )
        .bind(session_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn revoke_tokens_for_user(&mut self, user_id: Uuid) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            "UPDATE tokens SET revoked_flag = TRUE WHERE user_id = $1 AND revoked_flag = FALSE",
        )
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AuthTx for PgAuthTx {
    async fn commit(self: Box<Self>) -> Result<(), ServiceError> {
        self.tx.commit().await?;
        Ok(())
    }
}
