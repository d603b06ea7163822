//! Audit sink - login history and token activity.
//!
//! The sink is an external collaborator: entries are written after the
//! primary transaction commits, and a failed write must never affect the
//! outcome of the operation that produced it.

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use crate::models::{LoginAudit, TokenActivity};

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_login(&self, entry: LoginAudit) -> Result<(), anyhow::Error>;

    async fn record_token_activity(&self, entry: TokenActivity) -> Result<(), anyhow::Error>;
}

/// PostgreSQL audit sink writing to the insert-only audit tables.
#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record_login(&self, entry: LoginAudit) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
            INSERT INTO login_history (entry_id, user_id, session_id, ip_address,
                                       user_agent, device_id, note, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.entry_id)
        .bind(entry.user_id)
        .bind(entry.session_id)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.device_id)
        .bind(&entry.note)
        .bind(entry.created_utc)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_token_activity(&self, entry: TokenActivity) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
            INSERT INTO token_activity (entry_id, user_id, session_id, activity_code,
                                        detail, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.entry_id)
        .bind(entry.user_id)
        .bind(entry.session_id)
        .bind(&entry.activity_code)
        .bind(&entry.detail)
        .bind(entry.created_utc)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// In-memory audit sink capturing entries for inspection in tests.
#[derive(Default)]
pub struct MemoryAuditSink {
    pub logins: std::sync::Mutex<Vec<LoginAudit>>,
    pub token_activity: std::sync::Mutex<Vec<TokenActivity>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record_login(&self, entry: LoginAudit) -> Result<(), anyhow::Error> {
        self.logins
            .lock()
            .map_err(|e| anyhow::anyhow!("Audit sink mutex poisoned: {}", e))?
            .push(entry);
        Ok(())
    }

    async fn record_token_activity(&self, entry: TokenActivity) -> Result<(), anyhow::Error> {
        self.token_activity
            .lock()
            .map_err(|e| anyhow::anyhow!("Audit sink mutex poisoned: {}", e))?
            .push(entry);
        Ok(())
    }
}
