//! Audit entries written after commit, best effort.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::ClientContext;

/// Login-history entry, one per successful login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginAudit {
    pub entry_id: Uuid,
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_id: Option<String>,
    pub note: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl LoginAudit {
    pub fn new(user_id: Uuid, session_id: Uuid, client: &ClientContext) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            user_id,
            session_id,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            device_id: client.device_id.clone(),
            note: client.note.clone(),
            created_utc: Utc::now(),
        }
    }
}

/// Token-activity event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenActivityKind {
    Issued,
    Rotated,
    Revoked,
    ReuseDetected,
}

impl TokenActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenActivityKind::Issued => "issued",
            TokenActivityKind::Rotated => "rotated",
            TokenActivityKind::Revoked => "revoked",
            TokenActivityKind::ReuseDetected => "reuse_detected",
        }
    }
}

/// Token-activity entry.
#[derive(Debug, Clone, Serialize)]
pub struct TokenActivity {
    pub entry_id: Uuid,
    pub user_id: Uuid,
    pub session_id: Option<Uuid>,
    pub activity_code: String,
    pub detail: String,
    pub created_utc: DateTime<Utc>,
}

impl TokenActivity {
    pub fn new(
        kind: TokenActivityKind,
        user_id: Uuid,
        session_id: Option<Uuid>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            user_id,
            session_id,
            activity_code: kind.as_str().to_string(),
            detail: detail.into(),
            created_utc: Utc::now(),
        }
    }
}
