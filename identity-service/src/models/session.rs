//! Session model - one authenticated device/browser context per row.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Client metadata captured at login and stamped onto the session.
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_id: Option<String>,
    pub note: Option<String>,
}

/// Session entity. Tokens are issued against a session; revoking the session
/// invalidates every token bound to it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub device_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub expiry_utc: DateTime<Utc>,
    pub revoked_utc: Option<DateTime<Utc>>,
    pub logged_out_utc: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a new session. The session lives as long as its refresh token
    /// can still be exchanged.
    pub fn new(user_id: Uuid, role_id: Uuid, client: &ClientContext, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            user_id,
            role_id,
            device_id: client.device_id.clone(),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            created_utc: now,
            expiry_utc: now + Duration::seconds(ttl_secs),
            revoked_utc: None,
            logged_out_utc: None,
        }
    }

    /// Check if the session is expired.
    pub fn is_expired(&self) -> bool {
        self.expiry_utc <= Utc::now()
    }

    /// Check if the session is active (not revoked, not logged out, not
    /// expired).
    pub fn is_active(&self) -> bool {
        self.revoked_utc.is_none() && self.logged_out_utc.is_none() && !self.is_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(Uuid::new_v4(), Uuid::new_v4(), &ClientContext::default(), 3600)
    }

    #[test]
    fn test_new_session_is_active() {
        let session = session();
        assert!(session.is_active());
        assert!(!session.is_expired());
    }

    #[test]
    fn test_revoked_session_is_inactive() {
        let mut session = session();
        session.revoked_utc = Some(Utc::now());
        assert!(!session.is_active());
    }

    #[test]
    fn test_logged_out_session_is_inactive() {
        let mut session = session();
        session.logged_out_utc = Some(Utc::now());
        assert!(!session.is_active());
    }

    #[test]
    fn test_expired_session_is_inactive() {
        let mut session = session();
        session.expiry_utc = Utc::now() - Duration::seconds(1);
        assert!(session.is_expired());
        assert!(!session.is_active());
    }
}
