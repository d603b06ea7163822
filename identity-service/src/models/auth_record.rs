//! Authentication record - credential row joined to the owning user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// How many password hashes are remembered, current one included.
pub const PASSWORD_HISTORY_DEPTH: usize = 5;

/// One remembered password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordHistoryEntry {
    pub password_hash_text: String,
    pub changed_utc: DateTime<Utc>,
}

/// Credential row for a user, as read under the row lock during login and
/// password change. `email` and `role_id` come from the joined user row.
#[derive(Debug, Clone, FromRow)]
pub struct AuthRecord {
    pub user_id: Uuid,
    pub email: String,
    pub role_id: Uuid,
    pub password_hash_text: String,
    pub failed_attempt_count: i32,
    pub lockout_until_utc: Option<DateTime<Utc>>,
    pub last_login_utc: Option<DateTime<Utc>>,
    pub password_history: Json<Vec<PasswordHistoryEntry>>,
}

impl AuthRecord {
    /// Create a fresh record at provisioning time. History starts with the
    /// initial hash so entry 0 is always the current password.
    pub fn new(user_id: Uuid, email: String, role_id: Uuid, password_hash: String) -> Self {
        let entry = PasswordHistoryEntry {
            password_hash_text: password_hash.clone(),
            changed_utc: Utc::now(),
        };
        Self {
            user_id,
            email,
            role_id,
            password_hash_text: password_hash,
            failed_attempt_count: 0,
            lockout_until_utc: None,
            last_login_utc: None,
            password_history: Json(vec![entry]),
        }
    }

    /// The remembered hashes, newest first.
    pub fn history(&self) -> &[PasswordHistoryEntry] {
        &self.password_history.0
    }

    /// History after a change to `new_hash`: prepended, truncated to the
    /// retention depth.
    pub fn next_history(&self, new_hash: &str, now: DateTime<Utc>) -> Vec<PasswordHistoryEntry> {
        let mut history = Vec::with_capacity(PASSWORD_HISTORY_DEPTH);
        history.push(PasswordHistoryEntry {
            password_hash_text: new_hash.to_string(),
            changed_utc: now,
        });
        history.extend(self.history().iter().cloned());
        history.truncate(PASSWORD_HISTORY_DEPTH);
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AuthRecord {
        AuthRecord::new(
            Uuid::new_v4(),
            "user@example.com".to_string(),
            Uuid::new_v4(),
            "$argon2id$hash0".to_string(),
        )
    }

    #[test]
    fn test_new_record_seeds_history_with_current_hash() {
        let record = record();
        assert_eq!(record.history().len(), 1);
        assert_eq!(record.history()[0].password_hash_text, record.password_hash_text);
        assert_eq!(record.failed_attempt_count, 0);
        assert!(record.lockout_until_utc.is_none());
    }

    #[test]
    fn test_next_history_prepends_newest_first() {
        let record = record();
        let history = record.next_history("$argon2id$hash1", Utc::now());

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].password_hash_text, "$argon2id$hash1");
        assert_eq!(history[1].password_hash_text, "$argon2id$hash0");
    }

    #[test]
    fn test_next_history_caps_at_retention_depth() {
        let mut record = record();
        for i in 1..=7 {
            let history = record.next_history(&format!("$argon2id$hash{}", i), Utc::now());
            record.password_history = Json(history);
        }

        let history = record.history();
        assert_eq!(history.len(), PASSWORD_HISTORY_DEPTH);
        assert_eq!(history[0].password_hash_text, "$argon2id$hash7");
        // hash2 is the oldest survivor; hash0 and hash1 have aged out
        assert_eq!(history[4].password_hash_text, "$argon2id$hash3");
        assert!(!history.iter().any(|e| e.password_hash_text == "$argon2id$hash0"));
    }
}
