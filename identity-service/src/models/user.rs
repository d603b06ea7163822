//! User state codes, mirrored from the user-management service.

use serde::{Deserialize, Serialize};

/// User state codes. Only `active` users may authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserState {
    Active,
    Suspended,
    Deactivated,
}

impl UserState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserState::Active => "active",
            UserState::Suspended => "suspended",
            UserState::Deactivated => "deactivated",
        }
    }
}
