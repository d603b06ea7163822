//! Shared fixtures: an auth service wired to the in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use identity_service::config::JwtConfig;
use identity_service::dtos::LoginRequest;
use identity_service::models::{AuthRecord, UserState};
use identity_service::services::{AuthService, JwtService, MemoryAuditSink, MinLengthPolicy};
use identity_service::store::MemoryAuthStore;
use identity_service::utils::{hash_password, Password};
use uuid::Uuid;

pub struct Harness {
    pub service: AuthService,
    pub store: Arc<MemoryAuthStore>,
    pub audit: Arc<MemoryAuditSink>,
    pub jwt: JwtService,
}

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        access_token_secret: "test-access-secret-0123456789abcdef".to_string(),
        refresh_token_secret: "test-refresh-secret-0123456789abcdef".to_string(),
        access_token_ttl_secs: 900,
        refresh_token_ttl_secs: 3600,
    }
}

pub fn harness() -> Harness {
    let jwt = JwtService::new(&jwt_config());
    let store = Arc::new(MemoryAuthStore::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let service = AuthService::new(
        store.clone(),
        jwt.clone(),
        Arc::new(MinLengthPolicy::default()),
        audit.clone(),
    );
    Harness {
        service,
        store,
        audit,
        jwt,
    }
}

pub async fn seed_user(store: &MemoryAuthStore, email: &str, password: &str) -> Uuid {
    seed_user_with_state(store, email, password, UserState::Active).await
}

pub async fn seed_user_with_state(
    store: &MemoryAuthStore,
    email: &str,
    password: &str,
    state: UserState,
) -> Uuid {
    let hash = hash_password(&Password::new(password.to_string())).unwrap();
    let record = AuthRecord::new(
        Uuid::new_v4(),
        email.to_string(),
        Uuid::new_v4(),
        hash.into_string(),
    );
    let user_id = record.user_id;
    store.seed_account(record, state).await;
    user_id
}

pub fn login_req(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    }
}

/// Parse the session id out of an access token.
pub fn session_id_of(jwt: &JwtService, access_token: &str) -> Uuid {
    let claims = jwt.verify_access(access_token).unwrap();
    claims.sid.parse().unwrap()
}
