mod common;

use chrono::{Duration, Utc};
use identity_service::dtos::RefreshRequest;
use identity_service::models::ClientContext;
use identity_service::services::{RefreshTokenClaims, ServiceError};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use uuid::Uuid;

use common::{harness, jwt_config, login_req, seed_user, session_id_of, Harness};

async fn logged_in(h: &Harness, email: &str) -> (Uuid, String, String) {
    seed_user(&h.store, email, "correct horse battery").await;
    let res = h
        .service
        .login(login_req(email, "correct horse battery"), ClientContext::default())
        .await
        .unwrap();
    let session_id = session_id_of(&h.jwt, &res.access_token);
    (session_id, res.access_token, res.refresh_token)
}

fn refresh_req(token: &str) -> RefreshRequest {
    RefreshRequest {
        refresh_token: token.to_string(),
    }
}

#[tokio::test]
async fn test_refresh_rotates_the_pair_within_the_session() {
    let h = harness();
    let (session_id, access, refresh) = logged_in(&h, "rotate@example.com").await;

    let rotated = h.service.refresh(refresh_req(&refresh)).await.unwrap();
    assert_ne!(rotated.access_token, access);
    assert_ne!(rotated.refresh_token, refresh);

    // Same session, two generations of tokens; the old generation is revoked
    assert_eq!(session_id_of(&h.jwt, &rotated.access_token), session_id);
    assert!(h.store.session(session_id).await.unwrap().is_active());

    let tokens = h.store.tokens_for_session(session_id).await;
    assert_eq!(tokens.len(), 4);
    assert_eq!(tokens.iter().filter(|t| t.revoked_flag).count(), 2);
    assert_eq!(tokens.iter().filter(|t| !t.revoked_flag).count(), 2);
}

#[tokio::test]
async fn test_replaying_a_consumed_refresh_token_revokes_the_session() {
    let h = harness();
    let (session_id, _, refresh) = logged_in(&h, "replay@example.com").await;

    let rotated = h.service.refresh(refresh_req(&refresh)).await.unwrap();

    // Replay of the consumed token is reuse: the whole session dies
    let err = h.service.refresh(refresh_req(&refresh)).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidRefreshToken));
    assert!(!h.store.session(session_id).await.unwrap().is_active());

    // Which also kills the replacement pair
    let err = h
        .service
        .refresh(refresh_req(&rotated.refresh_token))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidRefreshToken));

    let tokens = h.store.tokens_for_session(session_id).await;
    assert!(tokens.iter().all(|t| t.revoked_flag));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let activity = h.audit.token_activity.lock().unwrap();
    assert!(activity.iter().any(|a| a.activity_code == "reuse_detected"));
}

#[tokio::test]
async fn test_missing_and_garbage_tokens_are_rejected_without_store_access() {
    let h = harness();

    let err = h.service.refresh(refresh_req("")).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidRefreshToken));

    let err = h
        .service
        .refresh(refresh_req("not.a.jwt"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidRefreshToken));
}

#[tokio::test]
async fn test_access_token_is_not_accepted_for_refresh() {
    let h = harness();
    let (_, access, _) = logged_in(&h, "crosskey@example.com").await;

    // Signed with the access key: the refresh key rejects it outright
    let err = h.service.refresh(refresh_req(&access)).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidRefreshToken));
}

#[tokio::test]
async fn test_well_signed_but_unknown_token_is_rejected() {
    let h = harness();

    // Well-formed, valid signature, but no matching row was ever persisted
    let (token, _) = h
        .jwt
        .mint_refresh(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
        .unwrap();
    let err = h.service.refresh(refresh_req(&token)).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidRefreshToken));
}

#[tokio::test]
async fn test_expired_signature_maps_to_refresh_token_expired() {
    let h = harness();

    let now = Utc::now();
    let claims = RefreshTokenClaims {
        sub: Uuid::new_v4().to_string(),
        role_id: Uuid::new_v4().to_string(),
        sid: Uuid::new_v4().to_string(),
        jti: Uuid::new_v4().to_string(),
        iat: (now - Duration::hours(3)).timestamp(),
        exp: (now - Duration::hours(2)).timestamp(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_config().refresh_token_secret.as_bytes()),
    )
    .unwrap();

    let err = h.service.refresh(refresh_req(&token)).await.unwrap_err();
    assert!(matches!(err, ServiceError::RefreshTokenExpired));
}

#[tokio::test]
async fn test_expired_token_row_maps_to_refresh_token_expired() {
    let h = harness();
    let (session_id, _, refresh) = logged_in(&h, "rowexpiry@example.com").await;

    let refresh_row = h
        .store
        .tokens_for_session(session_id)
        .await
        .into_iter()
        .find(|t| t.token_type_code == "refresh")
        .unwrap();
    h.store
        .update_token(refresh_row.token_id, |t| {
            t.expiry_utc = Utc::now() - Duration::seconds(1);
        })
        .await;

    let err = h.service.refresh(refresh_req(&refresh)).await.unwrap_err();
    assert!(matches!(err, ServiceError::RefreshTokenExpired));

    // Expiry is not reuse: the session itself is left alone
    assert!(h.store.session(session_id).await.unwrap().is_active());
}

#[tokio::test]
async fn test_token_row_with_wrong_type_is_rejected() {
    let h = harness();
    let (session_id, _, refresh) = logged_in(&h, "wrongtype@example.com").await;

    let refresh_row = h
        .store
        .tokens_for_session(session_id)
        .await
        .into_iter()
        .find(|t| t.token_type_code == "refresh")
        .unwrap();
    h.store
        .update_token(refresh_row.token_id, |t| {
            t.token_type_code = "access".to_string();
        })
        .await;

    let err = h.service.refresh(refresh_req(&refresh)).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidRefreshToken));
}

#[tokio::test]
async fn test_refresh_against_an_expired_session_is_rejected() {
    let h = harness();
    let (session_id, _, refresh) = logged_in(&h, "deadsession@example.com").await;

    h.store
        .update_session(session_id, |s| {
            s.expiry_utc = Utc::now() - Duration::seconds(1);
        })
        .await;

    let err = h.service.refresh(refresh_req(&refresh)).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidSession));
}
