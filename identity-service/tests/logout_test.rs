mod common;

use identity_service::dtos::RefreshRequest;
use identity_service::models::ClientContext;
use identity_service::services::ServiceError;
use uuid::Uuid;

use common::{harness, login_req, seed_user, session_id_of};

#[tokio::test]
async fn test_logout_revokes_the_session_and_its_tokens() {
    let h = harness();
    let user_id = seed_user(&h.store, "logout@example.com", "correct horse battery").await;

    let res = h
        .service
        .login(
            login_req("logout@example.com", "correct horse battery"),
            ClientContext::default(),
        )
        .await
        .unwrap();
    let session_id = session_id_of(&h.jwt, &res.access_token);

    h.service
        .logout(Some(user_id), Some(session_id))
        .await
        .unwrap();

    let session = h.store.session(session_id).await.unwrap();
    assert!(session.revoked_utc.is_some());
    assert!(session.logged_out_utc.is_some());
    assert!(!session.is_active());

    let tokens = h.store.tokens_for_session(session_id).await;
    assert!(tokens.iter().all(|t| t.revoked_flag));

    // The refresh token no longer works
    let err = h
        .service
        .refresh(RefreshRequest {
            refresh_token: res.refresh_token,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidRefreshToken));
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let h = harness();
    let user_id = seed_user(&h.store, "twice@example.com", "correct horse battery").await;

    let res = h
        .service
        .login(
            login_req("twice@example.com", "correct horse battery"),
            ClientContext::default(),
        )
        .await
        .unwrap();
    let session_id = session_id_of(&h.jwt, &res.access_token);

    h.service
        .logout(Some(user_id), Some(session_id))
        .await
        .unwrap();
    let first_marker = h.store.session(session_id).await.unwrap().logged_out_utc;

    // Second logout succeeds and leaves the original markers untouched
    h.service
        .logout(Some(user_id), Some(session_id))
        .await
        .unwrap();
    let session = h.store.session(session_id).await.unwrap();
    assert_eq!(session.logged_out_utc, first_marker);
    assert!(!session.is_active());
}

#[tokio::test]
async fn test_logout_with_missing_identifiers_is_a_noop() {
    let h = harness();
    let user_id = seed_user(&h.store, "noop@example.com", "correct horse battery").await;

    let res = h
        .service
        .login(
            login_req("noop@example.com", "correct horse battery"),
            ClientContext::default(),
        )
        .await
        .unwrap();
    let session_id = session_id_of(&h.jwt, &res.access_token);

    h.service.logout(None, Some(session_id)).await.unwrap();
    h.service.logout(Some(user_id), None).await.unwrap();
    h.service.logout(None, None).await.unwrap();

    // Nothing was revoked
    assert!(h.store.session(session_id).await.unwrap().is_active());

    // An unknown session id is equally harmless
    h.service
        .logout(Some(user_id), Some(Uuid::new_v4()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_logout_ignores_a_session_owned_by_someone_else() {
    let h = harness();
    seed_user(&h.store, "owner@example.com", "correct horse battery").await;
    let other_id = seed_user(&h.store, "other@example.com", "correct horse battery").await;

    let res = h
        .service
        .login(
            login_req("owner@example.com", "correct horse battery"),
            ClientContext::default(),
        )
        .await
        .unwrap();
    let session_id = session_id_of(&h.jwt, &res.access_token);

    // The other user cannot revoke the owner's session
    h.service
        .logout(Some(other_id), Some(session_id))
        .await
        .unwrap();
    assert!(h.store.session(session_id).await.unwrap().is_active());
}
