//! Session lifecycle orchestration.
//!
//! Sessions and their tokens are issued, rotated and revoked as one unit.
//! Every method takes the caller's transaction handle, so the enclosing
//! operation (login, refresh, logout, password change) stays atomic.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ClientContext, Session, Token, TokenType};
use crate::services::{JwtService, ServiceError};
use crate::store::{AuthTx, SessionAccess, TokenAccess};

/// Raw token pair handed to the caller exactly once; only hashes persist.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// A freshly issued session with its first token pair.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session: Session,
    pub tokens: IssuedTokens,
}

#[derive(Clone)]
pub struct SessionLifecycle {
    jwt: JwtService,
}

impl SessionLifecycle {
    pub fn new(jwt: JwtService) -> Self {
        Self { jwt }
    }

    /// Create a session and bind an access/refresh pair to it.
    pub async fn issue_session(
        &self,
        tx: &mut dyn AuthTx,
        user_id: Uuid,
        role_id: Uuid,
        client: &ClientContext,
    ) -> Result<IssuedSession, ServiceError> {
        let session = Session::new(user_id, role_id, client, self.jwt.refresh_ttl_secs());
        tx.insert_session(&session).await?;

        let tokens = self.issue_pair(tx, &session).await?;
        Ok(IssuedSession { session, tokens })
    }

    /// Rotate a session's tokens: consume the presented refresh token, revoke
    /// any still-live access token under the session, and bind a new pair.
    pub async fn rotate(
        &self,
        tx: &mut dyn AuthTx,
        session: &Session,
        presented: &Token,
    ) -> Result<IssuedTokens, ServiceError> {
        tx.revoke_token(presented.token_id).await?;
        tx.revoke_live_access_tokens(session.session_id).await?;
        self.issue_pair(tx, session).await
    }

    /// Revoke one session and every token bound to it. `logged_out` stamps
    /// the explicit-logout marker as well.
    pub async fn revoke_session(
        &self,
        tx: &mut dyn AuthTx,
        session_id: Uuid,
        at: DateTime<Utc>,
        logged_out: bool,
    ) -> Result<(), ServiceError> {
        if logged_out {
            tx.mark_logged_out(session_id, at).await?;
        } else {
            tx.revoke_session(session_id, at).await?;
        }
        tx.revoke_tokens_for_session(session_id).await?;
        Ok(())
    }

    /// Revoke every session and token the user holds. Returns how many
    /// sessions were revoked.
    pub async fn revoke_all_for_user(
        &self,
        tx: &mut dyn AuthTx,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        let revoked = tx.revoke_sessions_for_user(user_id, at).await?;
        tx.revoke_tokens_for_user(user_id).await?;
        Ok(revoked)
    }

    async fn issue_pair(
        &self,
        tx: &mut dyn AuthTx,
        session: &Session,
    ) -> Result<IssuedTokens, ServiceError> {
        let (access_token, access_id) =
            self.jwt
                .mint_access(session.user_id, session.role_id, session.session_id)?;
        tx.insert_token(&Token::issue(
            access_id,
            session.user_id,
            Some(session.session_id),
            TokenType::Access,
            &access_token,
            self.jwt.access_ttl_secs(),
        ))
        .await?;

        let (refresh_token, refresh_id) =
            self.jwt
                .mint_refresh(session.user_id, session.role_id, session.session_id)?;
        tx.insert_token(&Token::issue(
            refresh_id,
            session.user_id,
            Some(session.session_id),
            TokenType::Refresh,
            &refresh_token,
            self.jwt.refresh_ttl_secs(),
        ))
        .await?;

        Ok(IssuedTokens {
            access_token,
            refresh_token,
        })
    }
}
