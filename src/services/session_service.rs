//! Session issuance, resolution and revocation

use crate::{
    auth::token::{token_digest, SessionClaims, SignedToken, TokenKind, TokenSigner},
    config::SessionConfig,
    error::AppError,
    models::{
        principal::Principal,
        session::{IssuedServiceSession, ServiceSessionToken, UserSessionToken},
    },
    repository::{ServiceAccountRepository, SessionRepository, UserRepository},
};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub struct SessionService {
    db: PgPool,
    signer: Arc<TokenSigner>,
    refresh_window: Duration,
}

impl SessionService {
    pub fn new(db: PgPool, signer: Arc<TokenSigner>, config: &SessionConfig) -> Self {
        Self {
            db,
            signer,
            refresh_window: Duration::minutes(config.refresh_window_minutes as i64),
        }
    }

    /// Mint and persist a human session
    pub async fn issue_user(&self, user_id: Uuid) -> Result<SignedToken, AppError> {
        let signed = self.signer.sign(user_id, TokenKind::User)?;

        let repo = SessionRepository::new(self.db.clone());
        repo.insert_user_session(&UserSessionToken {
            id: Uuid::new_v4(),
            token_hash: token_digest(&signed.token),
            user_id,
            expires_at: signed.expires_at,
        })
        .await?;

        debug!(user_id = %user_id, expires_at = signed.expires_at, "User session issued");
        Ok(signed)
    }

    /// Mint and persist a service session with a fresh refresh token
    pub async fn issue_service(&self, account_id: Uuid) -> Result<IssuedServiceSession, AppError> {
        let (row, issued) = self.build_service_session(account_id)?;

        let repo = SessionRepository::new(self.db.clone());
        repo.insert_service_session(&row).await?;

        debug!(service_account_id = %account_id, expires_at = issued.expires_at, "Service session issued");
        Ok(issued)
    }

    /// Validate a presented token and load its principal.
    ///
    /// Signature and expiry are checked first, then the persisted row, so a
    /// revoked token is rejected even while its signature is still good.
    pub async fn resolve(&self, token: &str, kind: TokenKind) -> Result<Principal, AppError> {
        let claims = self.signer.verify_kind(token, kind)?;
        let digest = token_digest(token);
        let sessions = SessionRepository::new(self.db.clone());

        match kind {
            TokenKind::User => {
                sessions
                    .find_user_session(&digest)
                    .await?
                    .ok_or(AppError::TokenInvalid)?;

                let user = UserRepository::new(self.db.clone())
                    .find_by_id(claims.sub)
                    .await?
                    .ok_or(AppError::TokenInvalid)?;

                Ok(Principal::User(user))
            }
            TokenKind::Service => {
                sessions
                    .find_service_session(&digest)
                    .await?
                    .ok_or(AppError::TokenInvalid)?;

                let account = ServiceAccountRepository::new(self.db.clone())
                    .find_by_id(claims.sub)
                    .await?
                    .filter(|a| a.active)
                    .ok_or(AppError::TokenInvalid)?;

                Ok(Principal::Service(account))
            }
        }
    }

    /// Delete the session behind a token. Expired tokens can still be revoked;
    /// revoking an already deleted session is not an error.
    pub async fn revoke(&self, token: &str, kind: TokenKind) -> Result<SessionClaims, AppError> {
        let claims = self.signer.verify_ignoring_expiry(token, kind)?;
        let digest = token_digest(token);
        let repo = SessionRepository::new(self.db.clone());

        let deleted = match kind {
            TokenKind::User => repo.delete_user_session(&digest).await?,
            TokenKind::Service => repo.delete_service_session(&digest).await?,
        };

        debug!(subject = %claims.sub, kind = ?kind, deleted, "Session revoked");
        Ok(claims)
    }

    /// Exchange a single-use refresh token for a new service session.
    /// Returns the new session and the owning account.
    pub async fn refresh(
        &self,
        refresh_token: &str,
    ) -> Result<(IssuedServiceSession, Uuid), AppError> {
        let refresh_token =
            Uuid::parse_str(refresh_token.trim()).map_err(|_| AppError::InvalidCredentials)?;
        let min_issued_at = (Utc::now() - self.refresh_window).timestamp();

        let mut issued = None;
        let repo = SessionRepository::new(self.db.clone());
        let row = repo
            .exchange_refresh_token(
                &token_digest(&refresh_token.to_string()),
                min_issued_at,
                |account_id| {
                    let (row, session) = self.build_service_session(account_id)?;
                    issued = Some(session);
                    Ok(row)
                },
            )
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let issued = issued.ok_or_else(|| AppError::internal_error("refresh produced no session"))?;
        Ok((issued, row.service_account_id))
    }

    /// Delete expired sessions of both kinds
    pub async fn sweep_expired(&self) -> Result<u64, AppError> {
        let now = Utc::now();
        let repo = SessionRepository::new(self.db.clone());

        let removed = repo
            .sweep_expired(now.timestamp(), (now - self.refresh_window).timestamp())
            .await?;

        metrics::counter!("sessions_swept_total").increment(removed);
        if removed > 0 {
            info!(removed, "Expired sessions swept");
        }

        Ok(removed)
    }

    fn build_service_session(
        &self,
        account_id: Uuid,
    ) -> Result<(ServiceSessionToken, IssuedServiceSession), AppError> {
        let signed = self.signer.sign(account_id, TokenKind::Service)?;
        let refresh_token = Uuid::new_v4();

        let row = ServiceSessionToken {
            id: Uuid::new_v4(),
            token_hash: token_digest(&signed.token),
            refresh_token_hash: token_digest(&refresh_token.to_string()),
            service_account_id: account_id,
            expires_at: signed.expires_at,
            issued_at: signed.issued_at,
        };

        let issued = IssuedServiceSession {
            session_token: signed.token,
            refresh_token,
            expires_at: signed.expires_at,
        };

        Ok((row, issued))
    }
}
