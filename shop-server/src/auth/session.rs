//! Session manager: access/refresh token lifecycle
//!
//! Refresh tokens are persisted; the stored record is authoritative for
//! refresh and logout. Rotation rewrites the same row, so a rotated-out
//! token string no longer exists anywhere.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use shared::models::UserProfile;
use thiserror::Error;

use super::expiry::Expiry;
use super::jwt::{AccessClaims, RefreshClaims, TokenCodec, TokenVerdict};
use crate::db::{NewRefreshToken, Store, StoreTx};
use crate::error::ServiceResult;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Expiry,
    pub refresh_ttl: Expiry,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionConfigError {
    #[error("token secrets must not be empty")]
    EmptySecret,
    #[error("access and refresh token secrets must differ")]
    SharedSecret,
}

/// Freshly minted tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct SessionManager {
    store: Arc<dyn Store>,
    access: TokenCodec,
    refresh: TokenCodec,
    access_ttl: Expiry,
    refresh_ttl: Expiry,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>, config: &SessionConfig) -> Result<Self, SessionConfigError> {
        if config.access_secret.is_empty() || config.refresh_secret.is_empty() {
            return Err(SessionConfigError::EmptySecret);
        }
        if config.access_secret == config.refresh_secret {
            return Err(SessionConfigError::SharedSecret);
        }
        Ok(Self {
            store,
            access: TokenCodec::new(&config.access_secret),
            refresh: TokenCodec::new(&config.refresh_secret),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        })
    }

    /// Lifetime of refresh tokens (cookie Max-Age)
    pub fn refresh_ttl(&self) -> Expiry {
        self.refresh_ttl
    }

    /// Mint a pair and persist the refresh record in its own transaction
    pub async fn issue(&self, user: &UserProfile) -> ServiceResult<TokenPair> {
        let mut tx = self.store.begin().await?;
        let pair = self.issue_in(tx.as_mut(), user).await?;
        tx.commit().await?;
        Ok(pair)
    }

    /// Mint a pair and persist the refresh record inside `tx`
    pub async fn issue_in(
        &self,
        tx: &mut dyn StoreTx,
        user: &UserProfile,
    ) -> ServiceResult<TokenPair> {
        let now = Utc::now();
        let (pair, expires_at) = self.mint(user, now)?;
        tx.insert_refresh_token(NewRefreshToken {
            user_id: user.id,
            token: pair.refresh_token.clone(),
            expires_at,
        })
        .await?;
        tracing::debug!(user_id = user.id, "Issued token pair");
        Ok(pair)
    }

    /// Decode an access token
    pub fn verify_access(&self, token: &str) -> Result<UserProfile, AppError> {
        match self.access.verify::<AccessClaims>(token) {
            TokenVerdict::Valid(claims) => Ok(claims.user),
            TokenVerdict::Expired => Err(AppError::token_expired()),
            TokenVerdict::Invalid(reason) => {
                tracing::debug!(reason = %reason, "Access token rejected");
                Err(AppError::with_message(ErrorCode::TokenInvalid, "Unauthorized"))
            }
        }
    }

    /// Exchange a refresh token for a new pair, rotating the stored record in place
    pub async fn refresh(&self, old_token: &str) -> ServiceResult<(UserProfile, TokenPair)> {
        let mut tx = self.store.begin().await?;

        let Some(record) = tx.find_refresh_token(old_token).await? else {
            return Err(unauthorized("Invalid refresh token").into());
        };

        let now = Utc::now();
        if record.expires_at <= now {
            tx.delete_refresh_token(old_token).await?;
            tx.commit().await?;
            tracing::debug!(user_id = record.user_id, "Expired refresh token removed");
            return Err(unauthorized("Refresh token expired").into());
        }

        if record.revoked {
            return Err(unauthorized("Refresh token revoked").into());
        }

        let Some(user) = tx.find_user_by_id(record.user_id).await? else {
            return Err(unauthorized("Invalid refresh token").into());
        };
        let profile = user.profile();

        let (pair, expires_at) = self.mint(&profile, now)?;
        tx.update_refresh_token(record.id, &pair.refresh_token, expires_at)
            .await?;
        tx.commit().await?;

        tracing::debug!(user_id = profile.id, "Rotated refresh token");
        Ok((profile, pair))
    }

    /// Delete the record for `token`; an unknown token is an error
    pub async fn revoke(&self, token: &str) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_refresh_token(token).await? {
            return Err(AppError::unauthorized().into());
        }
        tx.commit().await?;
        Ok(())
    }

    fn mint(
        &self,
        user: &UserProfile,
        now: DateTime<Utc>,
    ) -> Result<(TokenPair, DateTime<Utc>), AppError> {
        let access_exp = self.access_ttl.expires_at(now);
        let refresh_exp = self.refresh_ttl.expires_at(now);

        let access_token = self
            .access
            .sign(&AccessClaims::new(user, now, access_exp))
            .map_err(signing_failed)?;
        let refresh_token = self
            .refresh
            .sign(&RefreshClaims::new(user, now, refresh_exp))
            .map_err(signing_failed)?;

        Ok((
            TokenPair {
                access_token,
                refresh_token,
            },
            refresh_exp,
        ))
    }
}

fn unauthorized(message: &str) -> AppError {
    AppError::with_message(ErrorCode::NotAuthenticated, message)
}

fn signing_failed(e: jsonwebtoken::errors::Error) -> AppError {
    tracing::error!(error = %e, "Token signing failed");
    AppError::internal("Failed to sign token")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn config(access: &str, refresh: &str) -> SessionConfig {
        SessionConfig {
            access_secret: access.into(),
            refresh_secret: refresh.into(),
            access_ttl: Expiry::from_secs(900),
            refresh_ttl: Expiry::from_secs(604_800),
        }
    }

    #[test]
    fn rejects_shared_secret() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let err = SessionManager::new(store, &config("same", "same")).err();
        assert_eq!(err, Some(SessionConfigError::SharedSecret));
    }

    #[test]
    fn rejects_empty_secret() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let err = SessionManager::new(store, &config("", "refresh")).err();
        assert_eq!(err, Some(SessionConfigError::EmptySecret));
    }

    #[test]
    fn token_pair_serializes_camel_case() {
        let pair = TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
        };
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
    }
}
