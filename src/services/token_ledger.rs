use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::{fingerprint, JwtError, TokenKeys, TokenKind};
use crate::database::models::{NewTokenRecord, Role, User};
use crate::database::{DatabaseError, TokenStore, UserStore};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Refresh token not found or revoked")]
    NotFound,

    #[error("Invalid token")]
    Invalid,

    #[error("Token has expired")]
    Expired,

    #[error("Token has been revoked or is invalid")]
    Revoked,

    #[error("User no longer exists")]
    UserMissing,

    #[error("Your account has been deactivated")]
    UserDeactivated,

    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<JwtError> for TokenError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => TokenError::Expired,
            JwtError::Invalid => TokenError::Invalid,
            JwtError::Signing(msg) => TokenError::Signing(msg),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Session ledger: every honoured token pair has a live record here.
///
/// A record moves from active, through any number of in-place rotations, to
/// revoked. Revocation is terminal.
#[derive(Clone)]
pub struct TokenLedger {
    keys: Arc<TokenKeys>,
    tokens: Arc<dyn TokenStore>,
    users: Arc<dyn UserStore>,
    record_ttl: Duration,
}

impl TokenLedger {
    pub fn new(
        keys: Arc<TokenKeys>,
        tokens: Arc<dyn TokenStore>,
        users: Arc<dyn UserStore>,
        record_ttl: Duration,
    ) -> Self {
        Self {
            keys,
            tokens,
            users,
            record_ttl,
        }
    }

    fn mint(&self, user_id: uuid::Uuid, role: Role) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.keys.sign(TokenKind::Access, user_id, role)?,
            refresh_token: self.keys.sign(TokenKind::Refresh, user_id, role)?,
        })
    }

    /// Mint a pair and open a ledger record for it.
    pub async fn issue(&self, user_id: uuid::Uuid, role: Role) -> Result<TokenPair, TokenError> {
        let pair = self.mint(user_id, role)?;
        self.tokens
            .insert(NewTokenRecord {
                user_id,
                access_token_hash: fingerprint(&pair.access_token),
                refresh_token_hash: fingerprint(&pair.refresh_token),
                expires_at: Utc::now() + self.record_ttl,
            })
            .await?;
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair on the same record. The old
    /// refresh token stops working as soon as this returns.
    pub async fn rotate(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        let old_hash = fingerprint(refresh_token);
        let now = Utc::now();

        self.tokens
            .find_live_by_refresh(&old_hash, now)
            .await?
            .ok_or(TokenError::NotFound)?;

        let claims = self.keys.verify(TokenKind::Refresh, refresh_token)?;

        // Re-read the user so a role change since issue is reflected in the new pair
        let user = self.users.find_by_id(claims.sub).await?.ok_or(TokenError::UserMissing)?;
        if !user.is_active {
            return Err(TokenError::UserDeactivated);
        }

        let pair = self.mint(user.id, user.role)?;
        self.tokens
            .replace_pair(
                &old_hash,
                &fingerprint(&pair.access_token),
                &fingerprint(&pair.refresh_token),
                now,
            )
            .await?
            .ok_or_else(|| {
                tracing::warn!(user_id = %user.id, "Refresh token reused during rotation");
                TokenError::NotFound
            })?;

        Ok(pair)
    }

    /// Revoke the record holding this refresh token. Unknown or already
    /// revoked tokens are not an error.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), TokenError> {
        let revoked = self.tokens.revoke_by_refresh(&fingerprint(refresh_token)).await?;
        tracing::debug!(revoked, "Processed refresh token revocation");
        Ok(())
    }

    /// Signature, expiry, live ledger record, then an active owner.
    pub async fn validate_access(&self, access_token: &str) -> Result<User, TokenError> {
        let claims = self.keys.verify(TokenKind::Access, access_token)?;

        self.tokens
            .find_live_by_access(&fingerprint(access_token), claims.sub, Utc::now())
            .await?
            .ok_or_else(|| {
                tracing::warn!(user_id = %claims.sub, "Rejected access token with no live ledger record");
                TokenError::Revoked
            })?;

        let user = self.users.find_by_id(claims.sub).await?.ok_or(TokenError::UserMissing)?;
        if !user.is_active {
            return Err(TokenError::UserDeactivated);
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{NewUser, UserPatch};
    use crate::database::MemoryStore;

    async fn setup(record_ttl: Duration) -> (TokenLedger, Arc<MemoryStore>, User) {
        let store = Arc::new(MemoryStore::new());
        let user = UserStore::insert(&*store, &NewUser::admin("Root", "Admin", "root@x.com", "x"), "hash")
            .await
            .unwrap();
        let keys = Arc::new(TokenKeys::new("secret", Duration::minutes(15), Duration::days(30)));
        let ledger = TokenLedger::new(keys, store.clone(), store.clone(), record_ttl);
        (ledger, store, user)
    }

    #[tokio::test]
    async fn issue_then_validate_then_revoke() {
        let (ledger, _, user) = setup(Duration::days(7)).await;
        let pair = ledger.issue(user.id, user.role).await.unwrap();

        let seen = ledger.validate_access(&pair.access_token).await.unwrap();
        assert_eq!(seen.id, user.id);

        ledger.revoke(&pair.refresh_token).await.unwrap();
        assert!(matches!(
            ledger.validate_access(&pair.access_token).await,
            Err(TokenError::Revoked)
        ));
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let (ledger, _, user) = setup(Duration::days(7)).await;
        let pair = ledger.issue(user.id, user.role).await.unwrap();
        ledger.revoke(&pair.refresh_token).await.unwrap();
        ledger.revoke(&pair.refresh_token).await.unwrap();
        ledger.revoke("never-issued").await.unwrap();
    }

    #[tokio::test]
    async fn rotate_is_single_use() {
        let (ledger, _, user) = setup(Duration::days(7)).await;
        let pair = ledger.issue(user.id, user.role).await.unwrap();

        let rotated = ledger.rotate(&pair.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);
        assert!(matches!(ledger.rotate(&pair.refresh_token).await, Err(TokenError::NotFound)));

        // The old access token lost its record too
        assert!(matches!(
            ledger.validate_access(&pair.access_token).await,
            Err(TokenError::Revoked)
        ));
        assert!(ledger.validate_access(&rotated.access_token).await.is_ok());
        assert!(ledger.rotate(&rotated.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_rotations_of_one_token_succeed_once() {
        let (ledger, _, user) = setup(Duration::days(7)).await;
        let pair = ledger.issue(user.id, user.role).await.unwrap();

        let (a, b) = tokio::join!(ledger.rotate(&pair.refresh_token), ledger.rotate(&pair.refresh_token));
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    }

    #[tokio::test]
    async fn revoked_records_cannot_rotate() {
        let (ledger, _, user) = setup(Duration::days(7)).await;
        let pair = ledger.issue(user.id, user.role).await.unwrap();
        ledger.revoke(&pair.refresh_token).await.unwrap();
        assert!(matches!(ledger.rotate(&pair.refresh_token).await, Err(TokenError::NotFound)));
    }

    #[tokio::test]
    async fn expired_ledger_record_is_not_honoured() {
        let (ledger, _, user) = setup(Duration::seconds(-1)).await;
        let pair = ledger.issue(user.id, user.role).await.unwrap();
        assert!(matches!(
            ledger.validate_access(&pair.access_token).await,
            Err(TokenError::Revoked)
        ));
        assert!(matches!(ledger.rotate(&pair.refresh_token).await, Err(TokenError::NotFound)));
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() {
        let (ledger, _, user) = setup(Duration::days(7)).await;
        let pair = ledger.issue(user.id, user.role).await.unwrap();
        assert!(matches!(
            ledger.validate_access(&pair.refresh_token).await,
            Err(TokenError::Invalid)
        ));
    }

    #[tokio::test]
    async fn deactivated_and_missing_owners_are_reported() {
        let (ledger, store, user) = setup(Duration::days(7)).await;
        let pair = ledger.issue(user.id, user.role).await.unwrap();

        store
            .update_fields(
                user.id,
                &UserPatch {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            ledger.validate_access(&pair.access_token).await,
            Err(TokenError::UserDeactivated)
        ));

        // Deleting the user cascades to its ledger records
        let (ledger, store, user) = setup(Duration::days(7)).await;
        let pair = ledger.issue(user.id, user.role).await.unwrap();
        store.delete(user.id).await.unwrap();
        assert!(ledger.validate_access(&pair.access_token).await.is_err());
    }
}
