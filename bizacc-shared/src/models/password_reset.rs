/// Password reset requests
///
/// Reset tokens are handed to the actor once and only their SHA-256 hash is
/// kept, in the internal `passwordResets` collection. A token is valid until
/// it expires or is used, whichever comes first. Issuing a new token for an
/// actor retires the actor's earlier ones.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::reset_token::constant_time_compare;
use crate::store::{EntityType, RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum PasswordResetError {
    #[error("Reset token is invalid")]
    InvalidToken,

    #[error("Reset token has expired")]
    Expired,

    #[error("Reset token has already been used")]
    AlreadyUsed,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordReset {
    pub id: Uuid,
    pub actor_id: Uuid,

    /// SHA-256 hex of the token
    pub token_hash: String,

    pub expires_at: DateTime<Utc>,

    #[serde(default)]
    pub used: bool,

    pub created_at: DateTime<Utc>,
}

impl PasswordReset {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    fn check(&self, now: DateTime<Utc>) -> Result<(), PasswordResetError> {
        if self.used {
            return Err(PasswordResetError::AlreadyUsed);
        }
        if self.is_expired(now) {
            return Err(PasswordResetError::Expired);
        }
        Ok(())
    }

    /// Stores a new reset for `actor_id`
    ///
    /// Earlier unused resets for the actor are marked used and expired
    /// entries are pruned.
    pub async fn issue(
        store: &RecordStore,
        actor_id: Uuid,
        token_hash: String,
        ttl: Duration,
    ) -> Result<PasswordReset, StoreError> {
        let now = Utc::now();
        let reset = PasswordReset {
            id: Uuid::new_v4(),
            actor_id,
            token_hash,
            expires_at: now + ttl,
            used: false,
            created_at: now,
        };

        store
            .modify(EntityType::PasswordResets, |resets: &mut Vec<PasswordReset>| {
                resets.retain(|r| !r.is_expired(now));
                for r in resets.iter_mut().filter(|r| r.actor_id == actor_id) {
                    r.used = true;
                }
                resets.push(reset.clone());
                Ok::<_, StoreError>(())
            })
            .await?;

        Ok(reset)
    }

    /// Looks up a usable reset by token hash
    pub async fn verify(store: &RecordStore, token_hash: &str) -> Result<PasswordReset, PasswordResetError> {
        let resets: Vec<PasswordReset> = store.load(EntityType::PasswordResets).await;
        let reset = resets
            .into_iter()
            .find(|r| constant_time_compare(&r.token_hash, token_hash))
            .ok_or(PasswordResetError::InvalidToken)?;

        reset.check(Utc::now())?;
        Ok(reset)
    }

    /// Marks a reset used; fails if it is not usable
    pub async fn consume(store: &RecordStore, token_hash: &str) -> Result<PasswordReset, PasswordResetError> {
        let now = Utc::now();
        store
            .modify(EntityType::PasswordResets, |resets: &mut Vec<PasswordReset>| {
                let reset = resets
                    .iter_mut()
                    .find(|r| constant_time_compare(&r.token_hash, token_hash))
                    .ok_or(PasswordResetError::InvalidToken)?;
                reset.check(now)?;
                reset.used = true;
                Ok(reset.clone())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_is_single_use() {
        let store = RecordStore::memory();
        let actor = Uuid::new_v4();
        PasswordReset::issue(&store, actor, "h1".into(), Duration::hours(1))
            .await
            .unwrap();

        assert!(PasswordReset::verify(&store, "h1").await.is_ok());
        let consumed = PasswordReset::consume(&store, "h1").await.unwrap();
        assert_eq!(consumed.actor_id, actor);

        assert!(matches!(
            PasswordReset::consume(&store, "h1").await,
            Err(PasswordResetError::AlreadyUsed)
        ));
        assert!(matches!(
            PasswordReset::verify(&store, "nope").await,
            Err(PasswordResetError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let store = RecordStore::memory();
        PasswordReset::issue(&store, Uuid::new_v4(), "h".into(), Duration::seconds(-1))
            .await
            .unwrap();

        assert!(matches!(
            PasswordReset::verify(&store, "h").await,
            Err(PasswordResetError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_new_token_retires_old_ones() {
        let store = RecordStore::memory();
        let actor = Uuid::new_v4();
        PasswordReset::issue(&store, actor, "old".into(), Duration::hours(1))
            .await
            .unwrap();
        PasswordReset::issue(&store, actor, "new".into(), Duration::hours(1))
            .await
            .unwrap();

        assert!(matches!(
            PasswordReset::verify(&store, "old").await,
            Err(PasswordResetError::AlreadyUsed)
        ));
        assert!(PasswordReset::verify(&store, "new").await.is_ok());
    }
}
