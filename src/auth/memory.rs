//! In-process stores for tests and local development.
//!
//! Each operation runs under a single lock acquisition, which gives the same atomicity
//! the Postgres stores get from single statements.

use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{
    credentials::{CredentialStore, NewUser, User},
    error::{CredentialError, RefreshError},
    refresh::{RefreshToken, RefreshTokenStore, CREATE_ATTEMPTS},
    role::Role,
    utils::{generate_refresh_token, hash_refresh_token},
};

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Change a user's role, as an administrator would out of band.
    pub async fn set_role(&self, username: &str, role: Role) -> Result<(), CredentialError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(username).ok_or(CredentialError::NotFound)?;
        user.role = role;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<User, CredentialError> {
        self.users
            .read()
            .await
            .get(username)
            .cloned()
            .ok_or(CredentialError::NotFound)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User, CredentialError> {
        self.users
            .read()
            .await
            .values()
            .find(|user| user.id == id)
            .cloned()
            .ok_or(CredentialError::NotFound)
    }

    async fn save(&self, user: NewUser) -> Result<User, CredentialError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Err(CredentialError::DuplicateUsername);
        }
        let saved = User {
            id: Uuid::now_v7(),
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
        };
        users.insert(saved.username.clone(), saved.clone());
        Ok(saved)
    }
}

#[derive(Debug)]
struct RefreshRecord {
    user_id: Uuid,
    expires_at: i64,
    consumed_at: Option<i64>,
}

#[derive(Debug)]
pub struct MemoryRefreshTokenStore {
    ttl_seconds: i64,
    tokens: Mutex<HashMap<Vec<u8>, RefreshRecord>>,
}

impl MemoryRefreshTokenStore {
    #[must_use]
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            ttl_seconds,
            tokens: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn create(&self, user_id: Uuid, now: i64) -> Result<RefreshToken, RefreshError> {
        let expires_at = now
            .checked_add(self.ttl_seconds)
            .ok_or_else(|| RefreshError::Backend(anyhow!("refresh token expiry overflow")))?;
        let mut tokens = self.tokens.lock().await;

        for _ in 0..CREATE_ATTEMPTS {
            let token = generate_refresh_token().map_err(RefreshError::Backend)?;
            let token_hash = hash_refresh_token(&token);
            if tokens.contains_key(&token_hash) {
                continue;
            }
            tokens.insert(
                token_hash,
                RefreshRecord {
                    user_id,
                    expires_at,
                    consumed_at: None,
                },
            );
            return Ok(RefreshToken {
                token,
                user_id,
                expires_at,
            });
        }

        Err(RefreshError::Backend(anyhow!(
            "failed to generate a unique refresh token"
        )))
    }

    async fn verify_and_consume(&self, token: &str, now: i64) -> Result<Uuid, RefreshError> {
        let mut tokens = self.tokens.lock().await;
        let record = tokens
            .get_mut(&hash_refresh_token(token))
            .ok_or(RefreshError::NotFound)?;
        if record.consumed_at.is_some() {
            return Err(RefreshError::AlreadyUsed);
        }
        if now > record.expires_at {
            return Err(RefreshError::Expired);
        }
        record.consumed_at = Some(now);
        Ok(record.user_id)
    }

    async fn revoke(&self, token: &str, now: i64) -> Result<bool, RefreshError> {
        let mut tokens = self.tokens.lock().await;
        match tokens.get_mut(&hash_refresh_token(token)) {
            Some(record) if record.consumed_at.is_none() => {
                record.consumed_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired(&self, now: i64) -> Result<u64, RefreshError> {
        let mut tokens = self.tokens.lock().await;
        let before = tokens.len();
        tokens.retain(|_, record| record.expires_at >= now);
        Ok(u64::try_from(before - tokens.len()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const NOW: i64 = 1_700_000_000;
    const TTL: i64 = 3_600;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn save_then_find_by_username_and_id() -> anyhow::Result<()> {
        let store = MemoryCredentialStore::new();
        let saved = store.save(new_user("alice")).await?;
        assert_eq!(store.find_by_username("alice").await?, saved);
        assert_eq!(store.find_by_id(saved.id).await?, saved);
        Ok(())
    }

    #[tokio::test]
    async fn usernames_are_case_sensitive() -> anyhow::Result<()> {
        let store = MemoryCredentialStore::new();
        store.save(new_user("alice")).await?;
        assert!(matches!(
            store.find_by_username("Alice").await,
            Err(CredentialError::NotFound)
        ));
        store.save(new_user("Alice")).await?;
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_username_rejected() -> anyhow::Result<()> {
        let store = MemoryCredentialStore::new();
        store.save(new_user("alice")).await?;
        assert!(matches!(
            store.save(new_user("alice")).await,
            Err(CredentialError::DuplicateUsername)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_registrations_have_one_winner() {
        let store = Arc::new(MemoryCredentialStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(
                async move { store.save(new_user("alice")).await },
            ));
        }
        let mut created = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await {
                Ok(Ok(_)) => created += 1,
                Ok(Err(CredentialError::DuplicateUsername)) => duplicates += 1,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(duplicates, 15);
    }

    #[tokio::test]
    async fn refresh_token_yields_its_user_once() -> anyhow::Result<()> {
        let store = MemoryRefreshTokenStore::new(TTL);
        let user_id = Uuid::now_v7();
        let minted = store.create(user_id, NOW).await?;
        assert_eq!(minted.expires_at, NOW + TTL);
        assert_eq!(store.verify_and_consume(&minted.token, NOW).await?, user_id);
        assert!(matches!(
            store.verify_and_consume(&minted.token, NOW).await,
            Err(RefreshError::AlreadyUsed)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_refresh_token_not_found() {
        let store = MemoryRefreshTokenStore::new(TTL);
        assert!(matches!(
            store.verify_and_consume("never-issued", NOW).await,
            Err(RefreshError::NotFound)
        ));
    }

    #[tokio::test]
    async fn refresh_token_expiry_boundary() -> anyhow::Result<()> {
        let store = MemoryRefreshTokenStore::new(TTL);
        let user_id = Uuid::now_v7();
        let late = store.create(user_id, NOW).await?;
        assert!(matches!(
            store.verify_and_consume(&late.token, NOW + TTL + 1).await,
            Err(RefreshError::Expired)
        ));
        let on_time = store.create(user_id, NOW).await?;
        assert_eq!(
            store.verify_and_consume(&on_time.token, NOW + TTL).await?,
            user_id
        );
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_consumers_have_one_winner() -> anyhow::Result<()> {
        let store = Arc::new(MemoryRefreshTokenStore::new(TTL));
        let minted = store.create(Uuid::now_v7(), NOW).await?;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let token = minted.token.clone();
            handles.push(tokio::spawn(async move {
                store.verify_and_consume(&token, NOW).await
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if matches!(handle.await, Ok(Ok(_))) {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        Ok(())
    }

    #[tokio::test]
    async fn revoke_is_idempotent_and_blocks_use() -> anyhow::Result<()> {
        let store = MemoryRefreshTokenStore::new(TTL);
        let minted = store.create(Uuid::now_v7(), NOW).await?;
        assert!(store.revoke(&minted.token, NOW).await?);
        assert!(!store.revoke(&minted.token, NOW).await?);
        assert!(!store.revoke("never-issued", NOW).await?);
        assert!(matches!(
            store.verify_and_consume(&minted.token, NOW).await,
            Err(RefreshError::AlreadyUsed)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn purge_removes_only_expired() -> anyhow::Result<()> {
        let store = MemoryRefreshTokenStore::new(TTL);
        let user_id = Uuid::now_v7();
        store.create(user_id, NOW).await?;
        let fresh = store.create(user_id, NOW + TTL).await?;
        assert_eq!(store.purge_expired(NOW + TTL + 1).await?, 1);
        assert_eq!(store.purge_expired(NOW + TTL + 1).await?, 0);
        assert_eq!(
            store.verify_and_consume(&fresh.token, NOW + TTL + 1).await?,
            user_id
        );
        Ok(())
    }
}
