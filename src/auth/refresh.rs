//! Refresh token store.
//!
//! Tokens are 256-bit random strings handed to the client once; only their SHA-256 hash
//! is stored. Every token is single use: a successful `verify_and_consume` marks it
//! consumed in the same atomic step that checks it, so two concurrent refreshes with one
//! token cannot both succeed.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::{fmt, sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

use super::{
    error::RefreshError,
    utils::{generate_refresh_token, hash_refresh_token, is_unique_violation, unix_now},
};

pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub(crate) const CREATE_ATTEMPTS: usize = 3;

/// A freshly minted refresh token, including the raw value.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: i64,
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshToken")
            .field("token", &"***")
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Mint and persist a token for `user_id` expiring at `now + ttl`.
    async fn create(&self, user_id: Uuid, now: i64) -> Result<RefreshToken, RefreshError>;

    /// Check a presented token and mark it consumed, returning its owner.
    async fn verify_and_consume(&self, token: &str, now: i64) -> Result<Uuid, RefreshError>;

    /// Invalidate a single token. Returns whether an active token was revoked.
    async fn revoke(&self, token: &str, now: i64) -> Result<bool, RefreshError>;

    /// Delete tokens whose expiry is before `now`.
    async fn purge_expired(&self, now: i64) -> Result<u64, RefreshError>;
}

#[derive(Clone, Debug)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
    ttl_seconds: i64,
}

impl PgRefreshTokenStore {
    #[must_use]
    pub const fn new(pool: PgPool, ttl_seconds: i64) -> Self {
        Self { pool, ttl_seconds }
    }

    /// Explain why a token could not be consumed.
    async fn classify_rejection(&self, token_hash: &[u8]) -> Result<RefreshError, RefreshError> {
        let query = r"
            SELECT consumed_at IS NOT NULL AS consumed
            FROM refresh_tokens
            WHERE token_hash = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup refresh token")
            .map_err(RefreshError::Backend)?;

        let Some(row) = row else {
            return Ok(RefreshError::NotFound);
        };
        let consumed: bool = row
            .try_get("consumed")
            .map_err(|err| RefreshError::Backend(anyhow!("failed to decode refresh token: {err}")))?;
        Ok(if consumed {
            RefreshError::AlreadyUsed
        } else {
            RefreshError::Expired
        })
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn create(&self, user_id: Uuid, now: i64) -> Result<RefreshToken, RefreshError> {
        let expires_at = now
            .checked_add(self.ttl_seconds)
            .ok_or_else(|| RefreshError::Backend(anyhow!("refresh token expiry overflow")))?;
        let query = r"
            INSERT INTO refresh_tokens (id, token_hash, user_id, expires_at)
            VALUES ($1, $2, $3, to_timestamp($4::float8))
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );

        for _ in 0..CREATE_ATTEMPTS {
            let token = generate_refresh_token().map_err(RefreshError::Backend)?;
            let result = sqlx::query(query)
                .bind(Uuid::now_v7())
                .bind(hash_refresh_token(&token))
                .bind(user_id)
                .bind(expires_at)
                .execute(&self.pool)
                .instrument(span.clone())
                .await;

            match result {
                Ok(_) => {
                    return Ok(RefreshToken {
                        token,
                        user_id,
                        expires_at,
                    })
                }
                Err(err) if is_unique_violation(&err) => {
                    debug!("refresh token collision, regenerating");
                }
                Err(err) => {
                    return Err(RefreshError::Backend(
                        anyhow::Error::new(err).context("failed to insert refresh token"),
                    ))
                }
            }
        }

        Err(RefreshError::Backend(anyhow!(
            "failed to generate a unique refresh token"
        )))
    }

    async fn verify_and_consume(&self, token: &str, now: i64) -> Result<Uuid, RefreshError> {
        let token_hash = hash_refresh_token(token);
        // Check and consume in one statement; a concurrent caller sees consumed_at set.
        let query = r"
            UPDATE refresh_tokens
            SET consumed_at = to_timestamp($2::float8)
            WHERE token_hash = $1
              AND consumed_at IS NULL
              AND expires_at >= to_timestamp($2::float8)
            RETURNING user_id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&token_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to consume refresh token")
            .map_err(RefreshError::Backend)?;

        match row {
            Some(row) => row.try_get("user_id").map_err(|err| {
                RefreshError::Backend(anyhow!("failed to decode refresh token: {err}"))
            }),
            None => Err(self.classify_rejection(&token_hash).await?),
        }
    }

    async fn revoke(&self, token: &str, now: i64) -> Result<bool, RefreshError> {
        let query = r"
            UPDATE refresh_tokens
            SET consumed_at = to_timestamp($2::float8)
            WHERE token_hash = $1 AND consumed_at IS NULL
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(hash_refresh_token(token))
            .bind(now)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to revoke refresh token")
            .map_err(RefreshError::Backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self, now: i64) -> Result<u64, RefreshError> {
        let query = "DELETE FROM refresh_tokens WHERE expires_at < to_timestamp($1::float8)";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(now)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to purge refresh tokens")
            .map_err(RefreshError::Backend)?;

        Ok(result.rows_affected())
    }
}

/// Periodically delete expired refresh tokens.
pub fn spawn_refresh_token_sweeper(
    store: Arc<dyn RefreshTokenStore>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;

            match store.purge_expired(unix_now()).await {
                Ok(0) => {}
                Ok(purged) => info!("purged {purged} expired refresh tokens"),
                Err(err) => error!("refresh token sweep failed: {err:#}"),
            }
        }
    })
}
