//! Credential store: user identity records keyed by username.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::fmt;
use tracing::Instrument;
use uuid::Uuid;

use super::{error::CredentialError, role::Role, utils::is_unique_violation};

#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"***")
            .field("role", &self.role)
            .finish()
    }
}

/// A user that has not been persisted yet.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<User, CredentialError>;

    async fn find_by_id(&self, id: Uuid) -> Result<User, CredentialError>;

    /// Persist a new user. The uniqueness check and the insert are one atomic step.
    async fn save(&self, user: NewUser) -> Result<User, CredentialError>;
}

#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(
        &self,
        query: &'static str,
        bind: UserKey<'_>,
    ) -> Result<User, CredentialError> {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let statement = sqlx::query(query);
        let statement = match bind {
            UserKey::Username(username) => statement.bind(username),
            UserKey::Id(id) => statement.bind(id),
        };
        let row = statement
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user")
            .map_err(CredentialError::Backend)?;

        row.as_ref()
            .map(user_from_row)
            .transpose()?
            .ok_or(CredentialError::NotFound)
    }
}

enum UserKey<'a> {
    Username(&'a str),
    Id(Uuid),
}

fn user_from_row(row: &PgRow) -> Result<User, CredentialError> {
    let decode = |err: sqlx::Error| CredentialError::Backend(anyhow!("failed to decode user: {err}"));
    let role: String = row.try_get("role").map_err(decode)?;
    Ok(User {
        id: row.try_get("id").map_err(decode)?,
        username: row.try_get("username").map_err(decode)?,
        password_hash: row.try_get("password_hash").map_err(decode)?,
        role: role
            .parse()
            .map_err(|err| CredentialError::Backend(anyhow!("{err}")))?,
    })
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<User, CredentialError> {
        self.find_one(
            "SELECT id, username, password_hash, role FROM users WHERE username = $1",
            UserKey::Username(username),
        )
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User, CredentialError> {
        self.find_one(
            "SELECT id, username, password_hash, role FROM users WHERE id = $1",
            UserKey::Id(id),
        )
        .await
    }

    async fn save(&self, user: NewUser) -> Result<User, CredentialError> {
        // The unique index on username turns a concurrent duplicate into a 23505.
        let query = r"
            INSERT INTO users (id, username, password_hash, role)
            VALUES ($1, $2, $3, $4)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let id = Uuid::now_v7();
        let result = sqlx::query(query)
            .bind(id)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(User {
                id,
                username: user.username,
                password_hash: user.password_hash,
                role: user.role,
            }),
            Err(err) if is_unique_violation(&err) => Err(CredentialError::DuplicateUsername),
            Err(err) => Err(CredentialError::Backend(
                anyhow::Error::new(err).context("failed to insert user"),
            )),
        }
    }
}
