//! Session orchestration: register, login, refresh, logout, and access token checks.
//!
//! Flow overview:
//! - login: `Anonymous -> Authenticating -> Authenticated | Rejected`
//! - refresh: `Anonymous -> RefreshPending -> Authenticated | Rejected`
//!
//! Reasons for a rejection are logged at debug level and collapsed before they reach the
//! caller, so clients cannot tell an unknown user from a wrong password, or a forged
//! refresh token from an expired one.

use anyhow::{anyhow, Context};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use super::{
    credentials::{CredentialStore, NewUser, User},
    error::{AuthError, CredentialError},
    password::PasswordHasher,
    refresh::RefreshTokenStore,
    role::Role,
    token::{AccessTokenCodec, Principal},
    utils::valid_username,
};

/// Tokens returned by a successful login or refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .finish()
    }
}

pub struct SessionService {
    credentials: Arc<dyn CredentialStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    hasher: Arc<dyn PasswordHasher>,
    codec: AccessTokenCodec,
    // Verified against when the username is unknown so both paths cost one hash.
    dummy_hash: String,
}

impl SessionService {
    /// # Errors
    /// Returns an error if the dummy digest used for timing equalization cannot be computed.
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        hasher: Arc<dyn PasswordHasher>,
        codec: AccessTokenCodec,
    ) -> anyhow::Result<Self> {
        let dummy_hash = hasher
            .hash("payroll-auth-dummy-password")
            .context("failed to prepare dummy password hash")?;
        Ok(Self {
            credentials,
            refresh_tokens,
            hasher,
            codec,
            dummy_hash,
        })
    }

    #[must_use]
    pub const fn codec(&self) -> &AccessTokenCodec {
        &self.codec
    }

    /// Create a `ROLE_USER` account. No tokens are issued.
    ///
    /// # Errors
    /// `InvalidInput` for a malformed username or empty password, `DuplicateUsername` if
    /// the name is taken.
    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<User, AuthError> {
        if !valid_username(username) {
            return Err(AuthError::InvalidInput("invalid username"));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password must not be empty"));
        }

        let password_hash = self.hash_password(password).await?;
        let user = self
            .credentials
            .save(NewUser {
                username: username.to_string(),
                password_hash,
                role: Role::DEFAULT,
            })
            .await
            .map_err(|err| {
                if !matches!(err, CredentialError::DuplicateUsername) {
                    error!("Failed to save user: {err:#}");
                }
                AuthError::from(err)
            })?;

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Check a username and password and mint an access + refresh token pair.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown user or a wrong password.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        now: i64,
    ) -> Result<TokenPair, AuthError> {
        // A name that could never have been registered is treated as unknown.
        let user = if valid_username(username) {
            match self.credentials.find_by_username(username).await {
                Ok(user) => Some(user),
                Err(CredentialError::NotFound) => None,
                Err(err) => {
                    error!("Failed to lookup user: {err:#}");
                    return Err(err.into());
                }
            }
        } else {
            None
        };

        let digest = user
            .as_ref()
            .map_or_else(|| self.dummy_hash.clone(), |user| user.password_hash.clone());
        let matches = self.verify_password(password, digest).await?;

        let Some(user) = user.filter(|_| matches) else {
            debug!("login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        let pair = self.mint(&user, now).await?;
        info!(user_id = %user.id, "login succeeded");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair. The presented token is consumed.
    ///
    /// # Errors
    /// `InvalidRefreshToken` if the token is unknown, expired, or already used.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str, now: i64) -> Result<TokenPair, AuthError> {
        let user_id = self
            .refresh_tokens
            .verify_and_consume(refresh_token, now)
            .await
            .map_err(|err| {
                debug!("refresh rejected: {err}");
                AuthError::from(err)
            })?;

        // The token is spent from here on; any failure below means a fresh login.
        // Re-read the user so the new access token carries the current role.
        let user = match self.credentials.find_by_id(user_id).await {
            Ok(user) => user,
            Err(CredentialError::NotFound) => {
                error!(%user_id, "refresh token owner no longer exists");
                return Err(AuthError::InvalidRefreshToken);
            }
            Err(err) => {
                error!("Failed to lookup user: {err:#}");
                return Err(err.into());
            }
        };

        let pair = self.mint(&user, now).await?;
        info!(user_id = %user.id, "refresh succeeded");
        Ok(pair)
    }

    /// Revoke a single refresh token. Unknown or already used tokens are ignored.
    ///
    /// # Errors
    /// `Internal` if the store is unavailable.
    #[instrument(skip_all)]
    pub async fn logout(&self, refresh_token: &str, now: i64) -> Result<(), AuthError> {
        let revoked = self
            .refresh_tokens
            .revoke(refresh_token, now)
            .await
            .map_err(|err| {
                error!("Failed to revoke refresh token: {err:#}");
                AuthError::from(err)
            })?;
        debug!(revoked, "logout");
        Ok(())
    }

    /// Verify a bearer access token for downstream request handling.
    ///
    /// # Errors
    /// `InvalidAccessToken` if the signature, claims, or expiry check fails.
    pub fn verify(&self, access_token: &str, now: i64) -> Result<Principal, AuthError> {
        self.codec.verify(access_token, now).map_err(|err| {
            debug!("access token rejected: {err}");
            AuthError::InvalidAccessToken
        })
    }

    async fn mint(&self, user: &User, now: i64) -> Result<TokenPair, AuthError> {
        let access_token = self
            .codec
            .issue(&user.username, user.role, now)
            .map_err(|err| AuthError::Internal(anyhow!("failed to sign access token: {err}")))?;
        let refresh = self
            .refresh_tokens
            .create(user.id, now)
            .await
            .map_err(|err| {
                error!("Failed to create refresh token: {err:#}");
                AuthError::from(err)
            })?;
        Ok(TokenPair {
            access_token,
            refresh_token: refresh.token,
        })
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|err| AuthError::Internal(anyhow!("password hashing task failed: {err}")))?
            .map_err(AuthError::Internal)
    }

    async fn verify_password(&self, password: &str, digest: String) -> Result<bool, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|err| AuthError::Internal(anyhow!("password verification task failed: {err}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::auth::{
        memory::{MemoryCredentialStore, MemoryRefreshTokenStore},
        password::Argon2Hasher,
    };
    use secrecy::SecretSlice;

    const NOW: i64 = 1_700_000_000;
    const ACCESS_TTL: i64 = 900;
    const REFRESH_TTL: i64 = 86_400;

    struct Harness {
        service: SessionService,
        credentials: Arc<MemoryCredentialStore>,
    }

    fn harness() -> Harness {
        let credentials = Arc::new(MemoryCredentialStore::new());
        let codec = AccessTokenCodec::new(
            SecretSlice::from(b"0123456789abcdef0123456789abcdef".to_vec()),
            ACCESS_TTL,
        )
        .unwrap();
        let service = SessionService::new(
            credentials.clone(),
            Arc::new(MemoryRefreshTokenStore::new(REFRESH_TTL)),
            Arc::new(Argon2Hasher::new(8, 1, 1).unwrap()),
            codec,
        )
        .unwrap();
        Harness {
            service,
            credentials,
        }
    }

    #[tokio::test]
    async fn register_assigns_default_role_and_hashes_password() {
        let h = harness();
        let user = h.service.register("alice", "pw123").await.unwrap();
        assert_eq!(user.role, Role::User);
        assert_ne!(user.password_hash, "pw123");
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_bad_input() {
        let h = harness();
        h.service.register("alice", "pw123").await.unwrap();
        assert!(matches!(
            h.service.register("alice", "other").await,
            Err(AuthError::DuplicateUsername)
        ));
        assert!(matches!(
            h.service.register("", "pw").await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            h.service.register("bob", "").await,
            Err(AuthError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn login_accepts_only_the_registered_password() {
        let h = harness();
        h.service.register("alice", "pw123").await.unwrap();
        assert!(h.service.login("alice", "pw123", NOW).await.is_ok());
        assert!(matches!(
            h.service.login("alice", "pw1234", NOW).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            h.service.login("alice", "", NOW).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn login_unknown_user_is_generic_failure() {
        let h = harness();
        assert!(matches!(
            h.service.login("mallory", "pw123", NOW).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    /// Fails every lookup the way a database rejecting the bound value would.
    struct UnreachableCredentialStore;

    #[async_trait::async_trait]
    impl CredentialStore for UnreachableCredentialStore {
        async fn find_by_username(&self, _: &str) -> Result<User, CredentialError> {
            Err(CredentialError::Backend(anyhow!("invalid byte sequence")))
        }

        async fn find_by_id(&self, _: uuid::Uuid) -> Result<User, CredentialError> {
            Err(CredentialError::Backend(anyhow!("invalid byte sequence")))
        }

        async fn save(&self, _: NewUser) -> Result<User, CredentialError> {
            Err(CredentialError::Backend(anyhow!("invalid byte sequence")))
        }
    }

    #[tokio::test]
    async fn control_characters_in_username_never_reach_the_store() {
        let service = SessionService::new(
            Arc::new(UnreachableCredentialStore),
            Arc::new(MemoryRefreshTokenStore::new(REFRESH_TTL)),
            Arc::new(Argon2Hasher::new(8, 1, 1).unwrap()),
            AccessTokenCodec::new(
                SecretSlice::from(b"0123456789abcdef0123456789abcdef".to_vec()),
                ACCESS_TTL,
            )
            .unwrap(),
        )
        .unwrap();

        assert!(matches!(
            service.login("ali\u{0}ce", "pw123", NOW).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            service.register("ali\u{0}ce", "pw123").await,
            Err(AuthError::InvalidInput(_))
        ));
        // A well-formed name does hit the store.
        assert!(matches!(
            service.login("alice", "pw123", NOW).await,
            Err(AuthError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn full_session_lifecycle() {
        let h = harness();
        h.service.register("alice", "pw123").await.unwrap();
        let pair = h.service.login("alice", "pw123", NOW).await.unwrap();

        let principal = h.service.verify(&pair.access_token, NOW).unwrap();
        assert_eq!(principal.subject, "alice");
        assert_eq!(principal.role, Role::User);

        let later = NOW + ACCESS_TTL + 1;
        assert!(matches!(
            h.service.verify(&pair.access_token, later),
            Err(AuthError::InvalidAccessToken)
        ));

        let refreshed = h.service.refresh(&pair.refresh_token, later).await.unwrap();
        assert_ne!(refreshed.refresh_token, pair.refresh_token);
        let principal = h.service.verify(&refreshed.access_token, later).unwrap();
        assert_eq!(principal.subject, "alice");
    }

    #[tokio::test]
    async fn refresh_tokens_are_single_use() {
        let h = harness();
        h.service.register("alice", "pw123").await.unwrap();
        let pair = h.service.login("alice", "pw123", NOW).await.unwrap();
        let rotated = h.service.refresh(&pair.refresh_token, NOW).await.unwrap();
        assert!(matches!(
            h.service.refresh(&pair.refresh_token, NOW).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(h.service.refresh(&rotated.refresh_token, NOW).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_rejects_tampered_and_expired_tokens() {
        let h = harness();
        h.service.register("alice", "pw123").await.unwrap();
        let pair = h.service.login("alice", "pw123", NOW).await.unwrap();

        let mut tampered = pair.refresh_token.clone().into_bytes();
        tampered[0] = if tampered[0] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();
        assert!(matches!(
            h.service.refresh(&tampered, NOW).await,
            Err(AuthError::InvalidRefreshToken)
        ));

        assert!(matches!(
            h.service
                .refresh(&pair.refresh_token, NOW + REFRESH_TTL + 1)
                .await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn refresh_picks_up_role_changes() {
        let h = harness();
        h.service.register("alice", "pw123").await.unwrap();
        let pair = h.service.login("alice", "pw123", NOW).await.unwrap();
        h.credentials.set_role("alice", Role::Admin).await.unwrap();

        // The old token keeps its stale role until it expires.
        let stale = h.service.verify(&pair.access_token, NOW).unwrap();
        assert_eq!(stale.role, Role::User);

        let refreshed = h.service.refresh(&pair.refresh_token, NOW).await.unwrap();
        let fresh = h.service.verify(&refreshed.access_token, NOW).unwrap();
        assert_eq!(fresh.role, Role::Admin);
    }

    #[tokio::test]
    async fn logout_revokes_refresh_token() {
        let h = harness();
        h.service.register("alice", "pw123").await.unwrap();
        let pair = h.service.login("alice", "pw123", NOW).await.unwrap();
        h.service.logout(&pair.refresh_token, NOW).await.unwrap();
        h.service.logout(&pair.refresh_token, NOW).await.unwrap();
        h.service.logout("never-issued", NOW).await.unwrap();
        assert!(matches!(
            h.service.refresh(&pair.refresh_token, NOW).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn each_login_gets_an_independent_refresh_token() {
        let h = harness();
        h.service.register("alice", "pw123").await.unwrap();
        let first = h.service.login("alice", "pw123", NOW).await.unwrap();
        let second = h.service.login("alice", "pw123", NOW).await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
        assert!(h.service.refresh(&first.refresh_token, NOW).await.is_ok());
        assert!(h.service.refresh(&second.refresh_token, NOW).await.is_ok());
    }
}
