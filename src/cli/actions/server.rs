use crate::{
    api,
    auth::{
        AccessTokenCodec, Argon2Hasher, PgCredentialStore, PgRefreshTokenStore, RefreshTokenStore,
        SessionService,
    },
    cli::{commands::vault::Options as VaultOptions, globals::GlobalArgs},
    vault,
};
use anyhow::{anyhow, Context, Result};
use secrecy::{ExposeSecret, SecretSlice, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub token_secret: Option<SecretString>,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
    pub refresh_sweep_seconds: u64,
    pub vault: Option<VaultOptions>,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("token_secret", &self.token_secret.as_ref().map(|_| "***"))
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("refresh_token_ttl_seconds", &self.refresh_token_ttl_seconds)
            .field("argon2_memory_kib", &self.argon2_memory_kib)
            .field("argon2_iterations", &self.argon2_iterations)
            .field("argon2_parallelism", &self.argon2_parallelism)
            .field("refresh_sweep_seconds", &self.refresh_sweep_seconds)
            .field("vault_url", &self.vault.as_ref().map(|v| v.url.as_str()))
            .finish_non_exhaustive()
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the signing secret cannot be loaded, the database is unreachable, or
/// the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let secret = signing_secret(args.token_secret, args.vault.as_ref()).await?;
    let codec = AccessTokenCodec::new(secret, args.access_token_ttl_seconds)
        .context("Invalid access token configuration")?;
    let hasher = Argon2Hasher::new(
        args.argon2_memory_kib,
        args.argon2_iterations,
        args.argon2_parallelism,
    )
    .context("Invalid Argon2 parameters")?;

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;

    let refresh_tokens: Arc<dyn RefreshTokenStore> = Arc::new(PgRefreshTokenStore::new(
        pool.clone(),
        args.refresh_token_ttl_seconds,
    ));
    let session = Arc::new(SessionService::new(
        Arc::new(PgCredentialStore::new(pool.clone())),
        refresh_tokens.clone(),
        Arc::new(hasher),
        codec,
    )?);

    api::new(
        args.port,
        pool,
        session,
        refresh_tokens,
        Duration::from_secs(args.refresh_sweep_seconds),
    )
    .await
}

/// Inline secret wins; otherwise log in to Vault and read it from KV.
async fn signing_secret(
    inline: Option<SecretString>,
    vault_opts: Option<&VaultOptions>,
) -> Result<SecretSlice<u8>> {
    if let Some(secret) = inline {
        return Ok(SecretSlice::from(secret.expose_secret().as_bytes().to_vec()));
    }

    let opts = vault_opts.ok_or_else(|| anyhow!("either --token-secret or --vault-url is required"))?;

    let mut globals = GlobalArgs::new(opts.url.clone());
    let (token, lease_duration) =
        vault::approle_login(&globals, &opts.secret_id, &opts.role_id).await?;
    globals.set_token(SecretString::from(token));
    info!("Logged in to Vault, lease {lease_duration}s");

    vault::kv::read_token_secret(&globals, &opts.kv_mount, &opts.kv_path)
        .await
        .context("Failed to load token secret from Vault")
}
