use anyhow::Result;
use clap::{Arg, ArgMatches, Command};

pub const ARG_VAULT_URL: &str = "vault-url";
pub const ARG_VAULT_ROLE_ID: &str = "vault-role-id";
pub const ARG_VAULT_SECRET_ID: &str = "vault-secret-id";
pub const ARG_VAULT_KV_MOUNT: &str = "vault-kv-mount";
pub const ARG_VAULT_KV_PATH: &str = "vault-kv-path";

/// Vault AppRole credentials and the KV location of the token secret.
pub struct Options {
    pub url: String,
    pub role_id: String,
    pub secret_id: String,
    pub kv_mount: String,
    pub kv_path: String,
}

impl Options {
    /// `None` when no `--vault-url` was given.
    ///
    /// # Errors
    /// Returns an error if `--vault-url` is set without AppRole credentials.
    pub fn parse(matches: &ArgMatches) -> Result<Option<Self>> {
        let Some(url) = matches.get_one::<String>(ARG_VAULT_URL).cloned() else {
            return Ok(None);
        };

        let role_id = matches
            .get_one::<String>(ARG_VAULT_ROLE_ID)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_VAULT_ROLE_ID}"))?;
        let secret_id = matches
            .get_one::<String>(ARG_VAULT_SECRET_ID)
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!("missing required argument: --{ARG_VAULT_SECRET_ID}")
            })?;

        Ok(Some(Self {
            url,
            role_id,
            secret_id,
            kv_mount: matches
                .get_one::<String>(ARG_VAULT_KV_MOUNT)
                .cloned()
                .unwrap_or_else(|| "secret".to_string()),
            kv_path: matches
                .get_one::<String>(ARG_VAULT_KV_PATH)
                .cloned()
                .unwrap_or_else(|| "payroll-auth".to_string()),
        }))
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VAULT_URL)
                .long(ARG_VAULT_URL)
                .help("Vault AppRole login URL, e.g. https://vault:8200/v1/auth/approle/login")
                .env("PAYROLL_AUTH_VAULT_URL"),
        )
        .arg(
            Arg::new(ARG_VAULT_ROLE_ID)
                .long(ARG_VAULT_ROLE_ID)
                .help("Vault role id")
                .env("PAYROLL_AUTH_VAULT_ROLE_ID")
                .requires(ARG_VAULT_URL),
        )
        .arg(
            Arg::new(ARG_VAULT_SECRET_ID)
                .long(ARG_VAULT_SECRET_ID)
                .help("Vault secret id")
                .env("PAYROLL_AUTH_VAULT_SECRET_ID")
                .hide_env_values(true)
                .requires(ARG_VAULT_URL),
        )
        .arg(
            Arg::new(ARG_VAULT_KV_MOUNT)
                .long(ARG_VAULT_KV_MOUNT)
                .help("Vault KV-v2 mount holding the token secret")
                .env("PAYROLL_AUTH_VAULT_KV_MOUNT")
                .default_value("secret"),
        )
        .arg(
            Arg::new(ARG_VAULT_KV_PATH)
                .long(ARG_VAULT_KV_PATH)
                .help("Vault KV-v2 path holding the token secret")
                .env("PAYROLL_AUTH_VAULT_KV_PATH")
                .default_value("payroll-auth"),
        )
}
