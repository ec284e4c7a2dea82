use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::auth::{
    password::{DEFAULT_ITERATIONS, DEFAULT_MEMORY_KIB, DEFAULT_PARALLELISM},
    refresh::DEFAULT_REFRESH_TTL_SECONDS,
    token::DEFAULT_ACCESS_TTL_SECONDS,
};

pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_ACCESS_TTL: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_TTL: &str = "refresh-token-ttl-seconds";
pub const ARG_ARGON2_MEMORY: &str = "argon2-memory-kib";
pub const ARG_ARGON2_ITERATIONS: &str = "argon2-iterations";
pub const ARG_ARGON2_PARALLELISM: &str = "argon2-parallelism";
pub const ARG_SWEEP_SECONDS: &str = "refresh-sweep-seconds";

/// Token lifetimes, hashing cost, and the optional inline signing secret.
pub struct Options {
    pub token_secret: Option<SecretString>,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
    pub refresh_sweep_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if a TTL is not positive.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let access_token_ttl_seconds = matches
            .get_one::<i64>(ARG_ACCESS_TTL)
            .copied()
            .unwrap_or(DEFAULT_ACCESS_TTL_SECONDS);
        let refresh_token_ttl_seconds = matches
            .get_one::<i64>(ARG_REFRESH_TTL)
            .copied()
            .unwrap_or(DEFAULT_REFRESH_TTL_SECONDS);

        if access_token_ttl_seconds <= 0 {
            return Err(anyhow!("--{ARG_ACCESS_TTL} must be positive"));
        }
        if refresh_token_ttl_seconds <= 0 {
            return Err(anyhow!("--{ARG_REFRESH_TTL} must be positive"));
        }

        Ok(Self {
            token_secret: matches
                .get_one::<String>(ARG_TOKEN_SECRET)
                .map(|secret| SecretString::from(secret.as_str())),
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
            argon2_memory_kib: matches
                .get_one::<u32>(ARG_ARGON2_MEMORY)
                .copied()
                .unwrap_or(DEFAULT_MEMORY_KIB),
            argon2_iterations: matches
                .get_one::<u32>(ARG_ARGON2_ITERATIONS)
                .copied()
                .unwrap_or(DEFAULT_ITERATIONS),
            argon2_parallelism: matches
                .get_one::<u32>(ARG_ARGON2_PARALLELISM)
                .copied()
                .unwrap_or(DEFAULT_PARALLELISM),
            refresh_sweep_seconds: matches
                .get_one::<u64>(ARG_SWEEP_SECONDS)
                .copied()
                .unwrap_or(3600),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long(ARG_TOKEN_SECRET)
                .help("HMAC secret for access tokens, at least 32 bytes")
                .long_help(
                    "HMAC-SHA256 secret used to sign access tokens. Must be at least 32 bytes. When omitted the secret is read from Vault KV (field token_secret_b64).",
                )
                .env("PAYROLL_AUTH_TOKEN_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TTL)
                .long(ARG_ACCESS_TTL)
                .help("Access token lifetime in seconds")
                .env("PAYROLL_AUTH_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TTL)
                .long(ARG_REFRESH_TTL)
                .help("Refresh token lifetime in seconds")
                .env("PAYROLL_AUTH_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_SWEEP_SECONDS)
                .long(ARG_SWEEP_SECONDS)
                .help("Interval between deletions of expired refresh tokens")
                .env("PAYROLL_AUTH_REFRESH_SWEEP_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        );
    with_argon2_args(command)
}

fn with_argon2_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ARGON2_MEMORY)
                .long(ARG_ARGON2_MEMORY)
                .help("Argon2id memory cost in KiB")
                .env("PAYROLL_AUTH_ARGON2_MEMORY_KIB")
                .default_value("19456")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_ARGON2_ITERATIONS)
                .long(ARG_ARGON2_ITERATIONS)
                .help("Argon2id iteration count")
                .env("PAYROLL_AUTH_ARGON2_ITERATIONS")
                .default_value("2")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_ARGON2_PARALLELISM)
                .long(ARG_ARGON2_PARALLELISM)
                .help("Argon2id lanes")
                .env("PAYROLL_AUTH_ARGON2_PARALLELISM")
                .default_value("1")
                .value_parser(clap::value_parser!(u32)),
        )
}
