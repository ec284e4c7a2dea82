//! Map validated CLI matches to an [`Action`].

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{token, vault, ARG_DSN, ARG_PORT};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;

    let token_opts = token::Options::parse(matches)?;
    let vault_opts = vault::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        token_secret: token_opts.token_secret,
        access_token_ttl_seconds: token_opts.access_token_ttl_seconds,
        refresh_token_ttl_seconds: token_opts.refresh_token_ttl_seconds,
        argon2_memory_kib: token_opts.argon2_memory_kib,
        argon2_iterations: token_opts.argon2_iterations,
        argon2_parallelism: token_opts.argon2_parallelism,
        refresh_sweep_seconds: token_opts.refresh_sweep_seconds,
        vault: vault_opts,
    }))
}
