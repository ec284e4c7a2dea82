//! Small helpers shared by the stores and the session service.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

const REFRESH_TOKEN_BYTES: usize = 32;
pub(crate) const MAX_USERNAME_LEN: usize = 64;

/// Seconds since the Unix epoch.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// Usernames are case-sensitive and non-empty, with no whitespace or control characters.
pub(crate) fn valid_username(username: &str) -> bool {
    Regex::new(&format!(r"^[^\s\p{{Cc}}]{{1,{MAX_USERNAME_LEN}}}$"))
        .is_ok_and(|re| re.is_match(username))
}

/// Create a new refresh token. The raw value goes to the client only.
pub(crate) fn generate_refresh_token() -> Result<String> {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate refresh token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a refresh token so raw values never touch the database.
pub(crate) fn hash_refresh_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
