//! Access token codec: compact `header.claims.signature` tokens signed with HMAC-SHA256.
//!
//! The algorithm is fixed. The header is only checked after the signature has been
//! verified and is never used to pick how a token is verified.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretSlice};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use super::{error::AuthError, role::Role};

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_ALG: &str = "HS256";
pub const TOKEN_TYP: &str = "JWT";
pub const MIN_SECRET_LEN: usize = 32;
pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("unsupported token header")]
    UnsupportedHeader,
    #[error("missing or invalid claims")]
    InvalidClaims,
    #[error("token expired")]
    Expired,
    #[error("signing key must be at least {MIN_SECRET_LEN} bytes")]
    WeakKey,
    #[error("invalid token ttl")]
    InvalidTtl,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Identity proven by a valid access token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub role: Role,
}

impl Principal {
    /// Check that this principal's role satisfies `required`.
    ///
    /// # Errors
    /// Returns `Forbidden` when the role is insufficient.
    pub fn require_role(&self, required: Role) -> Result<(), AuthError> {
        if self.role.grants(required) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

#[derive(Debug)]
pub struct AccessTokenCodec {
    secret: SecretSlice<u8>,
    ttl_seconds: i64,
}

impl AccessTokenCodec {
    /// Build a codec around a server-held secret.
    ///
    /// # Errors
    /// Returns an error if the secret is shorter than [`MIN_SECRET_LEN`] or the ttl is not positive.
    pub fn new(secret: SecretSlice<u8>, ttl_seconds: i64) -> Result<Self, TokenError> {
        if secret.expose_secret().len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakKey);
        }
        if ttl_seconds <= 0 {
            return Err(TokenError::InvalidTtl);
        }
        Ok(Self {
            secret,
            ttl_seconds,
        })
    }

    #[must_use]
    pub const fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Mint a token for `subject` valid from `now` until `now + ttl`.
    ///
    /// # Errors
    /// Returns an error if the expiry overflows or the claims cannot be encoded.
    pub fn issue(&self, subject: &str, role: Role, now: i64) -> Result<String, TokenError> {
        let exp = now
            .checked_add(self.ttl_seconds)
            .ok_or(TokenError::InvalidTtl)?;
        let claims = AccessClaims {
            sub: subject.to_string(),
            role,
            iat: now,
            exp,
        };
        self.sign(&claims)
    }

    /// Verify a token and return the identity it carries.
    ///
    /// # Errors
    /// Returns an error if the token is malformed, its signature does not match, its
    /// claims are incomplete, or `now` is past its expiry.
    pub fn verify(&self, token: &str, now: i64) -> Result<Principal, TokenError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
        let claims_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
        let sig_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
        if parts.next().is_some() {
            return Err(TokenError::TokenFormat);
        }

        let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Base64)?;
        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != TOKEN_ALG || header.typ != TOKEN_TYP {
            return Err(TokenError::UnsupportedHeader);
        }

        let claims: AccessClaims =
            b64d_json(claims_b64).map_err(|_| TokenError::InvalidClaims)?;
        if claims.sub.is_empty() || claims.exp < claims.iat {
            return Err(TokenError::InvalidClaims);
        }
        if now > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(Principal {
            subject: claims.sub,
            role: claims.role,
        })
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        let header = TokenHeader {
            alg: TOKEN_ALG.to_string(),
            typ: TOKEN_TYP.to_string(),
        };
        let signing_input = format!("{}.{}", b64e_json(&header)?, b64e_json(claims)?);

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.secret.expose_secret()).map_err(|_| TokenError::WeakKey)
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: DeserializeOwned>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}
