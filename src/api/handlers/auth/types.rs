//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::auth::{Principal, Role, TokenPair};

#[derive(ToSchema, Serialize, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for CredentialsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsRequest")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(ToSchema, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

impl fmt::Debug for RefreshTokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTokenRequest")
            .field("refresh_token", &"***")
            .finish()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MeResponse {
    pub subject: String,
    pub role: Role,
}

impl From<Principal> for MeResponse {
    fn from(principal: Principal) -> Self {
        Self {
            subject: principal.subject,
            role: principal.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn token_response_uses_camel_case() -> Result<()> {
        let response = TokenResponse {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(
            value.get("accessToken").and_then(serde_json::Value::as_str),
            Some("a")
        );
        assert_eq!(
            value.get("refreshToken").and_then(serde_json::Value::as_str),
            Some("r")
        );
        Ok(())
    }

    #[test]
    fn refresh_request_reads_camel_case() -> Result<()> {
        let request: RefreshTokenRequest =
            serde_json::from_str(r#"{"refreshToken":"opaque"}"#).context("decode")?;
        assert_eq!(request.refresh_token, "opaque");
        assert!(!format!("{request:?}").contains("opaque"));
        Ok(())
    }

    #[test]
    fn credentials_debug_hides_password() -> Result<()> {
        let request: CredentialsRequest =
            serde_json::from_str(r#"{"username":"alice","password":"pw123"}"#)?;
        let rendered = format!("{request:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("pw123"));
        Ok(())
    }
}
