use crate::{api::APP_USER_AGENT, auth::token::MIN_SECRET_LEN, cli::globals::GlobalArgs, vault};
use anyhow::{anyhow, Context, Result};
use base64ct::{Base64, Encoding};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretSlice};
use serde_json::Value;
use tracing::{info_span, instrument, Instrument};

const TOKEN_SECRET_FIELD: &str = "token_secret_b64";

/// Read the access-token signing secret from a KV v2 secret.
///
/// # Errors
/// Returns an error if the Vault request fails, the field is missing, or the decoded secret
/// is shorter than the HMAC key minimum.
#[instrument(skip(globals))]
pub async fn read_token_secret(
    globals: &GlobalArgs,
    kv_mount: &str,
    kv_path: &str,
) -> Result<SecretSlice<u8>> {
    let client = Client::builder().user_agent(APP_USER_AGENT).build()?;
    let path = format!("/v1/{kv_mount}/data/{kv_path}");
    let url = vault::endpoint_url(&globals.vault_url, &path)?;

    let span = info_span!(
        "vault.kv.read",
        http.method = "GET",
        url = %url
    );
    let response = client
        .get(&url)
        .header("X-Vault-Token", globals.vault_token.expose_secret())
        .send()
        .instrument(span)
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("vault kv read failed: {status} {body}"));
    }

    let json: Value = response.json().await?;
    decode_token_secret(&json)
}

fn decode_token_secret(json: &Value) -> Result<SecretSlice<u8>> {
    let secret_b64 = json
        .get("data")
        .and_then(|data| data.get("data"))
        .and_then(|data| data.get(TOKEN_SECRET_FIELD))
        .and_then(Value::as_str)
        .context("token secret missing from vault response")?;

    let decoded =
        Base64::decode_vec(secret_b64.trim()).map_err(|_| anyhow!("token secret is not valid base64"))?;
    if decoded.len() < MIN_SECRET_LEN {
        return Err(anyhow!(
            "token secret length is {}, expected at least {}",
            decoded.len(),
            MIN_SECRET_LEN
        ));
    }

    Ok(SecretSlice::from(decoded))
}
