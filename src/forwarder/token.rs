use super::config::{ClientCredentials, ForwarderConfig, POWER_BI_SCOPE};
use crate::error::ForwarderError;
use crate::models::token::TokenCache;
use serde::Deserialize;
use std::sync::Mutex;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Returns a bearer token, reusing the cached one while it is outside the
/// expiry margin. The cache lock is never held across the HTTP exchange, so
/// parallel callers may both fetch.
pub async fn acquire_token(
    client: &reqwest::Client,
    config: &ForwarderConfig,
    cache: &Mutex<TokenCache>,
    now_ms: i64,
) -> Result<String, ForwarderError> {
    {
        let cached = cache
            .lock()
            .map_err(|_| ForwarderError::TokenAcquisition("token cache lock poisoned".to_string()))?;
        if let Some(token) = cached.valid_token(now_ms) {
            return Ok(token.to_string());
        }
    }

    let credentials = config
        .credentials
        .as_ref()
        .ok_or(ForwarderError::ConfigMissing("PBI_TENANT_ID, PBI_CLIENT_ID and PBI_CLIENT_SECRET"))?;

    let fresh = fetch_token(client, config, credentials).await?;
    let exp = now_ms + fresh.expires_in * 1000;
    log::info!("acquired Power BI token valid for {}s", fresh.expires_in);

    let mut cached = cache
        .lock()
        .map_err(|_| ForwarderError::TokenAcquisition("token cache lock poisoned".to_string()))?;
    cached.store(fresh.access_token.clone(), exp);
    Ok(fresh.access_token)
}

async fn fetch_token(
    client: &reqwest::Client,
    config: &ForwarderConfig,
    credentials: &ClientCredentials,
) -> Result<TokenResponse, ForwarderError> {
    let params = [
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
        ("scope", POWER_BI_SCOPE),
        ("grant_type", "client_credentials"),
    ];

    let resp = client
        .post(config.token_url(&credentials.tenant_id))
        .form(&params)
        .send()
        .await
        .map_err(|e| ForwarderError::TokenAcquisition(format!("token request failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(ForwarderError::TokenAcquisition(format!(
            "token endpoint returned HTTP {status}: {body}"
        )));
    }

    resp.json::<TokenResponse>()
        .await
        .map_err(|e| ForwarderError::TokenAcquisition(format!("invalid token response: {e}")))
}
