//! Access-token provider for the Daraja API.
//!
//! Tokens are obtained from the OAuth endpoint with Base64 client-credential
//! basic auth and cached process-wide. The cache entry lives shorter than the
//! token's real upstream lifetime so a revoked token has a bounded blast
//! radius, and entries are keyed per merchant account so multiple configured
//! accounts in one process never share a token.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::errors::{GatewayError, Result};
use crate::types::GatewayConfig;
use crate::utils::basic_auth_string;

/// How long a cached token is reused before a fresh one is fetched.
///
/// Deliberately shorter than the upstream token lifetime (3600 s) to force
/// periodic refresh.
pub const TOKEN_CACHE_TTL: Duration = Duration::from_secs(450);

const TOKEN_PATH: &str = "oauth/v1/generate?grant_type=client_credentials";

struct CachedToken {
    token: String,
    fetched_at: Instant,
}

fn token_cache() -> &'static RwLock<HashMap<String, CachedToken>> {
    static CACHE: OnceLock<RwLock<HashMap<String, CachedToken>>> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Returns a bearer token for the configured account, fetching one if the
/// cached entry is absent or older than [`TOKEN_CACHE_TTL`].
///
/// Callers must treat an `Err` as fatal for the current operation.
pub async fn access_token(config: &GatewayConfig) -> Result<String> {
    let key = config.connection.cache_key();
    {
        let cache = token_cache().read().await;
        if let Some(entry) = cache.get(&key) {
            if entry.fetched_at.elapsed() < TOKEN_CACHE_TTL {
                return Ok(entry.token.clone());
            }
        }
    }
    refresh_access_token(config).await
}

/// Fetches a fresh token and replaces the cached entry for this account.
///
/// Used directly when the upstream reports the current token as invalid.
pub async fn refresh_access_token(config: &GatewayConfig) -> Result<String> {
    let token = fetch_access_token(config).await?;
    let key = config.connection.cache_key();
    token_cache().write().await.insert(
        key,
        CachedToken {
            token: token.clone(),
            fetched_at: Instant::now(),
        },
    );
    Ok(token)
}

async fn fetch_access_token(config: &GatewayConfig) -> Result<String> {
    let connection = &config.connection;
    let url = connection.endpoint(TOKEN_PATH)?;
    let auth = basic_auth_string(&connection.consumer_key, &connection.consumer_secret);

    let response = config
        .http_client
        .get(url)
        .header("Authorization", format!("Basic {auth}"))
        .header("Content-Type", "application/json")
        .send()
        .await
        .map_err(|err| {
            warn!(error = %err, "error fetching Mpesa auth key");
            GatewayError::Token(err.to_string())
        })?;

    let status = response.status();
    if !status.is_success() {
        warn!(%status, "Mpesa token endpoint returned an error status");
        return Err(GatewayError::Token(format!(
            "token endpoint returned {status}"
        )));
    }

    let body: Value = response.json().await.map_err(|err| {
        warn!(error = %err, "Mpesa token response was not valid JSON");
        GatewayError::Token(err.to_string())
    })?;

    match body.get("access_token").and_then(Value::as_str) {
        Some(token) if !token.is_empty() => {
            debug!("obtained Mpesa access token");
            Ok(token.to_string())
        }
        _ => Err(GatewayError::Token(
            "token response missing access_token".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConnectionParams;

    fn config(consumer_key: &str, base_url: &str) -> GatewayConfig {
        GatewayConfig::new(ConnectionParams {
            consumer_key: consumer_key.to_string(),
            consumer_secret: "secret".to_string(),
            base_url: base_url.to_string(),
            shortcode: "174379".to_string(),
            passkey: "passkey".to_string(),
            callback_url: "https://shop.example.com/callback".to_string(),
            initiator_name: "api_user".to_string(),
            initiator_security_credential: "credential".to_string(),
        })
    }

    #[tokio::test]
    async fn test_access_token_fails_on_unreachable_upstream() {
        // Discard port on localhost; connection is refused immediately.
        let config = config("auth-unreachable", "http://127.0.0.1:9/");
        let result = access_token(&config).await;
        assert!(matches!(result, Err(GatewayError::Token(_))));
    }

    #[tokio::test]
    async fn test_cached_token_served_without_refetch() {
        let config = config("auth-cached", "http://127.0.0.1:9/");
        let key = config.connection.cache_key();
        token_cache().write().await.insert(
            key,
            CachedToken {
                token: "cached-token".to_string(),
                fetched_at: Instant::now(),
            },
        );

        // The upstream is unreachable, so this only succeeds via the cache.
        let token = access_token(&config).await.unwrap();
        assert_eq!(token, "cached-token");
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_refetch() {
        let config = config("auth-expired", "http://127.0.0.1:9/");
        let key = config.connection.cache_key();
        let Some(stale) = Instant::now().checked_sub(TOKEN_CACHE_TTL + Duration::from_secs(1))
        else {
            return;
        };
        token_cache().write().await.insert(
            key,
            CachedToken {
                token: "stale-token".to_string(),
                fetched_at: stale,
            },
        );

        // Stale entry forces a fetch, which fails against the dead upstream.
        let result = access_token(&config).await;
        assert!(result.is_err());
    }
}
