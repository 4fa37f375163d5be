//! Client-credentials token management.
//!
//! Obtains a bearer token from the Arduino Cloud identity endpoint and keeps
//! it until it is within the safety margin of its server-reported expiry.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CloudConfig;
use crate::error::{CloudError, Result};

/// Response from the identity endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
}

/// A bearer token and the instant after which it must not be used.
#[derive(Clone)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Caches one credential and refreshes it on demand.
///
/// The lock is held across the exchange, so concurrent callers share a single
/// refresh instead of racing each other.
pub struct TokenManager {
    token_url: Url,
    client_id: String,
    client_secret: String,
    audience: String,
    margin: Duration,
    current: Mutex<Option<Credential>>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .field("audience", &self.audience)
            .field("margin", &self.margin)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    pub fn new(config: &CloudConfig) -> Self {
        Self {
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            audience: config.audience.clone(),
            margin: config.token_margin,
            current: Mutex::new(None),
        }
    }

    /// Return a usable bearer token, exchanging credentials only when needed.
    pub async fn acquire_token(&self, http: &Client) -> Result<String> {
        let mut current = self.current.lock().await;
        if let Some(credential) = current.as_ref() {
            if credential.is_fresh(Utc::now()) {
                return Ok(credential.token.clone());
            }
            debug!(expires_at = %credential.expires_at, "access token within refresh margin");
        }

        let response = self.exchange(http).await?;
        let margin_secs = i64::try_from(self.margin.as_secs()).unwrap_or(i64::MAX);
        if response.expires_in <= margin_secs {
            warn!(
                expires_in = response.expires_in,
                margin_secs, "access token lifetime is within the refresh margin"
            );
        }
        let credential = Credential {
            expires_at: expiry_from(Utc::now(), response.expires_in, self.margin),
            token: response.access_token,
        };
        info!(expires_at = %credential.expires_at, "obtained Arduino Cloud access token");
        let token = credential.token.clone();
        *current = Some(credential);
        Ok(token)
    }

    /// Expiry of the cached credential, if any.
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.current.lock().await.as_ref().map(|c| c.expires_at)
    }

    /// Drop the cached credential so the next call re-authenticates.
    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
    }

    async fn exchange(&self, http: &Client) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("audience", self.audience.as_str()),
        ];

        let resp = http
            .post(self.token_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| CloudError::Auth(format!("token request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CloudError::Auth(format!("token endpoint HTTP {status}: {body}")));
        }

        let token = resp
            .json::<TokenResponse>()
            .await
            .map_err(|e| CloudError::Auth(format!("token response parse error: {e}")))?;

        if token.access_token.is_empty() {
            return Err(CloudError::Auth("token endpoint returned an empty access token".into()));
        }
        Ok(token)
    }
}

/// `now + (expires_in - margin)`, clamped to `now` for short-lived tokens and
/// saturated for lifetimes beyond the representable range.
fn expiry_from(now: DateTime<Utc>, expires_in: i64, margin: Duration) -> DateTime<Utc> {
    let zero = chrono::Duration::zero();
    let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::MAX);
    let lifetime = chrono::Duration::try_seconds(expires_in).unwrap_or(if expires_in > 0 {
        chrono::Duration::MAX
    } else {
        zero
    });
    let remaining = lifetime.checked_sub(&margin).unwrap_or(zero).max(zero);
    now.checked_add_signed(remaining).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, TokenManager) {
        let server = MockServer::start().await;
        let config = CloudConfig::new("my-client", "my-secret")
            .unwrap()
            .with_base_url(&server.uri())
            .unwrap();
        (server, TokenManager::new(&config))
    }

    fn token_body(token: &str, expires_in: i64) -> serde_json::Value {
        json!({"access_token": token, "expires_in": expires_in, "token_type": "bearer"})
    }

    #[test]
    fn expiry_subtracts_margin() {
        let now = Utc::now();
        let expiry = expiry_from(now, 3600, Duration::from_secs(300));
        assert_eq!(expiry, now + chrono::Duration::seconds(3300));
    }

    #[test]
    fn lifetime_within_margin_expires_now() {
        let now = Utc::now();
        assert_eq!(expiry_from(now, 10, Duration::from_secs(300)), now);
        assert_eq!(expiry_from(now, -5, Duration::from_secs(300)), now);
    }

    #[test]
    fn huge_lifetime_saturates_instead_of_expiring() {
        let now = Utc::now();
        let expiry = expiry_from(now, i64::MAX, Duration::from_secs(300));
        assert!(expiry > now + chrono::Duration::days(365 * 100), "expiry {expiry}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_exchange() {
        let (server, tokens) = setup().await;
        Mock::given(method("POST"))
            .and(path("/v1/clients/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("shared", 3600))
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let http = Client::new();
        let (a, b, c, d) = tokio::join!(
            tokens.acquire_token(&http),
            tokens.acquire_token(&http),
            tokens.acquire_token(&http),
            tokens.acquire_token(&http),
        );
        for token in [a, b, c, d] {
            assert_eq!(token.unwrap(), "shared");
        }
    }

    #[tokio::test]
    async fn token_reused_within_lifetime() {
        let (server, tokens) = setup().await;
        Mock::given(method("POST"))
            .and(path("/v1/clients/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("abc", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let http = Client::new();
        assert_eq!(tokens.acquire_token(&http).await.unwrap(), "abc");
        assert_eq!(tokens.acquire_token(&http).await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn exchange_posts_client_credentials_form() {
        let (server, tokens) = setup().await;
        Mock::given(method("POST"))
            .and(path("/v1/clients/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=my-client"))
            .and(body_string_contains("client_secret=my-secret"))
            .and(body_string_contains("audience=https%3A%2F%2Fapi2.arduino.cc%2Fiot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("abc", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        tokens.acquire_token(&Client::new()).await.unwrap();
    }

    #[tokio::test]
    async fn token_refreshed_after_expiry() {
        let (server, tokens) = setup().await;
        // A lifetime equal to the margin expires immediately.
        Mock::given(method("POST"))
            .and(path("/v1/clients/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("short", 300)))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/clients/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("long", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let http = Client::new();
        assert_eq!(tokens.acquire_token(&http).await.unwrap(), "short");

        let before = Utc::now();
        assert_eq!(tokens.acquire_token(&http).await.unwrap(), "long");
        let after = Utc::now();

        let expiry = tokens.expires_at().await.expect("credential cached");
        let lifetime = chrono::Duration::seconds(3600 - 300);
        assert!(expiry >= before + lifetime, "expiry {expiry} too early");
        assert!(expiry <= after + lifetime, "expiry {expiry} too late");

        // Still fresh: no third exchange.
        assert_eq!(tokens.acquire_token(&http).await.unwrap(), "long");
    }

    #[tokio::test]
    async fn failed_exchange_is_auth_error_and_not_cached() {
        let (server, tokens) = setup().await;
        Mock::given(method("POST"))
            .and(path("/v1/clients/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let err = tokens.acquire_token(&Client::new()).await.unwrap_err();
        assert!(matches!(err, CloudError::Auth(ref m) if m.contains("401")), "got: {err:?}");
        assert!(tokens.expires_at().await.is_none());
    }

    #[tokio::test]
    async fn malformed_token_response_is_auth_error() {
        let (server, tokens) = setup().await;
        Mock::given(method("POST"))
            .and(path("/v1/clients/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "x"})))
            .mount(&server)
            .await;

        let err = tokens.acquire_token(&Client::new()).await.unwrap_err();
        assert!(matches!(err, CloudError::Auth(_)), "got: {err:?}");
        assert!(tokens.expires_at().await.is_none());
    }

    #[tokio::test]
    async fn invalidate_forces_new_exchange() {
        let (server, tokens) = setup().await;
        Mock::given(method("POST"))
            .and(path("/v1/clients/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("abc", 3600)))
            .expect(2)
            .mount(&server)
            .await;

        let http = Client::new();
        tokens.acquire_token(&http).await.unwrap();
        tokens.invalidate().await;
        tokens.acquire_token(&http).await.unwrap();
    }
}
