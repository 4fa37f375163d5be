//! Authenticated Arduino Cloud resource client.
//!
//! Every call first resolves a valid credential from the [`TokenManager`] and
//! then sends the request with that bearer token. Endpoints live under the
//! `v2` API of the configured base URL.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::auth::TokenManager;
use crate::config::CloudConfig;
use crate::error::{CloudError, Result};
use crate::models::{Device, Property, Thing};

/// Body of a property publish request.
#[derive(Serialize)]
struct PublishRequest<'a> {
    value: &'a Value,
}

/// HTTP client for devices, things and properties.
#[derive(Debug)]
pub struct CloudClient {
    http: Client,
    base_url: Url,
    tokens: TokenManager,
    read_retries: u32,
    retry_backoff: Duration,
}

impl CloudClient {
    pub fn new(config: CloudConfig) -> Result<Self> {
        config.validate()?;
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("acloud-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CloudError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            tokens: TokenManager::new(&config),
            http,
            base_url: config.api_base_url,
            read_retries: config.read_retries,
            retry_backoff: config.retry_backoff,
        })
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        self.get_json("get devices", &["devices"], &[]).await
    }

    pub async fn get_device(&self, device_id: &str) -> Result<Device> {
        self.get_json("get device", &["devices", device_id], &[])
            .await
            .map_err(|e| not_found_as(e, "Device", device_id))
    }

    /// All things, each with its properties inline.
    ///
    /// The list endpoint omits properties unless `show_properties` is set.
    pub async fn list_things(&self) -> Result<Vec<Thing>> {
        self.get_json("get things", &["things"], &[("show_properties", "true")])
            .await
    }

    pub async fn list_properties(&self, thing_id: &str) -> Result<Vec<Property>> {
        self.get_json("get properties", &["things", thing_id, "properties"], &[])
            .await
            .map_err(|e| not_found_as(e, "Thing", thing_id))
    }

    pub async fn get_property(&self, thing_id: &str, property_id: &str) -> Result<Property> {
        self.get_json(
            "get property",
            &["things", thing_id, "properties", property_id],
            &[],
        )
            .await
            .map_err(|e| not_found_as(e, "Property", property_id))
    }

    /// Publish a new value for a property. The response body is ignored.
    pub async fn publish_property(
        &self,
        thing_id: &str,
        property_id: &str,
        value: &Value,
    ) -> Result<()> {
        let operation = "update property";
        let url = self.endpoint(&["things", thing_id, "properties", property_id, "publish"])?;
        let request = self
            .http
            .request(Method::PUT, url)
            .json(&PublishRequest { value });
        self.send(operation, request).await?;
        Ok(())
    }

    /// GET and decode, retrying transient failures when configured.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        let mut attempt = 0;
        loop {
            let request = self.http.get(url.clone()).query(query);
            let result = match self.send(operation, request).await {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    resp.json::<T>().await.map_err(|e| CloudError::RemoteCall {
                        operation,
                        status: Some(status),
                        message: format!("response parse error: {e}"),
                    })
                }
                Err(e) => Err(e),
            };

            match result {
                Err(e) if e.is_transient() && attempt < self.read_retries => {
                    let backoff = self.retry_backoff.saturating_mul(2u32.saturating_pow(attempt));
                    warn!(operation, attempt = attempt + 1, ?backoff, error = %e, "retrying read");
                    sleep(backoff).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Attach the bearer token, send, and turn failures into `RemoteCall`.
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<reqwest::Response> {
        let token = self.tokens.acquire_token(&self.http).await?;
        debug!(operation, "calling Arduino Cloud");

        let resp = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CloudError::remote(operation, e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED {
            // The server revoked the token early; the next call re-authenticates.
            self.tokens.invalidate().await;
        }
        let body = resp.text().await.unwrap_or_default();
        Err(CloudError::RemoteCall {
            operation,
            status: Some(status.as_u16()),
            message: format!("HTTP {status}: {body}"),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CloudError::Config(format!("API base URL {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push("v2")
            .extend(segments);
        Ok(url)
    }
}

/// Map a 404 on a single-resource lookup to `NotFound`.
fn not_found_as(err: CloudError, resource: &'static str, id: &str) -> CloudError {
    match err {
        CloudError::RemoteCall {
            status: Some(404), ..
        } => CloudError::NotFound {
            resource,
            id: id.to_string(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_with(configure: impl FnOnce(&mut CloudConfig)) -> (MockServer, CloudClient) {
        let server = MockServer::start().await;
        let mut config = CloudConfig::new("id", "secret")
            .unwrap()
            .with_base_url(&server.uri())
            .unwrap();
        configure(&mut config);

        Mock::given(method("POST"))
            .and(path("/v1/clients/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "tok-1", "expires_in": 3600})),
            )
            .mount(&server)
            .await;

        (server, CloudClient::new(config).unwrap())
    }

    async fn setup() -> (MockServer, CloudClient) {
        setup_with(|_| {}).await
    }

    #[tokio::test]
    async fn list_devices_sends_bearer_token() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/v2/devices"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "d1", "name": "Nano", "type": "nano_33_iot", "status": "ONLINE"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let devices = client.list_devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "Nano");
        assert_eq!(devices[0].status.as_deref(), Some("ONLINE"));
    }

    #[tokio::test]
    async fn list_things_requests_inline_properties() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/v2/things"))
            .and(query_param("show_properties", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "t1", "name": "Office", "device_id": "d1", "properties": [
                    {"id": "p1", "name": "Desk Lamp", "type": "HOME_LIGHT"}
                ]}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let things = client.list_things().await.unwrap();
        assert_eq!(things.len(), 1);
        assert_eq!(things[0].properties.len(), 1);
        assert_eq!(things[0].properties[0].name, "Desk Lamp");
    }

    #[tokio::test]
    async fn get_property_uses_nested_path() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/v2/things/t1/properties/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p1", "name": "Temperature", "type": "TEMPERATURE_C",
                "permission": "READ_ONLY", "last_value": 21.5
            })))
            .mount(&server)
            .await;

        let prop = client.get_property("t1", "p1").await.unwrap();
        assert_eq!(prop.last_value, Some(json!(21.5)));
    }

    #[tokio::test]
    async fn ids_are_path_encoded() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/v2/devices/a%2Fb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "a/b"})))
            .expect(1)
            .mount(&server)
            .await;

        let device = client.get_device("a/b").await.unwrap();
        assert_eq!(device.id, "a/b");
    }

    #[tokio::test]
    async fn publish_puts_value_envelope() {
        let (server, client) = setup().await;
        Mock::given(method("PUT"))
            .and(path("/v2/things/t1/properties/p1/publish"))
            .and(header("authorization", "Bearer tok-1"))
            .and(body_json(json!({"value": {"swi": true, "bri": 30}})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client
            .publish_property("t1", "p1", &json!({"swi": true, "bri": 30}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn server_error_is_remote_call_failure() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/v2/things"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client.list_things().await.unwrap_err();
        match err {
            CloudError::RemoteCall {
                operation,
                status,
                message,
            } => {
                assert_eq!(operation, "get things");
                assert_eq!(status, Some(500));
                assert!(message.contains("boom"));
            }
            other => panic!("expected RemoteCall, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_device_is_not_found() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/v2/devices/nope"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client.get_device("nope").await.unwrap_err();
        assert!(
            matches!(err, CloudError::NotFound { resource: "Device", ref id } if id == "nope"),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn auth_failure_skips_resource_call() {
        let server = MockServer::start().await;
        let config = CloudConfig::new("id", "secret")
            .unwrap()
            .with_base_url(&server.uri())
            .unwrap();
        Mock::given(method("POST"))
            .and(path("/v1/clients/token"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let client = CloudClient::new(config).unwrap();
        let err = client.list_devices().await.unwrap_err();
        assert!(matches!(err, CloudError::Auth(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn unauthorized_drops_cached_token() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/v2/devices"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        assert!(client.list_devices().await.is_err());
        assert!(client.tokens().expires_at().await.is_none());
    }

    #[tokio::test]
    async fn reads_are_not_retried_by_default() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/v2/devices"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client.list_devices().await.is_err());
    }

    #[tokio::test]
    async fn configured_retries_recover_transient_read() {
        let (server, client) = setup_with(|c| {
            c.read_retries = 2;
            c.retry_backoff = Duration::from_millis(1);
        })
        .await;
        Mock::given(method("GET"))
            .and(path("/v2/devices"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client.list_devices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn client_errors_are_never_retried() {
        let (server, client) = setup_with(|c| {
            c.read_retries = 3;
            c.retry_backoff = Duration::from_millis(1);
        })
        .await;
        Mock::given(method("GET"))
            .and(path("/v2/things/t1/properties"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client.list_properties("t1").await.is_err());
    }

    #[tokio::test]
    async fn publish_is_never_retried() {
        let (server, client) = setup_with(|c| {
            c.read_retries = 3;
            c.retry_backoff = Duration::from_millis(1);
        })
        .await;
        Mock::given(method("PUT"))
            .and(path("/v2/things/t1/properties/p1/publish"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = client
            .publish_property("t1", "p1", &json!(true))
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::RemoteCall { operation: "update property", .. }));
    }
}
