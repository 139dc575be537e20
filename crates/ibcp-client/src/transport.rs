//! Request transport for the gateway.
//!
//! [`Transport`] is the seam between the session logic and the wire: it
//! takes a [`GatewayRequest`] and returns the decoded JSON body.
//! [`HttpTransport`] is the production implementation, with a per-call
//! timeout and client-side rate limiting using the governor crate.

use crate::config::{ClientConfig, LogLevel};
use crate::endpoints::{Endpoint, HttpMethod};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;

/// A request for one gateway operation.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    /// Operation to invoke.
    pub endpoint: Endpoint,
    /// Optional JSON body.
    pub body: Option<serde_json::Value>,
    /// Query string parameters.
    pub query: Vec<(String, String)>,
}

impl GatewayRequest {
    /// Creates a request without body or query parameters.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            body: None,
            query: Vec::new(),
        }
    }

    /// Attaches a JSON body.
    ///
    /// # Errors
    /// Returns a serialization error if the body cannot be encoded.
    pub fn with_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

impl From<Endpoint> for GatewayRequest {
    fn from(endpoint: Endpoint) -> Self {
        Self::new(endpoint)
    }
}

/// Executes gateway requests.
///
/// Implementations must be safe to share between the foreground caller
/// and the heartbeat task.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and returns the JSON response body.
    ///
    /// An empty body is returned as an empty JSON object.
    ///
    /// # Errors
    /// Returns a transport-class [`GatewayError`] on network failure,
    /// timeout, non-success status or undecodable body.
    async fn invoke(&self, request: GatewayRequest) -> Result<serde_json::Value>;
}

/// Sends a request and decodes the response into `T`.
///
/// # Errors
/// Propagates transport errors; returns [`GatewayError::Serialization`] if
/// the body does not match `T`.
pub async fn invoke_typed<T: DeserializeOwned>(
    transport: &dyn Transport,
    request: GatewayRequest,
) -> Result<T> {
    let value = transport.invoke(request).await?;
    Ok(serde_json::from_value(value)?)
}

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// HTTP transport backed by `reqwest`.
pub struct HttpTransport {
    base_url: String,
    http: Client,
    rate_limiter: Arc<DirectRateLimiter>,
    log_level: LogLevel,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Creates a transport from client configuration.
    ///
    /// # Errors
    /// Returns a configuration error if the settings are invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .user_agent(concat!("ibcp-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                GatewayError::Configuration(format!("failed to build HTTP client: {e}"))
            })?;

        let rps = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            GatewayError::Configuration("requests_per_second must be positive".to_string())
        })?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            rate_limiter,
            log_level: config.log_level,
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Converts a response into a JSON value, mapping failure statuses.
    async fn handle_response(
        &self,
        endpoint: &Endpoint,
        response: reqwest::Response,
    ) -> Result<serde_json::Value> {
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
            return Err(GatewayError::rate_limit(retry_after));
        }

        let text = response.text().await?;

        if !status.is_success() {
            gateway_log!(
                self.log_level,
                Debug,
                endpoint = endpoint.name(),
                status = status.as_u16(),
                "Gateway returned failure status"
            );
            return Err(GatewayError::api(status.as_u16(), text));
        }

        gateway_log!(
            self.log_level,
            Debug,
            endpoint = endpoint.name(),
            body = %text,
            "Gateway response"
        );

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn invoke(&self, request: GatewayRequest) -> Result<serde_json::Value> {
        self.rate_limiter.until_ready().await;

        let GatewayRequest {
            endpoint,
            body,
            query,
        } = request;
        let url = format!("{}{}", self.base_url, endpoint.path());

        gateway_log!(
            self.log_level,
            Debug,
            endpoint = endpoint.name(),
            "{} {}",
            endpoint.method(),
            url
        );

        let mut builder = match endpoint.method() {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Post => self.http.post(&url),
        }
        .header("Accept", "application/json");

        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await?;

        self.handle_response(&endpoint, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport_for(server: &MockServer) -> HttpTransport {
        HttpTransport::new(&ClientConfig::default().with_base_url(server.uri())).unwrap()
    }

    #[test]
    fn test_request_builder() {
        let request = GatewayRequest::new(Endpoint::LiveOrders)
            .with_query("filters", "Submitted")
            .with_body(&serde_json::json!({ "a": 1 }))
            .unwrap();
        assert_eq!(request.endpoint, Endpoint::LiveOrders);
        assert_eq!(request.query, vec![("filters".to_string(), "Submitted".to_string())]);
        assert_eq!(request.body, Some(serde_json::json!({ "a": 1 })));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ClientConfig::default().with_base_url("localhost");
        assert!(matches!(
            HttpTransport::new(&config),
            Err(GatewayError::Configuration(_))
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = ClientConfig::default().with_base_url("http://127.0.0.1:5000/");
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.base_url(), "http://127.0.0.1:5000");
    }

    #[tokio::test]
    async fn test_get_decodes_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/api/sso/validate"))
            .and(header("Accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "USER_NAME": "trader1",
                "EXPIRES": 1000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let value = transport_for(&server)
            .invoke(Endpoint::ValidateSso.into())
            .await
            .unwrap();
        assert_eq!(value["USER_NAME"], "trader1");
    }

    #[tokio::test]
    async fn test_post_sends_body_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/api/iserver/account/DU1/orders"))
            .and(query_param("dryRun", "true"))
            .and(body_json(serde_json::json!({ "orders": [] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let request = GatewayRequest::new(Endpoint::place_order("DU1").unwrap())
            .with_query("dryRun", "true")
            .with_body(&serde_json::json!({ "orders": [] }))
            .unwrap();
        let value = transport_for(&server).invoke(request).await.unwrap();
        assert!(value.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_body_is_empty_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/api/iserver/reauthenticate"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let value = transport_for(&server)
            .invoke(Endpoint::Reauthenticate.into())
            .await
            .unwrap();
        assert_eq!(value, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_non_success_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/api/portfolio/accounts"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let err = transport_for(&server)
            .invoke(Endpoint::PortfolioAccounts.into())
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert!(matches!(
            err,
            GatewayError::Api {
                status_code: 401,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_rate_limited_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/api/tickle"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let err = transport_for(&server)
            .invoke(Endpoint::Tickle.into())
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::rate_limit(7));
    }

    #[tokio::test]
    async fn test_invalid_json_is_serialization_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/api/iserver/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = transport_for(&server)
            .invoke(Endpoint::TradeAccounts.into())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let config = ClientConfig::default()
            .with_base_url("http://127.0.0.1:9")
            .with_timeout_secs(2);
        let err = HttpTransport::new(&config)
            .unwrap()
            .invoke(Endpoint::ValidateSso.into())
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_invoke_typed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/api/logout"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": true })),
            )
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let reply: crate::types::LogoutResponse =
            invoke_typed(&transport, Endpoint::Logout.into()).await.unwrap();
        assert_eq!(reply.status, Some(true));
    }
}
