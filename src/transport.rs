//! Transport seam between the client and the backend.
//!
//! The [`Transport`] trait moves one request to the backend and hands back
//! the raw status and body. HTTP status codes are not errors at this layer;
//! interpreting them is the job of the session manager and solver client.
//! Only a failure to reach the backend at all is an error here.
//!
//! [`HttpTransport`] is the production implementation on top of `reqwest`.
//! Tests and demos substitute scripted in-process transports.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Trait for moving requests to the backend.
///
/// `Send + Sync` so one transport can be shared by the session manager and
/// any number of background poll tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the backend's response.
    ///
    /// Returns `NetworkUnavailable` if the backend could not be reached.
    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse>;
}

/// HTTP method of an [`ApiRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// A request relative to the API root.
#[derive(Debug)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path below the API root, e.g. `/schedules/solve`.
    pub path: String,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
    bearer: Option<SecretString>,
}

impl ApiRequest {
    /// Create a `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
            bearer: None,
        }
    }

    /// Create a `POST` request with a JSON body.
    pub fn post(path: impl Into<String>, body: &impl Serialize) -> ClientResult<Self> {
        let body = serde_json::to_value(body).map_err(|e| {
            ClientError::InvalidResponse(format!("failed to encode request body: {e}"))
        })?;
        Ok(Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
            bearer: None,
        })
    }

    /// Attach a bearer credential.
    pub fn with_bearer(mut self, token: SecretString) -> Self {
        self.bearer = Some(token);
        self
    }

    /// The attached bearer credential, if any.
    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_ref().map(|t| t.expose_secret())
    }
}

/// Raw backend response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl ApiResponse {
    /// Create a response from a status and a body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Create a response with a JSON body.
    pub fn json_body(status: u16, body: serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 401 or 403.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status, 401 | 403)
    }

    /// 4xx.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            ClientError::InvalidResponse(format!("HTTP {} body could not be decoded: {e}", self.status))
        })
    }

    /// Human-readable message for an error response.
    ///
    /// Prefers the JSON `message` field, then the raw body, then the status.
    pub fn message(&self) -> String {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&self.body) {
            if let Some(msg) = value.get("message").and_then(|m| m.as_str()) {
                return msg.to_string();
            }
        }
        let body = self.body.trim();
        if body.is_empty() {
            format!("HTTP {}", self.status)
        } else {
            body.to_string()
        }
    }

    /// Map a non-success, non-auth response to a `Backend` error.
    pub fn into_backend_error(self) -> ClientError {
        ClientError::Backend {
            status: self.status,
            message: self.message(),
        }
    }
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
    client: Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Create a transport for the configured API root.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                ClientError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;
        tracing::info!(api_base_url = %config.api_base_url, "HTTP transport ready");
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let url = self.config.url(&request.path);
        tracing::debug!(method = %request.method, %url, "API request");

        let mut builder = match request.method {
            // Status polls must never be served from a cache.
            Method::Get => self
                .client
                .get(&url)
                .header(CACHE_CONTROL, "no-cache")
                .header(PRAGMA, "no-cache"),
            Method::Post => self.client.post(&url),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = request.bearer() {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(method = %request.method, %url, "Could not reach API: {}", e);
            ClientError::NetworkUnavailable(e.to_string())
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::NetworkUnavailable(e.to_string()))?;
        tracing::debug!(method = %request.method, %url, status, "API response");

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_classification() {
        assert!(ApiResponse::new(200, "").is_success());
        assert!(ApiResponse::new(401, "").is_auth_failure());
        assert!(ApiResponse::new(403, "").is_auth_failure());
        assert!(!ApiResponse::new(400, "").is_auth_failure());
        assert!(ApiResponse::new(409, "").is_client_error());
        assert!(!ApiResponse::new(500, "").is_client_error());
    }

    #[test]
    fn test_response_message() {
        let resp = ApiResponse::json_body(400, json!({ "message": "sectionId is required" }));
        assert_eq!(resp.message(), "sectionId is required");

        let resp = ApiResponse::new(400, "  plain text error ");
        assert_eq!(resp.message(), "plain text error");

        let resp = ApiResponse::new(502, "");
        assert_eq!(resp.message(), "HTTP 502");
    }

    #[test]
    fn test_request_bearer() {
        let req = ApiRequest::get("/schedules/status/p1");
        assert!(req.bearer().is_none());

        let req = req.with_bearer(SecretString::from("tok".to_string()));
        assert_eq!(req.bearer(), Some("tok"));
        assert!(!format!("{req:?}").contains("tok\""));
    }

    #[test]
    fn test_post_body() {
        let req = ApiRequest::post("/auth/login", &json!({ "username": "ana" })).unwrap();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.body, Some(json!({ "username": "ana" })));
    }
}
