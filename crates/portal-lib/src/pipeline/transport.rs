//! Transport seam between the pipeline and the network
//!
//! A [`Transport`] delivers one [`ApiRequest`] and hands back whatever
//! response arrived, success or not. Only "no response at all" is an error
//! at this layer; status handling belongs to the pipeline.

use crate::error::{ApiError, SyncError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// How the caller negotiated the success body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    Json,
    Binary,
}

/// Outgoing request body
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart {
        field: String,
        file_name: String,
        bytes: Bytes,
    },
}

/// One call against the API, addressed by path relative to the API root
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    pub response_kind: ResponseKind,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            response_kind: ResponseKind::Json,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, path).with_body(RequestBody::Json(body))
    }

    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::PUT, path).with_body(RequestBody::Json(body))
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Negotiate a binary success body (file downloads)
    pub fn binary(mut self) -> Self {
        self.response_kind = ResponseKind::Binary;
        self
    }

    /// Reads never mutate server state and are eligible for de-duplication
    pub fn is_read(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }
}

/// Response as received from the server
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: None,
            content_disposition: None,
            body: body.into(),
        }
    }

    /// JSON response from a serializable value
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self {
            content_type: Some("application/json".to_string()),
            ..Self::new(status, value.to_string())
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body as JSON
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// File name offered in `Content-Disposition`, if any
    pub fn attachment_name(&self) -> Option<String> {
        let header = self.content_disposition.as_deref()?;
        header.split(';').map(str::trim).find_map(|part| {
            part.strip_prefix("filename=")
                .map(|name| name.trim_matches('"').to_string())
                .filter(|name| !name.is_empty())
        })
    }
}

/// Delivers requests to the API
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// `reqwest`-backed transport
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport rooted at `base_url` (scheme, host and optional prefix)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SyncError> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| SyncError::Config(format!("invalid API URL {}: {}", base_url, e)))?;
        if parsed.cannot_be_a_base() {
            return Err(SyncError::Config(format!("API URL {} cannot be a base", base_url)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(&request.path);
        debug!(method = %request.method, url = %url, "HTTP request");

        let builder = self.client.request(request.method.clone(), &url);
        let builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart {
                field,
                file_name,
                bytes,
            } => {
                let part = Part::bytes(bytes.to_vec()).file_name(file_name.clone());
                builder.multipart(Form::new().part(field.clone(), part))
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let header = |name: reqwest::header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header(CONTENT_TYPE);
        let content_disposition = header(CONTENT_DISPOSITION);

        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(ApiResponse {
            status,
            content_type,
            content_disposition,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_joins_base_and_path() {
        let transport = HttpTransport::new("http://localhost:5000/", Duration::from_secs(5)).unwrap();
        assert_eq!(transport.url_for("/api/projects/1"), "http://localhost:5000/api/projects/1");
        assert_eq!(transport.url_for("api/users"), "http://localhost:5000/api/users");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpTransport::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_attachment_name() {
        let mut response = ApiResponse::new(200, Vec::new());
        assert!(response.attachment_name().is_none());

        response.content_disposition = Some("attachment; filename=\"report.pdf\"".to_string());
        assert_eq!(response.attachment_name().as_deref(), Some("report.pdf"));
    }

    #[test]
    fn test_request_constructors() {
        let request = ApiRequest::get("/api/projects/3/file").binary();
        assert!(request.is_read());
        assert_eq!(request.response_kind, ResponseKind::Binary);

        let request = ApiRequest::put("/api/projects/set_cogs", serde_json::json!({"1": 2}));
        assert!(!request.is_read());
        assert!(matches!(request.body, RequestBody::Json(_)));
    }
}
