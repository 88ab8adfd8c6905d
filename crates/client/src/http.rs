//! HTTP client adapter for the PO management API.
//!
//! [`ApiClient`] wraps a [`reqwest::Client`] and is the only place that
//! talks to the network. For every request it:
//!
//! - reads the active credential from the [`SessionStore`] and sends it as
//!   `Authorization: Bearer <token>` (nothing is sent when there is none);
//! - tags the request with a fresh `x-request-id`;
//! - turns the response into an [`ApiResponse`] or an [`ApiError`].
//!
//! A 401 clears the session through [`SessionStore::expire`] and publishes
//! [`SessionEvent::Expired`], once per credential however many requests
//! fail with it.

use std::sync::Arc;

use pomgmt_core::error::ErrorKind;
use reqwest::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::events::{SessionEvent, SessionEvents};
use crate::session_store::{ActiveCredential, SessionStore};

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Multipart field name the ingestion endpoints expect.
const UPLOAD_FIELD: &str = "file";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Normalized failure of a single API call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// HTTP 401. Any session the request carried has been cleared.
    #[error("Unauthorized")]
    Unauthorized { message: Option<String> },

    /// Any other 4xx.
    #[error("Request rejected ({status}): {}", message.as_deref().unwrap_or("no detail"))]
    ClientError { status: u16, message: Option<String> },

    /// HTTP 5xx.
    #[error("Server error ({status})")]
    ServerError { status: u16 },

    /// Connection failure or timeout.
    #[error("Network error: {0}")]
    Transient(String),

    /// A 2xx response whose body did not have the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ApiError::ClientError { .. } => ErrorKind::ClientError,
            ApiError::ServerError { .. } | ApiError::Decode(_) => ErrorKind::ServerError,
            ApiError::Transient(_) => ErrorKind::Transient,
        }
    }

    /// Server-supplied detail, if the server sent one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::ClientError { message, .. } | ApiError::Unauthorized { message } => {
                message.as_deref()
            }
            _ => None,
        }
    }

    /// Text to show a user: the server detail when present, else `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Unauthorized { .. } => {
                "Your session has expired. Please sign in again.".to_string()
            }
            _ => self.detail().unwrap_or(fallback).to_string(),
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transient(err.to_string())
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Accepts `{"detail": "..."}` as well as `{"error": "..."}` and
/// `{"message": "..."}`. Structured details (e.g. validation error lists)
/// yield `None` so the caller's fallback is shown instead.
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["detail", "error", "message"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
    /// Single-file `multipart/form-data` under the `file` field.
    File { file_name: String, bytes: Vec<u8> },
}

/// How the caller wants the response body handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseKind {
    #[default]
    Json,
    /// Opaque bytes, returned unparsed.
    Binary,
    /// Body ignored.
    Empty,
}

/// Opaque binary payload plus the headers needed to save it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryPayload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Json(serde_json::Value),
    Binary(BinaryPayload),
    Empty,
}

/// One outbound call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub response: ResponseKind,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            response: ResponseKind::Json,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn expect(mut self, response: ResponseKind) -> Self {
        self.response = response;
        self
    }
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// HTTP adapter shared by every component that talks to the API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
    events: Arc<SessionEvents>,
}

impl ApiClient {
    /// Build an adapter with the configured base URL and request timeout.
    pub fn new(
        config: &ClientConfig,
        session: Arc<SessionStore>,
        events: Arc<SessionEvents>,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(http, config.base_url.clone(), session, events))
    }

    /// Build an adapter around an existing [`reqwest::Client`].
    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        session: Arc<SessionStore>,
        events: Arc<SessionEvents>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            events,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Issue one request and normalize the outcome.
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let active = self.session.current();
        let request_id = Uuid::new_v4().to_string();
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .header(REQUEST_ID_HEADER, &request_id);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(active) = &active {
            builder = builder.header(AUTHORIZATION, active.credential().bearer());
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::File { file_name, bytes } => {
                let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
                builder.multipart(reqwest::multipart::Form::new().part(UPLOAD_FIELD, part))
            }
        };

        tracing::debug!(
            request_id = %request_id,
            method = %request.method,
            path = %request.path,
            authenticated = active.is_some(),
            "Sending API request",
        );

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(request_id = %request_id, path = %request.path, error = %e, "API request failed");
            ApiError::from_reqwest(e)
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.handle_unauthorized(active.as_ref(), &request.path, &request_id);
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Unauthorized {
                message: extract_message(&body),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = if status.is_server_error() {
                ApiError::ServerError {
                    status: status.as_u16(),
                }
            } else {
                ApiError::ClientError {
                    status: status.as_u16(),
                    message: extract_message(&body),
                }
            };
            tracing::warn!(
                request_id = %request_id,
                path = %request.path,
                status = status.as_u16(),
                "API returned an error status",
            );
            return Err(err);
        }

        match request.response {
            ResponseKind::Json => {
                let value = response
                    .json::<serde_json::Value>()
                    .await
                    .map_err(ApiError::from_reqwest)?;
                Ok(ApiResponse::Json(value))
            }
            ResponseKind::Binary => {
                let header = |name| {
                    response
                        .headers()
                        .get(name)
                        .and_then(|v: &reqwest::header::HeaderValue| v.to_str().ok())
                        .map(str::to_string)
                };
                let content_type = header(CONTENT_TYPE);
                let content_disposition = header(CONTENT_DISPOSITION);
                let bytes = response.bytes().await.map_err(ApiError::from_reqwest)?;
                Ok(ApiResponse::Binary(BinaryPayload {
                    bytes: bytes.to_vec(),
                    content_type,
                    content_disposition,
                }))
            }
            ResponseKind::Empty => Ok(ApiResponse::Empty),
        }
    }

    /// Expire the credential the failed request carried, at most once.
    fn handle_unauthorized(&self, active: Option<&ActiveCredential>, path: &str, request_id: &str) {
        let Some(active) = active else {
            tracing::debug!(request_id, path, "Unauthenticated request rejected with 401");
            return;
        };
        if self.session.expire(active.generation()) {
            tracing::warn!(request_id, path, "Session expired, forcing logout");
            self.events.publish(SessionEvent::Expired);
        }
    }

    // ---- typed helpers ----

    /// `GET` a JSON document and deserialize it.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(&'static str, String)>,
    ) -> Result<T, ApiError> {
        let response = self.request(ApiRequest::get(path).query(query)).await?;
        Self::decode_json(response)
    }

    /// `GET` an opaque binary payload.
    pub async fn get_binary(
        &self,
        path: &str,
        query: Vec<(&'static str, String)>,
    ) -> Result<BinaryPayload, ApiError> {
        let request = ApiRequest::get(path)
            .query(query)
            .expect(ResponseKind::Binary);
        match self.request(request).await? {
            ApiResponse::Binary(payload) => Ok(payload),
            other => Err(ApiError::Decode(format!("expected binary body, got {other:?}"))),
        }
    }

    /// `POST` a form and deserialize the JSON reply.
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        fields: Vec<(String, String)>,
    ) -> Result<T, ApiError> {
        let response = self
            .request(ApiRequest::post(path).body(RequestBody::Form(fields)))
            .await?;
        Self::decode_json(response)
    }

    /// `POST` one file as multipart and ignore the reply body.
    pub async fn post_file(
        &self,
        path: &str,
        file_name: String,
        bytes: Vec<u8>,
    ) -> Result<(), ApiError> {
        let request = ApiRequest::post(path)
            .body(RequestBody::File { file_name, bytes })
            .expect(ResponseKind::Empty);
        self.request(request).await.map(|_| ())
    }

    fn decode_json<T: DeserializeOwned>(response: ApiResponse) -> Result<T, ApiError> {
        match response {
            ApiResponse::Json(value) => {
                serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
            }
            other => Err(ApiError::Decode(format!("expected JSON body, got {other:?}"))),
        }
    }
}
