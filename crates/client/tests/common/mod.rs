//! In-process mock of the PO management API.
//!
//! Every request is recorded (path, query, headers, body) so tests can
//! assert on what the client sent, and on what it did not send.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::Router;
use tokio::net::TcpListener;

use pomgmt_client::session_store::SessionStore;
use pomgmt_client::storage::MemoryStorage;
use pomgmt_client::{ApiClient, ClientConfig, SessionController, SessionEvents};
use pomgmt_core::session::{Credential, Identity, UserId};

/// A request as the mock server saw it.
#[derive(Debug, Clone)]
pub struct Hit {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Hit {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Canned reply for one path.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Vec<u8>,
    pub headers: Vec<(&'static str, String)>,
    pub delay: Option<Duration>,
}

impl Reply {
    pub fn json(status: StatusCode, value: serde_json::Value) -> Self {
        Self {
            status,
            body: value.to_string().into_bytes(),
            headers: vec![("content-type", "application/json".to_string())],
            delay: None,
        }
    }

    pub fn bytes(body: Vec<u8>, headers: Vec<(&'static str, String)>) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            headers,
            delay: None,
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: Vec::new(),
            headers: Vec::new(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Default)]
struct MockState {
    hits: Mutex<Vec<Hit>>,
    replies: Mutex<HashMap<String, Reply>>,
}

pub struct MockServer {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockServer {
    /// Bind to an ephemeral port and serve until the test runtime exits.
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn reply(&self, path: &str, reply: Reply) {
        self.state
            .replies
            .lock()
            .unwrap()
            .insert(path.to_string(), reply);
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.state.hits.lock().unwrap().clone()
    }

    pub fn hits_for(&self, path: &str) -> Vec<Hit> {
        self.hits().into_iter().filter(|h| h.path == path).collect()
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    Query(query): Query<Vec<(String, String)>>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
    let path = parts.uri.path().to_string();

    state.hits.lock().unwrap().push(Hit {
        method: parts.method.to_string(),
        path: path.clone(),
        query,
        headers: parts.headers,
        body: body.to_vec(),
    });

    let reply = state.replies.lock().unwrap().get(&path).cloned();
    let reply = reply.unwrap_or_else(|| {
        Reply::json(StatusCode::NOT_FOUND, serde_json::json!({ "detail": "Not Found" }))
    });
    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }

    let mut builder = Response::builder().status(reply.status);
    for (name, value) in &reply.headers {
        builder = builder.header(*name, value);
    }
    builder.body(Body::from(reply.body)).unwrap()
}

// ---------------------------------------------------------------------------
// Client fixtures
// ---------------------------------------------------------------------------

pub fn test_config(base_url: &str) -> ClientConfig {
    ClientConfig {
        base_url: base_url.to_string(),
        request_timeout: Duration::from_secs(5),
        page_size: 50,
        session_file: std::env::temp_dir().join("pomgmt-unused-session.json"),
    }
}

pub fn identity() -> Identity {
    Identity {
        id: UserId::Numeric(7),
        email: "buyer@example.com".into(),
        display_name: "Buyer".into(),
    }
}

pub fn credential(token: &str) -> Credential {
    Credential::new(token, identity()).unwrap()
}

/// An adapter with an in-memory session, plus its store and event bus.
pub struct Harness {
    pub api: Arc<ApiClient>,
    pub session: Arc<SessionStore>,
    pub events: Arc<SessionEvents>,
    pub auth: Arc<SessionController>,
}

impl Harness {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_storage(config, MemoryStorage::new())
    }

    pub fn with_storage(config: &ClientConfig, storage: MemoryStorage) -> Self {
        let session = Arc::new(SessionStore::new(storage));
        let events = Arc::new(SessionEvents::default());
        let api = Arc::new(ApiClient::new(config, session.clone(), events.clone()).unwrap());
        let auth = Arc::new(SessionController::new(
            api.clone(),
            session.clone(),
            events.clone(),
        ));
        Self {
            api,
            session,
            events,
            auth,
        }
    }

    pub fn signed_in(config: &ClientConfig, token: &str) -> Self {
        let harness = Self::new(config);
        harness.session.save(credential(token)).unwrap();
        harness.auth.bootstrap();
        harness
    }
}
