//! Local HomeAssistant REST API stand-in for tests
//!
//! Serves `GET /api/` and `POST /api/states/:entity` with axum, records every request and
//! answers with a canned or computed response.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// One request seen by [`HassStub`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

type Responder = dyn Fn(&RecordedRequest) -> (u16, String) + Send + Sync;

#[derive(Clone)]
struct StubState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    responder: Arc<Responder>,
}

type Reply = (StatusCode, [(header::HeaderName, &'static str); 1], String);

impl StubState {
    fn record(&self, method: &str, path: String, headers: &HeaderMap, body: String) -> Reply {
        let request = RecordedRequest {
            method: method.to_string(),
            path,
            headers: headers
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        value.to_str().unwrap_or_default().to_string(),
                    )
                })
                .collect(),
            body,
        };
        let (status, body) = (self.responder)(&request);
        self.requests.lock().unwrap().push(request);

        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(header::CONTENT_TYPE, "application/json")], body)
    }
}

async fn api_status(State(stub): State<StubState>, headers: HeaderMap) -> Reply {
    stub.record("GET", "/api/".to_string(), &headers, String::new())
}

async fn post_state(
    State(stub): State<StubState>,
    Path(entity): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Reply {
    stub.record("POST", format!("/api/states/{}", entity), &headers, body)
}

/// HomeAssistant stand-in bound to an ephemeral localhost port; stops when dropped
pub struct HassStub {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    server: JoinHandle<()>,
}

impl HassStub {
    /// Answer every request with `status` and `body`
    pub async fn start(status: u16, body: &str) -> Self {
        let body = body.to_string();
        Self::start_with(move |_| (status, body.clone())).await
    }

    /// Answer each request with whatever `responder` returns for it
    pub async fn start_with<F>(responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> (u16, String) + Send + Sync + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            requests: Arc::clone(&requests),
            responder: Arc::new(responder),
        };

        let router = Router::new()
            .route("/api/", get(api_status))
            .route("/api/states/:entity", post(post_state))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self {
            addr,
            requests,
            server,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for HassStub {
    fn drop(&mut self) {
        self.server.abort();
    }
}
