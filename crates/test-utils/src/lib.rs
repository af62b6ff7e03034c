//! Utilities for setting up tests: a mock brokerage API and a mock DON
//! gateway, each bound to an ephemeral localhost port.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Initialize a tracing subscriber for tests. Use `RUST_LOG` to set the
/// filter level. Silently does nothing if a subscriber is already set.
pub fn test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Response body the brokerage mock serves for the given portfolio value.
pub fn portfolio_body(value: f64) -> Value {
    serde_json::json!({"data": {"portfolio_value": value}})
}

/// Handle to a running mock brokerage API.
#[derive(Debug)]
pub struct MockBroker {
    /// Full URL of the account endpoint.
    pub url: String,
    hits: Arc<AtomicUsize>,
    headers: Arc<Mutex<HashMap<String, String>>>,
}

impl MockBroker {
    /// Number of requests the account endpoint has served.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Headers of the most recent request, lowercased names.
    pub fn last_headers(&self) -> HashMap<String, String> {
        self.headers.lock().unwrap().clone()
    }
}

#[derive(Clone)]
struct BrokerState {
    status: u16,
    body: Arc<Value>,
    hits: Arc<AtomicUsize>,
    headers: Arc<Mutex<HashMap<String, String>>>,
}

async fn broker_account(
    State(state): State<BrokerState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.headers.lock().unwrap() = headers
        .iter()
        .map(|(name, value)| {
            (name.as_str().to_owned(), value.to_str().unwrap_or_default().to_owned())
        })
        .collect();

    (StatusCode::from_u16(state.status).unwrap(), Json((*state.body).clone()))
}

/// Spin up a mock brokerage API serving `body` with `status` from the
/// account endpoint.
pub async fn spawn_broker(status: u16, body: Value) -> MockBroker {
    let hits = Arc::new(AtomicUsize::new(0));
    let headers = Arc::new(Mutex::new(HashMap::new()));
    let state = BrokerState {
        status,
        body: Arc::new(body),
        hits: Arc::clone(&hits),
        headers: Arc::clone(&headers),
    };

    let app = Router::new().route("/v2/account", get(broker_account)).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockBroker { url: format!("http://{addr}/v2/account"), hits, headers }
}

/// Handle to a running mock DON gateway.
#[derive(Debug)]
pub struct MockGateway {
    /// Base URL of the gateway.
    pub url: String,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl MockGateway {
    /// Number of upload requests the gateway has served.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Bodies of every upload request received, in order.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    /// The gateway URL as a [`Url`].
    pub fn endpoint(&self) -> Url {
        Url::parse(&self.url).unwrap()
    }
}

#[derive(Clone)]
struct GatewayState {
    response: Arc<Value>,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Value>>>,
}

async fn gateway_upload(State(state): State<GatewayState>, Json(body): Json<Value>) -> Json<Value> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state.requests.lock().unwrap().push(body);
    Json((*state.response).clone())
}

/// Spin up a mock DON gateway answering every upload with `response`.
pub async fn spawn_gateway(response: Value) -> MockGateway {
    let hits = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = GatewayState {
        response: Arc::new(response),
        hits: Arc::clone(&hits),
        requests: Arc::clone(&requests),
    };

    let app = Router::new().route("/", post(gateway_upload)).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockGateway { url: format!("http://{addr}/"), hits, requests }
}
