use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_USER: &str = "/user";
pub const PATH_SLOW: &str = "/slow";
pub const PATH_STATUS: &str = "/status/{code}";

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    users_read: Arc<AtomicU64>,
    users_created: Arc<AtomicU64>,
    rejected_bodies: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc_requests_total(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn users_read(&self) -> u64 {
        self.users_read.load(Ordering::Relaxed)
    }

    pub fn users_created(&self) -> u64 {
        self.users_created.load(Ordering::Relaxed)
    }

    pub fn rejected_bodies(&self) -> u64 {
        self.rejected_bodies.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Serialize)]
struct User {
    id: String,
    first_name: String,
    last_name: String,
}

#[derive(Debug, Deserialize)]
struct CreateUser {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: &'static str,
    errors: HashMap<&'static str, &'static str>,
}

#[derive(Debug, Clone, Default)]
struct AppState {
    stats: TestServerStats,
    users: Arc<Mutex<Vec<User>>>,
    next_id: Arc<AtomicU64>,
}

async fn handle_read_users(State(state): State<AppState>) -> Json<Vec<User>> {
    state.stats.inc_requests_total();
    state.stats.users_read.fetch_add(1, Ordering::Relaxed);

    let users = state
        .users
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    Json(users)
}

async fn handle_create_user(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<User>), (StatusCode, Json<ErrorBody>)> {
    state.stats.inc_requests_total();

    let reject = |field: &'static str, reason: &'static str| {
        state.stats.rejected_bodies.fetch_add(1, Ordering::Relaxed);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                message: "failed validation",
                errors: HashMap::from([(field, reason)]),
            }),
        )
    };

    let input: CreateUser =
        serde_json::from_slice(&body).map_err(|_| reject("body", "json invalid"))?;
    if input.first_name.trim().is_empty() {
        return Err(reject("first_name", "required"));
    }
    if input.last_name.trim().is_empty() {
        return Err(reject("last_name", "required"));
    }

    let id = state.next_id.fetch_add(1, Ordering::Relaxed).saturating_add(1);
    let user = User {
        id: id.to_string(),
        first_name: input.first_name,
        last_name: input.last_name,
    };

    state
        .users
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(user.clone());
    state.stats.users_created.fetch_add(1, Ordering::Relaxed);

    Ok((StatusCode::CREATED, Json(user)))
}

async fn handle_slow(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> &'static str {
    state.stats.inc_requests_total();
    let ms = query
        .get("ms")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(50);
    sleep(Duration::from_millis(ms)).await;
    "slow"
}

async fn handle_status(State(state): State<AppState>, Path(code): Path<u16>) -> StatusCode {
    state.stats.inc_requests_total();
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

pub fn router(stats: TestServerStats) -> Router {
    let state = AppState {
        stats,
        ..AppState::default()
    };

    Router::new()
        .route(PATH_USER, get(handle_read_users).post(handle_create_user))
        .route(PATH_SLOW, get(handle_slow))
        .route(PATH_STATUS, get(handle_status))
        .with_state(state)
}

/// Mock target bound to an ephemeral loopback port, stopped on [`TestServer::shutdown`] or drop.
pub struct TestServer {
    addr: SocketAddr,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `host:port` form, suitable for the `HOST` setting of a run.
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
