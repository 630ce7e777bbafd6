//! Purpose: Loopback stand-in for the script-hosted backend used by integration tests.
//! Exports: `Backend`, `Primary`, `Fallback`, `TestResult`, `closed_endpoint`.
//! Role: Serves canned POST replies and JSONP scripts while recording every request.
//! Invariants: Binds 127.0.0.1 on an ephemeral port before the server thread starts.
//! Invariants: The server thread is told to shut down when `Backend` drops.
#![allow(dead_code)]

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

pub type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

pub const EXEC_PATH: &str = "/macros/s/test-deployment/exec";

#[derive(Clone, Copy, Debug)]
pub enum Primary {
    /// 200 with a JSON body.
    Json(&'static str),
    /// 500 with a JSON body.
    ServerErrorJson(&'static str),
    /// 200 with an HTML page, as a redirecting deployment serves.
    Html,
}

#[derive(Clone, Copy, Debug)]
pub enum Fallback {
    /// Script invoking the requested callback with this JSON.
    Callback(&'static str),
    /// 404 for every script load.
    NotFound,
}

struct BackendState {
    primary: Primary,
    fallback: Fallback,
    posts: Mutex<Vec<HashMap<String, String>>>,
    post_content_types: Mutex<Vec<String>>,
    loads: Mutex<Vec<HashMap<String, String>>>,
}

pub struct Backend {
    endpoint: String,
    state: Arc<BackendState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Backend {
    pub fn start(primary: Primary, fallback: Fallback) -> TestResult<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let state = Arc::new(BackendState {
            primary,
            fallback,
            posts: Mutex::new(Vec::new()),
            post_content_types: Mutex::new(Vec::new()),
            loads: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route(EXEC_PATH, post(post_exec).get(get_exec))
            .with_state(Arc::clone(&state));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        std::thread::spawn(move || {
            runtime.block_on(async move {
                let Ok(listener) = tokio::net::TcpListener::from_std(listener) else {
                    return;
                };
                let _ = axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await;
            });
        });

        Ok(Self {
            endpoint: format!("http://{addr}{EXEC_PATH}"),
            state,
            shutdown: Some(shutdown_tx),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn posts(&self) -> Vec<HashMap<String, String>> {
        lock(&self.state.posts).clone()
    }

    pub fn post_content_types(&self) -> Vec<String> {
        lock(&self.state.post_content_types).clone()
    }

    pub fn loads(&self) -> Vec<HashMap<String, String>> {
        lock(&self.state.loads).clone()
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// An endpoint on a port nothing listens on.
pub fn closed_endpoint() -> TestResult<String> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(format!("http://127.0.0.1:{port}{EXEC_PATH}"))
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}

async fn post_exec(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let fields = url::form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect();
    lock(&state.posts).push(fields);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    lock(&state.post_content_types).push(content_type);

    match state.primary {
        Primary::Json(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Primary::ServerErrorJson(body) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Primary::Html => (
            [(header::CONTENT_TYPE, "text/html")],
            "<html><body>Moved Temporarily</body></html>",
        )
            .into_response(),
    }
}

async fn get_exec(
    State(state): State<Arc<BackendState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let callback = query.get("callback").cloned().unwrap_or_default();
    lock(&state.loads).push(query);

    match state.fallback {
        Fallback::Callback(payload) => (
            [(header::CONTENT_TYPE, "application/javascript")],
            format!("{callback}({payload});"),
        )
            .into_response(),
        Fallback::NotFound => StatusCode::NOT_FOUND.into_response(),
    }
}
