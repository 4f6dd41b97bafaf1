// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests for the client pipeline against an in-process backend.
//!
//! The backend is a real axum server on an ephemeral port. It accepts exactly
//! one access token at a time and rotates it on every successful refresh.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use authclient::client::ApiClient;
use authclient::config::ClientConfig;
use authclient::credential::store::MemoryStore;
use authclient::credential::{CredentialAccessor, CredentialPair, CredentialStore};
use authclient::session::{Session, SessionEvent};

// -- Mock backend -------------------------------------------------------------

struct Backend {
    /// The only access token currently accepted.
    valid: Mutex<String>,
    /// Next access token handed out by refresh.
    next: Mutex<u32>,
    reject_refresh: AtomicBool,
    refresh_delay: Duration,
    refresh_calls: AtomicU32,
    /// Authorization header seen on the refresh endpoint.
    refresh_saw_bearer: AtomicBool,
    /// Authorization headers seen per resource, in arrival order.
    seen: Mutex<HashMap<String, Vec<Option<String>>>>,
    last_locale: Mutex<Option<String>>,
}

impl Backend {
    fn new(refresh_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            valid: Mutex::new("T1".to_owned()),
            next: Mutex::new(2),
            reject_refresh: AtomicBool::new(false),
            refresh_delay,
            refresh_calls: AtomicU32::new(0),
            refresh_saw_bearer: AtomicBool::new(false),
            seen: Mutex::new(HashMap::new()),
            last_locale: Mutex::new(None),
        })
    }

    /// Expire the current token so the next request gets a 401.
    fn expire(&self, accepted: &str) {
        *self.valid.lock() = accepted.to_owned();
    }

    fn seen(&self, name: &str) -> Vec<Option<String>> {
        self.seen.lock().get(name).cloned().unwrap_or_default()
    }

    fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from)
}

fn expired() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"statusCode": 401, "message": "token expired", "errorCode": "TOKEN_EXPIRED"})),
    )
        .into_response()
}

async fn item(
    State(b): State<Arc<Backend>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let token = bearer(&headers);
    *b.last_locale.lock() =
        headers.get("accept-language").and_then(|v| v.to_str().ok()).map(String::from);
    b.seen.lock().entry(name.clone()).or_default().push(token.clone());
    if token.as_deref() != Some(b.valid.lock().as_str()) {
        return expired();
    }
    Json(json!({"statusCode": 200, "data": {"name": name}, "message": "ok"})).into_response()
}

async fn always_expired(State(b): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    b.seen.lock().entry("always".to_owned()).or_default().push(bearer(&headers));
    expired()
}

async fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, Json(json!({"message": "forbidden", "errorCode": "FORBIDDEN"})))
        .into_response()
}

async fn refresh(
    State(b): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    b.refresh_calls.fetch_add(1, Ordering::SeqCst);
    if headers.contains_key("authorization") {
        b.refresh_saw_bearer.store(true, Ordering::SeqCst);
    }
    tokio::time::sleep(b.refresh_delay).await;

    if b.reject_refresh.load(Ordering::SeqCst) || body["refreshToken"].as_str().is_none() {
        return expired();
    }
    let token = {
        let mut next = b.next.lock();
        let token = format!("T{}", *next);
        *next += 1;
        token
    };
    *b.valid.lock() = token.clone();
    Json(json!({"data": {"accessToken": token, "refreshToken": "R-next"}})).into_response()
}

async fn spawn_backend(backend: Arc<Backend>) -> anyhow::Result<String> {
    let router = Router::new()
        .route("/items/{name}", get(item))
        .route("/always-expired", get(always_expired))
        .route("/forbidden", get(forbidden))
        .route("/auth/refresh", post(refresh))
        .with_state(backend);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{addr}"))
}

// -- Harness ------------------------------------------------------------------

struct Fixture {
    backend: Arc<Backend>,
    client: Arc<ApiClient>,
    store: Arc<MemoryStore>,
    session: Arc<Session>,
}

async fn fixture(refresh_delay: Duration) -> anyhow::Result<Fixture> {
    let backend = Backend::new(refresh_delay);
    let base_url = spawn_backend(Arc::clone(&backend)).await?;
    let config = ClientConfig {
        base_url,
        locale: Some("de-DE".to_owned()),
        request_timeout_ms: 5000,
        refresh_timeout_ms: 2000,
        refresh_wait_grace_ms: 500,
        ..ClientConfig::default()
    };
    let store = Arc::new(MemoryStore::with_pair(
        CredentialPair::new("T1", "R1"),
        config.locale.clone(),
    ));
    let session = Session::new(Arc::clone(&store) as Arc<dyn CredentialStore>);
    let client = Arc::new(ApiClient::new(
        &config,
        Arc::clone(&store) as Arc<dyn CredentialStore>,
        Arc::clone(session.notifier()),
    )?);
    Ok(Fixture { backend, client, store, session })
}

// -- Happy path ---------------------------------------------------------------

#[tokio::test]
async fn valid_credential_passes_through() -> anyhow::Result<()> {
    let f = fixture(Duration::ZERO).await?;
    let env = f.client.get::<Value>("/items/a").await;

    assert_eq!(env.status_code(), 200);
    assert_eq!(env.data(), Some(&json!({"name": "a"})));
    assert_eq!(f.backend.refresh_calls(), 0);
    assert_eq!(f.backend.seen("a"), vec![Some("T1".to_owned())]);
    assert_eq!(f.backend.last_locale.lock().as_deref(), Some("de-DE"));
    Ok(())
}

// -- Refresh and replay -------------------------------------------------------

#[tokio::test]
async fn concurrent_expiry_refreshes_once_and_replays_each() -> anyhow::Result<()> {
    let f = fixture(Duration::from_millis(200)).await?;
    f.backend.expire("nobody");

    let (a, b, c) = tokio::join!(
        f.client.get::<Value>("/items/a"),
        f.client.get::<Value>("/items/b"),
        f.client.get::<Value>("/items/c"),
    );

    assert_eq!(f.backend.refresh_calls(), 1);
    assert!(!f.backend.refresh_saw_bearer.load(Ordering::SeqCst));
    for (name, env) in [("a", &a), ("b", &b), ("c", &c)] {
        assert_eq!(env.status_code(), 200, "{name}: {env:?}");
        assert_eq!(env.data(), Some(&json!({"name": name})));
        assert_eq!(f.backend.seen(name), vec![Some("T1".to_owned()), Some("T2".to_owned())]);
    }
    assert_eq!(f.store.current_credential().as_deref(), Some("T2"));
    assert_eq!(f.store.current_refresh_credential().as_deref(), Some("R-next"));
    Ok(())
}

#[tokio::test]
async fn many_spawned_requests_share_one_refresh() -> anyhow::Result<()> {
    let f = fixture(Duration::from_millis(200)).await?;
    f.backend.expire("nobody");

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let client = Arc::clone(&f.client);
            tokio::spawn(async move { client.get::<Value>(&format!("/items/n{i}")).await })
        })
        .collect();
    for h in handles {
        assert_eq!(h.await?.status_code(), 200);
    }
    assert_eq!(f.backend.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn later_requests_use_refreshed_credential() -> anyhow::Result<()> {
    let f = fixture(Duration::ZERO).await?;
    f.backend.expire("nobody");
    assert_eq!(f.client.get::<Value>("/items/a").await.status_code(), 200);

    let env = f.client.get::<Value>("/items/later").await;
    assert_eq!(env.status_code(), 200);
    assert_eq!(f.backend.seen("later"), vec![Some("T2".to_owned())]);
    assert_eq!(f.backend.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn second_expiry_starts_a_new_cycle() -> anyhow::Result<()> {
    let f = fixture(Duration::ZERO).await?;
    f.backend.expire("nobody");
    assert_eq!(f.client.get::<Value>("/items/a").await.status_code(), 200);

    f.backend.expire("nobody");
    assert_eq!(f.client.get::<Value>("/items/a").await.status_code(), 200);
    assert_eq!(f.backend.refresh_calls(), 2);
    assert_eq!(f.store.current_credential().as_deref(), Some("T3"));
    Ok(())
}

// -- Terminal credential failures ---------------------------------------------

#[tokio::test]
async fn failed_refresh_returns_401_and_signals_once() -> anyhow::Result<()> {
    let f = fixture(Duration::ZERO).await?;
    f.backend.reject_refresh.store(true, Ordering::SeqCst);
    f.backend.expire("nobody");
    let mut events = f.session.subscribe();

    let env = f.client.get::<Value>("/items/d").await;

    assert_eq!(env.status_code(), 401);
    assert!(env.data().is_none());
    assert_eq!(f.backend.refresh_calls(), 1);
    assert_eq!(f.backend.seen("d").len(), 1);

    // The session owner has already reacted by the time the call returns.
    assert_eq!(events.try_recv()?, SessionEvent::Lost);
    assert!(events.try_recv().is_err());
    assert!(!f.session.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn concurrent_failures_with_failed_refresh_all_abort() -> anyhow::Result<()> {
    let f = fixture(Duration::from_millis(150)).await?;
    f.backend.reject_refresh.store(true, Ordering::SeqCst);
    f.backend.expire("nobody");
    let mut events = f.session.subscribe();

    let (a, b, c) = tokio::join!(
        f.client.get::<Value>("/items/a"),
        f.client.get::<Value>("/items/b"),
        f.client.get::<Value>("/items/c"),
    );
    for env in [a, b, c] {
        assert_eq!(env.status_code(), 401);
    }
    assert_eq!(f.backend.refresh_calls(), 1);

    assert_eq!(events.try_recv()?, SessionEvent::Lost);
    assert!(events.try_recv().is_err());
    assert!(!f.session.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn rejected_after_replay_is_terminal() -> anyhow::Result<()> {
    let f = fixture(Duration::ZERO).await?;
    let mut events = f.session.subscribe();

    let env = f.client.get::<Value>("/always-expired").await;

    assert_eq!(env.status_code(), 401);
    assert_eq!(env.error_code(), Some("TOKEN_EXPIRED"));
    // One refresh, one replay, no second cycle.
    assert_eq!(f.backend.refresh_calls(), 1);
    assert_eq!(f.backend.seen("always"), vec![Some("T1".to_owned()), Some("T2".to_owned())]);
    assert_eq!(events.try_recv()?, SessionEvent::Lost);
    Ok(())
}

// -- Non-credential failures --------------------------------------------------

#[tokio::test]
async fn forbidden_is_returned_without_refresh() -> anyhow::Result<()> {
    let f = fixture(Duration::ZERO).await?;
    let env = f.client.get::<Value>("/forbidden").await;

    assert_eq!(env.status_code(), 403);
    assert_eq!(env.message(), "forbidden");
    assert_eq!(env.error_code(), Some("FORBIDDEN"));
    assert_eq!(f.backend.refresh_calls(), 0);
    assert!(f.session.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_plain_404() -> anyhow::Result<()> {
    let f = fixture(Duration::ZERO).await?;
    let env = f.client.get::<Value>("/nope").await;
    assert_eq!(env.status_code(), 404);
    assert_eq!(f.backend.refresh_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_is_internal_error() -> anyhow::Result<()> {
    // Bind then drop to get a port nobody listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
    let config =
        ClientConfig { base_url: format!("http://127.0.0.1:{port}"), ..ClientConfig::default() };
    let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("T1", "R1"), None));
    let session = Session::new(Arc::clone(&store) as Arc<dyn CredentialStore>);
    let client = ApiClient::new(&config, store, Arc::clone(session.notifier()))?;

    let env = client.get::<Value>("/items/a").await;
    assert_eq!(env.status_code(), 500);
    assert_eq!(env.error_code(), Some("INTERNAL"));
    assert!(env.data().is_none());
    assert!(session.is_authenticated());
    Ok(())
}
