//! Test doubles shared by the pipeline tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use credential_store::{CredentialStore, MemoryStore, StoredSession, TokenPair};
use credential_store::{BoxFuture, KeyValueStore};
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use session::SessionContainer;

use crate::error::Result;
use crate::navigator::Navigator;
use crate::request::{ApiRequest, ApiResponse};
use crate::transport::Transport;

type Responder = dyn Fn(&ApiRequest) -> Result<ApiResponse> + Send + Sync;

/// Transport answering from a closure and recording every request it saw.
pub struct ScriptedTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<ApiRequest>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new(
        responder: impl Fn(&ApiRequest) -> Result<ApiResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    /// Each response is held back for `delay` (virtual time under `start_paused`).
    pub fn delayed(
        delay: Duration,
        responder: impl Fn(&ApiRequest) -> Result<ApiResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    /// Always answers 200 `{}`.
    pub fn ok() -> Arc<Self> {
        Self::new(|_| Ok(json_response(StatusCode::OK, serde_json::json!({}))))
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.path == path).count()
    }
}

impl Transport for ScriptedTransport {
    fn id(&self) -> &str {
        "scripted"
    }

    fn send<'a>(&'a self, request: &'a ApiRequest) -> BoxFuture<'a, Result<ApiResponse>> {
        Box::pin(async move {
            self.requests.lock().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.responder)(request)
        })
    }
}

pub fn json_response(status: StatusCode, body: serde_json::Value) -> ApiResponse {
    ApiResponse {
        status,
        headers: HeaderMap::new(),
        body: Bytes::from(body.to_string()),
    }
}

/// Container over a memory store, optionally signed in with `(access, refresh)`.
pub async fn session_with(tokens: Option<(&str, &str)>) -> Arc<SessionContainer> {
    let store = CredentialStore::new(Arc::new(MemoryStore::new()));
    let container = Arc::new(SessionContainer::new(store));
    if let Some((access, refresh)) = tokens {
        let user = serde_json::from_value(serde_json::json!({ "id": "u1", "role": "user" }))
            .unwrap();
        container
            .set_auth(Some(user), TokenPair::new(access, refresh))
            .await
            .unwrap();
    }
    container
}

/// Memory store whose writes fail once `lock()` was called.
#[derive(Default)]
pub struct LockableStore {
    inner: MemoryStore,
    locked: AtomicBool,
}

impl LockableStore {
    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    fn writable(&self) -> credential_store::Result<()> {
        if self.locked.load(Ordering::SeqCst) {
            return Err(credential_store::Error::Backend("store is locked".into()));
        }
        Ok(())
    }
}

impl KeyValueStore for LockableStore {
    fn id(&self) -> &str {
        "lockable"
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, credential_store::Result<Option<String>>> {
        self.inner.get(key)
    }

    fn get_many<'a>(
        &'a self,
        keys: &'a [&'a str],
    ) -> BoxFuture<'a, credential_store::Result<Vec<Option<String>>>> {
        self.inner.get_many(keys)
    }

    fn set_many<'a>(&'a self, entries: Vec<(String, String)>) -> BoxFuture<'a, credential_store::Result<()>> {
        Box::pin(async move {
            self.writable()?;
            self.inner.set_many(entries).await
        })
    }

    fn remove_many<'a>(&'a self, keys: &'a [&'a str]) -> BoxFuture<'a, credential_store::Result<()>> {
        Box::pin(async move {
            self.writable()?;
            self.inner.remove_many(keys).await
        })
    }
}

/// Restore a session without going through the store, so store and memory
/// can be made to disagree on purpose.
pub async fn restore_only(container: &SessionContainer, access: &str, refresh: &str) {
    container
        .restore(StoredSession {
            tokens: TokenPair::new(access, refresh),
            user: None,
            profile_incomplete: false,
        })
        .await;
}

/// Navigator that records every redirect target.
#[derive(Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
    current: Option<String>,
}

impl RecordingNavigator {
    pub fn at(path: &str) -> Self {
        Self {
            redirects: Mutex::new(Vec::new()),
            current: Some(path.to_string()),
        }
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, target: &str) {
        self.redirects.lock().push(target.to_string());
    }

    fn current_path(&self) -> Option<String> {
        self.current.clone()
    }
}
