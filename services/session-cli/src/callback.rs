//! Loopback listener for the identity-provider redirect
//!
//! The provider sends the browser back to `http://<listen_addr>/auth/callback`
//! with the token pair in the query string. The first request carrying the
//! expected `state` nonce is handed to the waiting command; anything else is
//! refused without consuming the slot.

use std::sync::Arc;
use std::time::Duration;

use api_client::CallbackParams;
use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tracing::{info, warn};
use url::Url;

use crate::error::{Error, Result};

pub const CALLBACK_PATH: &str = "/auth/callback";

/// Random, URL-safe `state` nonce binding a callback to this sign-in attempt.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Provider entry URL: `<base_url><provider_path>?redirect_uri=..&state=..`.
pub fn provider_url(base_url: &str, provider_path: &str, redirect_uri: &str, state: &str) -> Result<String> {
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        provider_path.trim_start_matches('/')
    );
    let mut url = Url::parse(&joined).map_err(|e| Error::Usage(format!("invalid provider url {joined}: {e}")))?;
    url.query_pairs_mut()
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("state", state);
    Ok(url.into())
}

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    delivery: Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>,
}

/// Build the callback router and the receiver the accepted callback lands on.
pub fn router(expected_state: &str) -> (Router, oneshot::Receiver<CallbackParams>) {
    let (tx, rx) = oneshot::channel();
    let state = CallbackState {
        expected_state: Arc::from(expected_state),
        delivery: Arc::new(Mutex::new(Some(tx))),
    };
    let router = Router::new()
        .route(CALLBACK_PATH, get(callback_handler))
        .with_state(state);
    (router, rx)
}

async fn callback_handler(State(state): State<CallbackState>, RawQuery(query): RawQuery) -> Response {
    let Some(params) = query.as_deref().and_then(CallbackParams::from_query) else {
        warn!("callback without a token pair");
        return (StatusCode::BAD_REQUEST, "Sign-in failed: missing tokens.").into_response();
    };

    if params.state.as_deref() != Some(state.expected_state.as_ref()) {
        warn!("callback state mismatch, ignoring");
        return (StatusCode::FORBIDDEN, "Sign-in failed: unexpected state.").into_response();
    }

    let Some(sender) = state.delivery.lock().await.take() else {
        return (StatusCode::CONFLICT, "Sign-in already completed.").into_response();
    };
    if sender.send(params).is_err() {
        return (StatusCode::GONE, "Sign-in is no longer waiting.").into_response();
    }

    info!("sign-in callback accepted");
    Html("<p>Signed in. You can close this window and return to the terminal.</p>").into_response()
}

/// Serve the callback route on `listener` until one valid callback arrives
/// or `timeout` elapses.
pub async fn wait_for_callback(listener: TcpListener, expected_state: &str, timeout: Duration) -> Result<CallbackParams> {
    let (app, rx) = router(expected_state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
            warn!(error = %e, "callback listener failed");
        }
    });

    let outcome = tokio::time::timeout(timeout, rx).await;
    let _ = shutdown_tx.send(());
    let _ = server.await;

    match outcome {
        Ok(Ok(params)) => Ok(params),
        Ok(Err(_)) => Err(Error::CallbackAborted),
        Err(_) => Err(Error::CallbackTimeout(timeout.as_secs())),
    }
}
