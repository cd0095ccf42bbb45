//! Request dispatcher
//!
//! Attaches credentials, fixes up content types and sends exactly once.
//! It never retries and only reads response bodies to build error values.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use session::SessionContainer;
use tracing::{Span, debug, instrument, warn};

use crate::error::{ApiError, Result};
use crate::request::{ApiRequest, ApiResponse, Body, set_bearer};
use crate::transport::Transport;

#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    session: Arc<SessionContainer>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<SessionContainer>) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &Arc<SessionContainer> {
        &self.session
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Augment `request` for sending.
    ///
    /// The session bearer is read at call time and only attached when the
    /// request opted in and carries no explicit Authorization header.
    pub fn prepare(&self, request: &mut ApiRequest) -> Result<()> {
        if request.authenticate && !request.headers.contains_key(AUTHORIZATION) {
            if let Some(token) = self.session.access_token() {
                set_bearer(&mut request.headers, token.expose())?;
            }
        }

        match request.body {
            Body::Json(_) => {
                request
                    .headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            Body::Multipart(_) => {
                // The transport supplies multipart/form-data with its boundary
                if request.headers.remove(CONTENT_TYPE).is_some() {
                    debug!("dropped explicit content type on multipart body");
                }
            }
            Body::Empty => {}
        }
        Ok(())
    }

    /// Send `request` once. Non-2xx responses become `ApiError::Status`.
    #[instrument(
        skip_all,
        fields(request_id = %request.request_id, method = %request.method, path = %request.path, status)
    )]
    pub async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(transport = self.transport.id(), error = %e, "request did not complete");
                return Err(e);
            }
        };
        Span::current().record("status", response.status.as_u16());

        if response.is_success() {
            debug!("request succeeded");
            return Ok(response);
        }

        let status = response.status.as_u16();
        let message = response.error_message().unwrap_or_default();
        debug!(status, "request failed");
        Err(ApiError::Status { status, message })
    }

    /// `prepare` followed by `dispatch`.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        self.prepare(&mut request)?;
        self.dispatch(&request).await
    }
}
