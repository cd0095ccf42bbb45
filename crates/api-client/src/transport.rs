//! Transport seam
//!
//! The pipeline never talks to reqwest directly. Tests plug in a scripted
//! transport; production uses `ReqwestTransport`.

use std::time::Duration;

use credential_store::BoxFuture;
use reqwest::multipart::{Form, Part};
use tracing::debug;
use url::Url;

use crate::error::{ApiError, Result};
use crate::request::{ApiRequest, ApiResponse, Body, FormPart, PartValue};

/// Sends a prepared request and returns whatever came back, success or not.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    /// Identifier for logging (e.g. "reqwest", "scripted")
    fn id(&self) -> &str;

    /// Perform one HTTP exchange. Only transport-level failures are errors;
    /// HTTP error statuses come back as responses.
    fn send<'a>(&'a self, request: &'a ApiRequest) -> BoxFuture<'a, Result<ApiResponse>>;
}

/// reqwest-backed transport rooted at the API base URL.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// `base_url` is the API prefix, e.g. `http://localhost:4000/api`.
    /// `timeout` of `None` leaves requests unbounded.
    pub fn new(client: reqwest::Client, base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid base url {base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidRequest(format!(
                "base url must be http or https, got: {base_url}"
            )));
        }
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join the request path onto the base URL.
    ///
    /// Absolute URLs are refused so a bearer token can never be sent to a
    /// host other than the configured API. Only the path part is checked; a
    /// URL inside the query string is just data.
    fn url_for(&self, request: &ApiRequest) -> Result<Url> {
        let path = request.path.split(['?', '#']).next().unwrap_or_default();
        if path.contains("://") || path.starts_with("//") {
            return Err(ApiError::InvalidRequest(format!(
                "request path must be relative: {}",
                request.path
            )));
        }
        let joined = format!(
            "{}/{}",
            self.base_url,
            request.path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid request url {joined}: {e}")))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

impl Transport for ReqwestTransport {
    fn id(&self) -> &str {
        "reqwest"
    }

    fn send<'a>(&'a self, request: &'a ApiRequest) -> BoxFuture<'a, Result<ApiResponse>> {
        Box::pin(async move {
            let url = self.url_for(request)?;
            let mut builder = self
                .client
                .request(request.method.clone(), url)
                .headers(request.headers.clone());

            if let Some(timeout) = self.timeout {
                builder = builder.timeout(timeout);
            }

            builder = match &request.body {
                Body::Empty => builder,
                Body::Json(value) => builder.json(value),
                Body::Multipart(parts) => builder.multipart(build_form(parts)?),
            };

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    ApiError::Transport(format!("request timed out: {e}"))
                } else {
                    ApiError::Transport(format!("request failed: {e}"))
                }
            })?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| ApiError::Transport(format!("reading response body: {e}")))?;

            debug!(status = status.as_u16(), bytes = body.len(), "response received");
            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        })
    }
}

fn build_form(parts: &[FormPart]) -> Result<Form> {
    let mut form = Form::new();
    for part in parts {
        form = match &part.value {
            PartValue::Text(text) => form.text(part.name.clone(), text.clone()),
            PartValue::File {
                file_name,
                mime,
                bytes,
            } => {
                let mut file = Part::bytes(bytes.to_vec()).file_name(file_name.clone());
                if let Some(mime) = mime {
                    file = file.mime_str(mime).map_err(|e| {
                        ApiError::InvalidRequest(format!("invalid mime type {mime}: {e}"))
                    })?;
                }
                form.part(part.name.clone(), file)
            }
        };
    }
    Ok(form)
}
