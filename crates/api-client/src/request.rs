//! Request and response values passed between pipeline stages

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ApiError, Result};

/// One field of a multipart upload.
#[derive(Debug, Clone)]
pub struct FormPart {
    pub name: String,
    pub value: PartValue,
}

#[derive(Debug, Clone)]
pub enum PartValue {
    Text(String),
    File {
        file_name: String,
        mime: Option<String>,
        bytes: Bytes,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: PartValue::Text(value.into()),
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<&str>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            value: PartValue::File {
                file_name: file_name.into(),
                mime: mime.map(str::to_owned),
                bytes: bytes.into(),
            },
        }
    }
}

/// Outgoing payload.
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    Json(serde_json::Value),
    /// Content type (with boundary) is chosen by the transport
    Multipart(Vec<FormPart>),
}

/// An API call, relative to the configured base URL.
///
/// Cloneable so the refresh protocol can replay it.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Body,
    /// Set once the refresh protocol has replayed this request
    pub retried: bool,
    /// Attach the session token and take part in the refresh protocol
    pub authenticate: bool,
    pub request_id: String,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: Body::Empty,
            retried: false,
            authenticate: true,
            request_id: format!("req_{}", uuid::Uuid::new_v4().as_simple()),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("serializing body: {e}")))?;
        self.body = Body::Json(value);
        Ok(self)
    }

    pub fn json_value(mut self, body: serde_json::Value) -> Self {
        self.body = Body::Json(body);
        self
    }

    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = Body::Multipart(parts);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Use an explicit bearer token instead of the session's.
    pub fn bearer(mut self, token: &str) -> Result<Self> {
        set_bearer(&mut self.headers, token)?;
        Ok(self)
    }

    /// Send without session credentials and skip the refresh protocol.
    pub fn anonymous(mut self) -> Self {
        self.authenticate = false;
        self
    }

    /// Token carried in the Authorization header, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// Insert or replace `Authorization: Bearer <token>`.
pub(crate) fn set_bearer(headers: &mut HeaderMap, token: &str) -> Result<()> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| ApiError::InvalidRequest(format!("invalid token value: {e}")))?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(())
}

/// Response as received from the transport.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Standard success envelope: `{ "data": ... }`.
#[derive(Debug, serde::Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::Decode(format!("status {}: {e}", self.status)))
    }

    /// Decode the `data` member of the standard envelope.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T> {
        self.json::<Envelope<T>>().map(|envelope| envelope.data)
    }

    /// Server-provided error text: `message`, `error` or `error.message`.
    pub fn error_message(&self) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(&self.body).ok()?;
        let text = value
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| value.get("error").and_then(|e| e.as_str()))
            .or_else(|| {
                value
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
            })?;
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn builder_defaults() {
        let request = ApiRequest::get("/trips").query("page", "2");
        assert_eq!(request.method, Method::GET);
        assert!(request.authenticate);
        assert!(!request.retried);
        assert!(request.request_id.starts_with("req_"));
        assert_eq!(request.query, vec![("page".to_string(), "2".to_string())]);
        assert!(request.bearer_token().is_none());
    }

    #[test]
    fn explicit_bearer_is_readable_back() {
        let request = ApiRequest::get("/auth/me").bearer("at_cb").unwrap();
        assert_eq!(request.bearer_token(), Some("at_cb"));
        assert!(request.headers[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn bearer_rejects_header_injection() {
        assert!(ApiRequest::get("/x").bearer("at\r\nX-Evil: 1").is_err());
    }

    #[test]
    fn envelope_data_is_unwrapped() {
        let resp = response(200, r#"{"data":{"accessToken":"a","refreshToken":"r"}}"#);
        let value: serde_json::Value = resp.data().unwrap();
        assert_eq!(value["accessToken"], "a");
    }

    #[test]
    fn missing_envelope_is_a_decode_error() {
        let resp = response(200, r#"{"accessToken":"a"}"#);
        let result: Result<serde_json::Value> = resp.data();
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[test]
    fn error_message_shapes() {
        assert_eq!(
            response(400, r#"{"message":"Coupon expired"}"#).error_message(),
            Some("Coupon expired".into())
        );
        assert_eq!(
            response(401, r#"{"error":"jwt expired"}"#).error_message(),
            Some("jwt expired".into())
        );
        assert_eq!(
            response(500, r#"{"error":{"message":"db down"}}"#).error_message(),
            Some("db down".into())
        );
        assert_eq!(response(502, "<html>bad gateway</html>").error_message(), None);
    }
}
