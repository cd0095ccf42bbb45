//! HTTP client side of the tourism session manager
//!
//! Every outbound call flows through typed stages:
//! attach credentials → dispatch → classify failure → refresh or propagate.
//!
//! - `Dispatcher` attaches the bearer token and normalizes content types,
//!   then sends exactly once through a `Transport`.
//! - `SessionClient` wraps the dispatcher with the refresh protocol: on a
//!   401 it refreshes (coalesced across concurrent failures), replays the
//!   request once, and forces a logout through the `Navigator` when the
//!   session cannot be recovered.
//! - `AuthApi` implements the authentication endpoints on top of both.
//!
//! The `Transport` seam keeps the whole pipeline testable without network
//! I/O; `ReqwestTransport` is the production implementation.

pub mod auth;
pub mod dispatcher;
pub mod error;
pub mod interceptor;
pub mod metrics;
pub mod navigator;
pub mod request;
pub mod transport;

#[cfg(test)]
mod testing;

pub use auth::{
    AuthApi, CallbackParams, ProfileCompletion, RegisterRequest, SignedIn, refresh_tokens,
};
pub use dispatcher::Dispatcher;
pub use error::{ApiError, FailureKind, Result};
pub use interceptor::SessionClient;
pub use navigator::Navigator;
pub use request::{ApiRequest, ApiResponse, Body, Envelope, FormPart, PartValue};
pub use transport::{ReqwestTransport, Transport};
