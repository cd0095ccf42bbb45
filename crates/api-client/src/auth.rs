//! Authentication endpoints
//!
//! Sign-in flows publish `Authenticating` before the call and either
//! `set_auth` or `fail_authentication` after it. Login, registration and
//! refresh are sent anonymously so a 401 there is a plain failure, never a
//! trigger for the refresh protocol.

use std::sync::Arc;

use common::Secret;
use credential_store::{TokenPair, UserProfile};
use serde::{Deserialize, Serialize};
use session::{COMPLETE_PROFILE_PATH, landing_page, safe_redirect};
use tracing::{info, warn};
use url::form_urlencoded;

use crate::dispatcher::Dispatcher;
use crate::error::{ApiError, Result};
use crate::interceptor::SessionClient;
use crate::request::ApiRequest;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const PROFILE_PATH: &str = "/auth/me";
pub const COMPLETE_PROFILE_API_PATH: &str = "/auth/complete-profile";
pub const LOGOUT_PATH: &str = "/auth/logout";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

/// Exchange a refresh token for a new pair.
///
/// Sent without credentials and outside the refresh protocol.
pub async fn refresh_tokens(dispatcher: &Dispatcher, refresh_token: &Secret<String>) -> Result<TokenPair> {
    let request = ApiRequest::post(REFRESH_PATH).anonymous().json(&RefreshBody {
        refresh_token: refresh_token.expose(),
    })?;
    let tokens: TokenPair = dispatcher.send(request).await?.data()?;
    if !tokens.is_complete() {
        return Err(ApiError::Decode("refresh response is missing a token".into()));
    }
    Ok(tokens)
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

/// Registration form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: Secret<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Fields collected on the profile-completion screen.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCompletion {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Deserialize)]
struct AuthPayload {
    user: UserProfile,
    #[serde(flatten)]
    tokens: TokenPair,
}

/// Result of a successful sign-in.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedIn {
    pub user: UserProfile,
    /// Where to navigate next
    pub landing: String,
}

/// Query parameters delivered by the identity provider redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
    pub complete_profile: bool,
    pub state: Option<String>,
}

impl CallbackParams {
    /// Parse a raw query string (leading `?` optional).
    ///
    /// `None` unless both tokens are present and non-empty.
    pub fn from_query(query: &str) -> Option<Self> {
        let mut access = None;
        let mut refresh = None;
        let mut complete_profile = false;
        let mut state = None;
        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "accessToken" => access = Some(value.into_owned()),
                "refreshToken" => refresh = Some(value.into_owned()),
                "completeProfile" => complete_profile = matches!(value.as_ref(), "true" | "1"),
                "state" => state = Some(value.into_owned()),
                _ => {}
            }
        }
        let tokens = TokenPair::new(access?, refresh?);
        if !tokens.is_complete() {
            return None;
        }
        Some(Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            complete_profile,
            state,
        })
    }
}

/// Authentication operations bound to a session.
#[derive(Clone)]
pub struct AuthApi {
    client: Arc<SessionClient>,
}

impl AuthApi {
    pub fn new(client: Arc<SessionClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<SessionClient> {
        &self.client
    }

    /// Sign in with email and password. `return_to` is honoured only when
    /// it is a safe relative path.
    pub async fn login(&self, email: &str, password: &Secret<String>, return_to: Option<&str>) -> Result<SignedIn> {
        let request = ApiRequest::post(LOGIN_PATH).anonymous().json(&LoginBody {
            email,
            password: password.expose(),
        })?;
        self.sign_in(request, return_to).await
    }

    pub async fn register(&self, form: &RegisterRequest, return_to: Option<&str>) -> Result<SignedIn> {
        let request = ApiRequest::post(REGISTER_PATH).anonymous().json(form)?;
        self.sign_in(request, return_to).await
    }

    async fn sign_in(&self, request: ApiRequest, return_to: Option<&str>) -> Result<SignedIn> {
        let session = self.client.session();
        session.begin_authentication().await;

        let payload = match self.client.execute(request).await.and_then(|r| r.data::<AuthPayload>()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "sign-in failed");
                session.fail_authentication(e.user_message()).await;
                return Err(e);
            }
        };

        let user = payload.user;
        if let Err(e) = session.set_auth(Some(user.clone()), payload.tokens).await {
            session.fail_authentication("Could not save your session.").await;
            return Err(e.into());
        }

        let landing = safe_redirect(return_to, landing_page(Some(&user))).to_string();
        info!(user_id = %user.id, role = %user.role, "signed in");
        Ok(SignedIn { user, landing })
    }

    /// Fetch the current user and refresh the cached copy.
    pub async fn fetch_profile(&self) -> Result<UserProfile> {
        let session = self.client.session();
        if !session.is_authenticated() {
            return Err(ApiError::NotAuthenticated);
        }
        let user: UserProfile = self.client.execute(ApiRequest::get(PROFILE_PATH)).await?.data()?;
        session.update_user(user.clone()).await?;
        Ok(user)
    }

    /// Submit the profile-completion form.
    pub async fn complete_profile(&self, form: &ProfileCompletion) -> Result<UserProfile> {
        let session = self.client.session();
        if !session.is_authenticated() {
            return Err(ApiError::NotAuthenticated);
        }
        session.set_loading(true);
        let request = ApiRequest::put(COMPLETE_PROFILE_API_PATH).json(form)?;
        let user = match self.client.execute(request).await.and_then(|r| r.data::<UserProfile>()) {
            Ok(user) => user,
            Err(e) => {
                session.set_loading(false);
                session.set_error(e.user_message());
                return Err(e);
            }
        };
        if let Err(e) = session.complete_profile(user.clone()).await {
            session.set_loading(false);
            session.set_error("Could not save your profile.");
            return Err(e.into());
        }
        Ok(user)
    }

    /// End the session. The server call is best effort; local credentials
    /// are always cleared.
    pub async fn logout(&self) -> Result<()> {
        let session = self.client.session();
        if session.is_authenticated() {
            if let Err(e) = self.client.dispatcher().send(ApiRequest::post(LOGOUT_PATH)).await {
                warn!(error = %e, "server logout failed, clearing local session anyway");
            }
        }
        session.clear_auth().await?;
        info!("signed out");
        Ok(())
    }

    /// Finish an identity-provider sign-in and return the next route.
    pub async fn handle_callback(&self, params: CallbackParams) -> Result<String> {
        let session = self.client.session();
        session.begin_authentication().await;

        // Only the callback token may be used here, not a stale session one
        let request = ApiRequest::get(PROFILE_PATH).bearer(params.access_token.expose())?;
        let user = match self.client.dispatcher().send(request).await.and_then(|r| r.data::<UserProfile>()) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "identity provider callback rejected");
                session.fail_authentication(e.user_message()).await;
                return Err(e);
            }
        };

        let tokens = TokenPair {
            access_token: params.access_token,
            refresh_token: params.refresh_token,
        };
        if let Err(e) = session.set_auth(Some(user.clone()), tokens).await {
            session.fail_authentication("Could not save your session.").await;
            return Err(e.into());
        }

        info!(user_id = %user.id, complete_profile = params.complete_profile, "provider sign-in complete");
        if params.complete_profile {
            session.mark_profile_incomplete().await?;
            return Ok(COMPLETE_PROFILE_PATH.to_string());
        }
        Ok(landing_page(Some(&user)).to_string())
    }
}
