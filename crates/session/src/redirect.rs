//! Navigation targets and open-redirect protection
//!
//! The `redirect` query parameter carried to the login page is attacker
//! controllable. Only same-origin relative paths survive; anything else
//! falls back to a fixed landing page.

use credential_store::UserProfile;
use url::form_urlencoded;

pub const LOGIN_PATH: &str = "/login";
pub const DEFAULT_LANDING: &str = "/";
pub const ADMIN_LANDING: &str = "/admin";
pub const COMPLETE_PROFILE_PATH: &str = "/complete-profile";

/// Return `candidate` if it is a same-origin relative path, else `fallback`.
///
/// Accepted: exactly one leading `/`, no backslashes, no control characters.
/// Rejected: `//evil.com`, `https://evil.com`, `/\evil.com`, `bookings`.
pub fn safe_redirect<'a>(candidate: Option<&'a str>, fallback: &'a str) -> &'a str {
    match candidate {
        Some(path) if is_relative_path(path) => path,
        _ => fallback,
    }
}

fn is_relative_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && !path.chars().any(char::is_control)
}

/// Login entry point, carrying `return_to` when it is safe to come back to.
pub fn login_url(return_to: Option<&str>) -> String {
    match return_to.filter(|p| is_relative_path(p)) {
        Some(path) => {
            let encoded: String = form_urlencoded::byte_serialize(path.as_bytes()).collect();
            format!("{LOGIN_PATH}?redirect={encoded}")
        }
        None => LOGIN_PATH.to_string(),
    }
}

/// Extract the `redirect` parameter from a raw query string (without `?`).
pub fn redirect_param(query: &str) -> Option<String> {
    form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .find(|(key, _)| key == "redirect")
        .map(|(_, value)| value.into_owned())
}

/// Where a freshly signed-in user lands when no redirect applies.
pub fn landing_page(user: Option<&UserProfile>) -> &'static str {
    match user {
        Some(user) if user.is_admin() => ADMIN_LANDING,
        _ => DEFAULT_LANDING,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(role: &str) -> UserProfile {
        serde_json::from_value(serde_json::json!({ "id": "u", "role": role })).unwrap()
    }

    #[test]
    fn protocol_relative_is_rejected() {
        assert_eq!(safe_redirect(Some("//evil.com"), DEFAULT_LANDING), "/");
    }

    #[test]
    fn relative_path_is_kept() {
        assert_eq!(safe_redirect(Some("/bookings"), DEFAULT_LANDING), "/bookings");
        assert_eq!(
            safe_redirect(Some("/trips/42?tab=reviews"), DEFAULT_LANDING),
            "/trips/42?tab=reviews"
        );
    }

    #[test]
    fn other_unsafe_values_fall_back() {
        for bad in [
            "https://evil.com",
            "evil.com",
            "/\\evil.com",
            "/bookings\n",
            "",
            "///evil.com",
        ] {
            assert_eq!(safe_redirect(Some(bad), "/"), "/", "accepted {bad:?}");
        }
        assert_eq!(safe_redirect(None, "/admin"), "/admin");
    }

    #[test]
    fn login_url_round_trips_redirect() {
        let url = login_url(Some("/bookings?page=2"));
        assert_eq!(url, "/login?redirect=%2Fbookings%3Fpage%3D2");

        let query = url.split_once('?').unwrap().1;
        assert_eq!(redirect_param(query).as_deref(), Some("/bookings?page=2"));
    }

    #[test]
    fn login_url_drops_unsafe_redirect() {
        assert_eq!(login_url(Some("//evil.com")), "/login");
        assert_eq!(login_url(None), "/login");
    }

    #[test]
    fn decoded_redirect_is_still_validated() {
        let target = redirect_param("redirect=%2F%2Fevil.com");
        assert_eq!(target.as_deref(), Some("//evil.com"));
        assert_eq!(safe_redirect(target.as_deref(), DEFAULT_LANDING), "/");
    }

    #[test]
    fn landing_depends_on_role() {
        assert_eq!(landing_page(Some(&profile("admin"))), "/admin");
        assert_eq!(landing_page(Some(&profile("user"))), "/");
        assert_eq!(landing_page(None), "/");
    }
}
