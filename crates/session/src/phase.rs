//! Auth phase state machine
//!
//! Pure state machine: receives events, returns the next phase. The session
//! container performs the storage I/O around each transition.

/// Where the user is in the authentication lifecycle.
///
/// Transitions:
/// - Unauthenticated / Error → Authenticating (login/register/identity-provider submit)
/// - Authenticating → Authenticated (success)
/// - Authenticating → AuthenticatedIncomplete (provider reports missing profile fields)
/// - Authenticating → Error (failure; functionally unauthenticated, keeps the message)
/// - Authenticated → AuthenticatedIncomplete (provider reports missing profile fields)
/// - AuthenticatedIncomplete → Authenticated (profile completed)
/// - any → Unauthenticated (logout, irrecoverable refresh failure)
/// - Unauthenticated → Authenticated / AuthenticatedIncomplete (restored at startup)
///
/// A submit while signed in keeps the signed-in phase: the live session
/// stays in force until the new sign-in succeeds, so a failed attempt only
/// surfaces its message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthPhase {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
    AuthenticatedIncomplete,
    Error {
        message: String,
    },
}

impl AuthPhase {
    /// Phase label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            AuthPhase::Unauthenticated => "unauthenticated",
            AuthPhase::Authenticating => "authenticating",
            AuthPhase::Authenticated => "authenticated",
            AuthPhase::AuthenticatedIncomplete => "authenticated_incomplete",
            AuthPhase::Error { .. } => "error",
        }
    }

    /// Whether this phase holds a live session.
    pub fn is_signed_in(&self) -> bool {
        matches!(
            self,
            AuthPhase::Authenticated | AuthPhase::AuthenticatedIncomplete
        )
    }
}

/// Events that drive phase transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Login, registration or identity-provider flow started
    Submit,
    /// Server confirmed the identity and issued tokens
    Succeeded,
    /// Authentication attempt rejected
    Failed(String),
    /// Identity provider flagged the profile as incomplete
    ProfileIncomplete,
    /// Profile completion accepted by the server
    ProfileCompleted,
    /// Explicit logout
    LoggedOut,
    /// Refresh failed irrecoverably
    SessionExpired,
    /// Stored credentials restored during hydration
    Restored { incomplete: bool },
    /// User dismissed the last error
    ErrorDismissed,
}

/// Compute the next phase. Pure function: no I/O.
///
/// Unlisted combinations leave the phase unchanged.
pub fn handle_event(phase: AuthPhase, event: AuthEvent) -> AuthPhase {
    match (phase, event) {
        // --- Leaving the session ---
        (_, AuthEvent::LoggedOut) | (_, AuthEvent::SessionExpired) => AuthPhase::Unauthenticated,

        // --- Submitting credentials ---
        (
            AuthPhase::Unauthenticated | AuthPhase::Authenticating | AuthPhase::Error { .. },
            AuthEvent::Submit,
        ) => AuthPhase::Authenticating,

        // --- Outcome of a submit ---
        (_, AuthEvent::Succeeded) => AuthPhase::Authenticated,
        (AuthPhase::Authenticating, AuthEvent::Failed(message)) => AuthPhase::Error { message },

        // --- Profile completion ---
        (AuthPhase::Authenticating, AuthEvent::ProfileIncomplete)
        | (AuthPhase::Authenticated, AuthEvent::ProfileIncomplete) => {
            AuthPhase::AuthenticatedIncomplete
        }
        (AuthPhase::AuthenticatedIncomplete, AuthEvent::ProfileCompleted) => {
            AuthPhase::Authenticated
        }

        // --- Startup restore ---
        (AuthPhase::Unauthenticated, AuthEvent::Restored { incomplete: false }) => {
            AuthPhase::Authenticated
        }
        (AuthPhase::Unauthenticated, AuthEvent::Restored { incomplete: true }) => {
            AuthPhase::AuthenticatedIncomplete
        }

        // --- Error acknowledgement ---
        (AuthPhase::Error { .. }, AuthEvent::ErrorDismissed) => AuthPhase::Unauthenticated,

        (phase, _) => phase,
    }
}
