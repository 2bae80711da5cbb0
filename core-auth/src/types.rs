use bridge_traits::{Credentials, SessionToken};
use std::fmt;

/// How the current session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionOrigin {
    /// Resumed from a cached token whose backing credentials were not re-checked
    Token,
    Credentials,
    Anonymous,
}

impl SessionOrigin {
    /// Identifier used in logs and session events
    ///
    /// # Examples
    ///
    /// ```
    /// use core_auth::SessionOrigin;
    ///
    /// assert_eq!(SessionOrigin::Anonymous.as_str(), "anonymous");
    /// ```
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOrigin::Token => "token",
            SessionOrigin::Credentials => "credentials",
            SessionOrigin::Anonymous => "anonymous",
        }
    }

    /// Whether the session is backed by verified credentials.
    ///
    /// Callers that may need to prompt require such a session.
    pub fn is_verified(&self) -> bool {
        matches!(self, SessionOrigin::Credentials)
    }
}

impl fmt::Display for SessionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Steps of one connect attempt.
///
/// Transitions:
///
/// | From | Outcome | To |
/// |------|---------|----|
/// | `NotConnected` | connected, usable | `Connected` |
/// | `NotConnected` | connected, interactive caller needs verified session | `CredentialLogin` |
/// | `NotConnected` | not connected | `TokenLogin` |
/// | `TokenLogin` | ok | `Connected` |
/// | `TokenLogin` | no token or refused | `CredentialLogin` |
/// | `CredentialLogin` | ok | `Connected` |
/// | `CredentialLogin` | skipped or refused | `AnonymousLogin` |
/// | `AnonymousLogin` | ok | `Connected` |
/// | `AnonymousLogin` | skipped or refused, interactive | `InteractiveLogin` |
/// | `InteractiveLogin` | new credentials | `TokenLogin` |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectState {
    NotConnected,
    TokenLogin,
    CredentialLogin,
    AnonymousLogin,
    InteractiveLogin,
    Connected(SessionOrigin),
}

/// Authentication material and connection status owned by the session manager.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub credentials: Option<Credentials>,
    pub token: Option<SessionToken>,
    /// The token was issued for credentials checked in this process
    pub token_verified: bool,
    /// Set once the user chose anonymous access; credential login is skipped
    pub anonymous: bool,
    /// `Some` while connected
    pub origin: Option<SessionOrigin>,
}

impl AuthState {
    pub fn is_connected(&self) -> bool {
        self.origin.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_credentials_are_verified() {
        assert!(SessionOrigin::Credentials.is_verified());
        assert!(!SessionOrigin::Token.is_verified());
        assert!(!SessionOrigin::Anonymous.is_verified());
    }

    #[test]
    fn test_default_state_is_disconnected() {
        let state = AuthState::default();
        assert!(!state.is_connected());
        assert!(state.credentials.is_none());
        assert!(state.token.is_none());
        assert!(!state.anonymous);
    }
}
