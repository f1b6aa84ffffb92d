//! Authentication lifecycle events.
//!
//! The backend client publishes these on a broadcast channel whenever the
//! session changes. The event reconciler consumes them and folds them into
//! the session state store, concurrently with user-initiated flows.

use crate::types::Identity;
use serde::{Deserialize, Serialize};

/// A lifecycle event published by the identity backend client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A session was established.
    SignedIn {
        /// Identity from the event payload, when available.
        #[serde(default)]
        identity: Option<Identity>,
    },
    /// The session was invalidated, locally or backend-side.
    SignedOut,
    /// User attributes changed (informational).
    UserUpdated,
    /// A password recovery flow started (informational at this layer).
    PasswordRecoveryStarted,
    /// The access token was refreshed (informational).
    TokenRefreshed,
    /// A multi-factor challenge was verified (informational).
    ChallengeVerified,
    /// An event kind this client does not understand.
    #[serde(other)]
    Unknown,
}

impl LifecycleEvent {
    /// Parse a wire event name. Unrecognized names map to `Unknown`.
    pub fn from_wire(name: &str) -> Self {
        match name {
            "SIGNED_IN" => LifecycleEvent::SignedIn { identity: None },
            "SIGNED_OUT" => LifecycleEvent::SignedOut,
            "USER_UPDATED" => LifecycleEvent::UserUpdated,
            "PASSWORD_RECOVERY" => LifecycleEvent::PasswordRecoveryStarted,
            "TOKEN_REFRESHED" => LifecycleEvent::TokenRefreshed,
            "MFA_CHALLENGE_VERIFIED" => LifecycleEvent::ChallengeVerified,
            _ => LifecycleEvent::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_wire_known_events() {
        assert_eq!(
            LifecycleEvent::from_wire("SIGNED_IN"),
            LifecycleEvent::SignedIn { identity: None }
        );
        assert_eq!(LifecycleEvent::from_wire("SIGNED_OUT"), LifecycleEvent::SignedOut);
        assert_eq!(LifecycleEvent::from_wire("USER_UPDATED"), LifecycleEvent::UserUpdated);
        assert_eq!(
            LifecycleEvent::from_wire("PASSWORD_RECOVERY"),
            LifecycleEvent::PasswordRecoveryStarted
        );
        assert_eq!(
            LifecycleEvent::from_wire("TOKEN_REFRESHED"),
            LifecycleEvent::TokenRefreshed
        );
        assert_eq!(
            LifecycleEvent::from_wire("MFA_CHALLENGE_VERIFIED"),
            LifecycleEvent::ChallengeVerified
        );
    }

    #[test]
    fn test_from_wire_unknown_event_is_not_an_error() {
        assert_eq!(LifecycleEvent::from_wire("INITIAL_SESSION"), LifecycleEvent::Unknown);
        assert_eq!(LifecycleEvent::from_wire(""), LifecycleEvent::Unknown);
    }
}
