//! Core data model for authentication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The user-facing identity record returned alongside a session.
///
/// Immutable value; replaced wholesale on each successful auth step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque user ID.
    pub id: String,
    /// User email, when the backend knows one.
    #[serde(default)]
    pub email: Option<String>,
    /// Account creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A backend-issued proof of authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer credential for API calls.
    pub access_token: String,
    /// Credential used to mint a fresh access token.
    pub refresh_token: String,
    /// Absolute expiry time of the access token.
    pub expires_at: DateTime<Utc>,
    /// Identity the session was issued for.
    pub identity: Identity,
}

impl Session {
    /// Returns true once the access token has passed its expiry time.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Purpose of a one-time code.
///
/// The backend treats the two code types as distinct; a code requested for
/// one purpose never verifies under the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePurpose {
    /// Code sent to prove control of an email during registration.
    Registration,
    /// Code sent to recover access to an existing account.
    Recovery,
}

impl CodePurpose {
    /// Wire name of the verification type on the backend.
    pub fn as_wire_type(&self) -> &'static str {
        match self {
            CodePurpose::Registration => "email",
            CodePurpose::Recovery => "recovery",
        }
    }
}

/// Result of an administrative account deletion.
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedAccount {
    /// ID of the deleted user.
    #[serde(rename = "deleted_user_id")]
    pub user_id: String,
    /// Email of the deleted user, if known.
    #[serde(rename = "deleted_user_email", default)]
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn identity() -> Identity {
        Identity {
            id: "user-1".to_string(),
            email: Some("survivor@wastelord.app".to_string()),
            created_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_session_not_expired_in_the_future() {
        let session = Session {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
            identity: identity(),
        };
        assert!(!session.is_expired());
    }

    #[test]
    fn test_session_expired_in_the_past() {
        let session = Session {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            expires_at: Utc::now() - Duration::seconds(1),
            identity: identity(),
        };
        assert!(session.is_expired());
    }

    #[test]
    fn test_code_purpose_wire_types_are_distinct() {
        assert_eq!(CodePurpose::Registration.as_wire_type(), "email");
        assert_eq!(CodePurpose::Recovery.as_wire_type(), "recovery");
        assert_ne!(
            CodePurpose::Registration.as_wire_type(),
            CodePurpose::Recovery.as_wire_type()
        );
    }

    #[test]
    fn test_deleted_account_deserialization() {
        let json = r#"{
            "success": true,
            "message": "account deleted",
            "deleted_user_id": "user-9",
            "deleted_user_email": "gone@wastelord.app"
        }"#;
        let deleted: DeletedAccount = serde_json::from_str(json).unwrap();
        assert_eq!(deleted.user_id, "user-9");
        assert_eq!(deleted.email.as_deref(), Some("gone@wastelord.app"));
    }
}
