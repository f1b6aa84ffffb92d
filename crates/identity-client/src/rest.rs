//! HTTP client for the identity backend's REST API.
//!
//! Covers the auth endpoints (one-time codes, password and federated
//! sign-in, password update, sign-out, token refresh) and the account
//! deletion edge function. The client caches the active session in memory
//! and publishes lifecycle events on a broadcast channel as its own
//! operations change that session.

use crate::backend::IdentityBackend;
use crate::error::{IdentityError, IdentityResult};
use crate::events::LifecycleEvent;
use crate::types::{CodePurpose, DeletedAccount, Identity, Session};
use chrono::{DateTime, Duration, Utc};
use client_config::Config;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capacity of the lifecycle event channel.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Session payload returned by the token and verify endpoints.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: WireUser,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl From<WireUser> for Identity {
    fn from(user: WireUser) -> Self {
        Identity {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// HTTP implementation of [`IdentityBackend`].
pub struct IdentityApiClient {
    http_client: reqwest::Client,
    api_url: String,
    publishable_key: String,
    session: Mutex<Option<Session>>,
    event_tx: broadcast::Sender<LifecycleEvent>,
}

impl IdentityApiClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `api_url` - The backend project URL (e.g., `https://identity.wastelord.app`)
    /// * `publishable_key` - The publishable API key sent with every request
    pub fn new(api_url: impl Into<String>, publishable_key: impl Into<String>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            publishable_key: publishable_key.into(),
            session: Mutex::new(None),
            event_tx,
        }
    }

    /// Create a client from the application configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.identity_api_url.clone(),
            config.identity_publishable_key.clone(),
        )
    }

    /// Build the URL for an auth endpoint.
    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.api_url, path)
    }

    /// Build the URL for an edge function.
    fn functions_url(&self, name: &str) -> String {
        format!("{}/functions/v1/{}", self.api_url, name)
    }

    /// Publish a lifecycle event. Dropped silently when nobody listens.
    fn emit(&self, event: LifecycleEvent) {
        let _ = self.event_tx.send(event);
    }

    fn store_session(&self, session: Session) {
        *self.session.lock().unwrap() = Some(session);
    }

    fn take_session(&self) -> Option<Session> {
        self.session.lock().unwrap().take()
    }

    fn cached_access_token(&self) -> Option<String> {
        self.session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    fn session_from_response(data: TokenResponse) -> Session {
        let expires_at = Utc::now() + Duration::seconds(data.expires_in);
        Session {
            access_token: data.access_token,
            refresh_token: data.refresh_token,
            expires_at,
            identity: data.user.into(),
        }
    }

    /// Refresh the cached session with the refresh-token grant.
    ///
    /// Replaces the cached session and publishes `TokenRefreshed` on success.
    pub async fn refresh_session(&self) -> IdentityResult<Session> {
        let refresh_token = self
            .session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or(IdentityError::NotSignedIn)?;

        let url = format!("{}?grant_type=refresh_token", self.auth_url("token"));
        debug!(url = %url, "Refreshing session");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let data: TokenResponse = check_status(response).await?.json().await?;
        let session = Self::session_from_response(data);
        self.store_session(session.clone());
        self.emit(LifecycleEvent::TokenRefreshed);

        info!(user_id = %session.identity.id, "Session refreshed");
        Ok(session)
    }
}

impl IdentityBackend for IdentityApiClient {
    async fn request_code(
        &self,
        email: &str,
        purpose: CodePurpose,
        allow_create: bool,
    ) -> IdentityResult<()> {
        // Registration and recovery codes are minted by different endpoints;
        // the recovery endpoint never creates accounts.
        let (url, body) = match purpose {
            CodePurpose::Registration => (
                self.auth_url("otp"),
                serde_json::json!({ "email": email, "create_user": allow_create }),
            ),
            CodePurpose::Recovery => {
                (self.auth_url("recover"), serde_json::json!({ "email": email }))
            }
        };

        debug!(url = %url, purpose = ?purpose, "Requesting one-time code");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .json(&body)
            .send()
            .await?;

        check_status(response).await?;
        info!(purpose = ?purpose, "One-time code requested");
        Ok(())
    }

    async fn verify_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> IdentityResult<Session> {
        let url = self.auth_url("verify");
        debug!(url = %url, purpose = ?purpose, "Verifying one-time code");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .json(&serde_json::json!({
                "email": email,
                "token": code,
                "type": purpose.as_wire_type(),
            }))
            .send()
            .await?;

        let data: TokenResponse = check_status(response).await?.json().await?;
        let session = Self::session_from_response(data);
        self.store_session(session.clone());

        if purpose == CodePurpose::Recovery {
            self.emit(LifecycleEvent::PasswordRecoveryStarted);
        }
        self.emit(LifecycleEvent::SignedIn {
            identity: Some(session.identity.clone()),
        });

        info!(user_id = %session.identity.id, purpose = ?purpose, "One-time code verified");
        Ok(session)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> IdentityResult<Session> {
        let url = format!("{}?grant_type=password", self.auth_url("token"));
        debug!(url = %url, "Signing in with password");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let data: TokenResponse = check_status(response).await?.json().await?;
        let session = Self::session_from_response(data);
        self.store_session(session.clone());
        self.emit(LifecycleEvent::SignedIn {
            identity: Some(session.identity.clone()),
        });

        info!(user_id = %session.identity.id, "Signed in with password");
        Ok(session)
    }

    async fn sign_in_with_id_token(&self, provider: &str, token: &str) -> IdentityResult<Session> {
        let url = format!("{}?grant_type=id_token", self.auth_url("token"));
        debug!(url = %url, provider = %provider, "Exchanging federated identity token");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .json(&serde_json::json!({ "provider": provider, "id_token": token }))
            .send()
            .await?;

        let data: TokenResponse = check_status(response).await?.json().await?;
        let session = Self::session_from_response(data);
        self.store_session(session.clone());
        self.emit(LifecycleEvent::SignedIn {
            identity: Some(session.identity.clone()),
        });

        info!(user_id = %session.identity.id, provider = %provider, "Federated sign-in complete");
        Ok(session)
    }

    async fn update_password(&self, new_password: &str) -> IdentityResult<Identity> {
        let access_token = self.cached_access_token().ok_or(IdentityError::NotSignedIn)?;

        let url = self.auth_url("user");
        debug!(url = %url, "Updating password");

        let response = self
            .http_client
            .put(&url)
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&serde_json::json!({ "password": new_password }))
            .send()
            .await?;

        let user: WireUser = check_status(response).await?.json().await?;
        let identity: Identity = user.into();

        if let Some(session) = self.session.lock().unwrap().as_mut() {
            session.identity = identity.clone();
        }
        self.emit(LifecycleEvent::UserUpdated);

        info!(user_id = %identity.id, "Password updated");
        Ok(identity)
    }

    async fn sign_out(&self) -> IdentityResult<()> {
        // The local session is dropped no matter what the backend says;
        // the revocation call itself is best-effort from the client's view.
        let session = self.take_session();
        self.emit(LifecycleEvent::SignedOut);

        let Some(session) = session else {
            debug!("Sign-out with no cached session");
            return Ok(());
        };

        let url = self.auth_url("logout");
        debug!(url = %url, "Signing out");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await?;

        check_status(response).await?;
        info!("Signed out");
        Ok(())
    }

    async fn current_session(&self) -> IdentityResult<Option<Session>> {
        Ok(self.session.lock().unwrap().clone())
    }

    async fn delete_account(&self, access_token: &str) -> IdentityResult<DeletedAccount> {
        let url = self.functions_url("delete-account");
        debug!(url = %url, "Requesting account deletion");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        let deleted: DeletedAccount = check_status(response).await?.json().await?;

        // The account no longer exists; the session is void.
        self.take_session();
        self.emit(LifecycleEvent::SignedOut);

        info!(user_id = %deleted.user_id, "Account deleted");
        Ok(deleted)
    }

    fn lifecycle_events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.event_tx.subscribe()
    }
}

/// Map a non-success response to a typed error, passing success through.
async fn check_status(response: reqwest::Response) -> IdentityResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body);
    warn!(status = %status, message = %message, "Backend request failed");
    Err(error_for_status(status, message))
}

fn error_for_status(status: StatusCode, message: String) -> IdentityError {
    if status == StatusCode::UNAUTHORIZED {
        IdentityError::Unauthorized(message)
    } else if status.is_server_error() {
        IdentityError::Server(format!("HTTP {}: {}", status.as_u16(), message))
    } else {
        IdentityError::ValidationRejected(message)
    }
}

/// Pull the human-readable message out of a backend error body.
///
/// The backend reports errors as JSON with either a `msg`,
/// `error_description` or `message` field; anything else is passed through
/// verbatim.
fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["msg", "error_description", "message", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    body.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_trims_trailing_slash() {
        let client = IdentityApiClient::new("https://identity.test.app/", "key");
        assert_eq!(client.api_url, "https://identity.test.app");
    }

    #[test]
    fn test_auth_url() {
        let client = IdentityApiClient::new("https://identity.test.app", "key");
        assert_eq!(client.auth_url("verify"), "https://identity.test.app/auth/v1/verify");
    }

    #[test]
    fn test_functions_url() {
        let client = IdentityApiClient::new("https://identity.test.app", "key");
        assert_eq!(
            client.functions_url("delete-account"),
            "https://identity.test.app/functions/v1/delete-account"
        );
    }

    #[test]
    fn test_session_from_response_computes_expiry() {
        let data = TokenResponse {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            expires_in: 3600,
            user: WireUser {
                id: "user-1".to_string(),
                email: Some("a@b.c".to_string()),
                created_at: None,
            },
        };
        let session = IdentityApiClient::session_from_response(data);
        assert!(!session.is_expired());
        assert!(session.expires_at > Utc::now() + Duration::minutes(59));
        assert_eq!(session.identity.id, "user-1");
    }

    #[test]
    fn test_error_for_status_unauthorized() {
        let err = error_for_status(StatusCode::UNAUTHORIZED, "bad token".to_string());
        assert!(matches!(err, IdentityError::Unauthorized(_)));
    }

    #[test]
    fn test_error_for_status_validation() {
        let err = error_for_status(StatusCode::UNPROCESSABLE_ENTITY, "otp expired".to_string());
        assert!(matches!(err, IdentityError::ValidationRejected(_)));
    }

    #[test]
    fn test_error_for_status_server() {
        let err = error_for_status(StatusCode::BAD_GATEWAY, "upstream".to_string());
        assert!(matches!(err, IdentityError::Server(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_extract_error_message_msg_field() {
        assert_eq!(
            extract_error_message(r#"{"msg":"Token has expired or is invalid"}"#),
            "Token has expired or is invalid"
        );
    }

    #[test]
    fn test_extract_error_message_error_description() {
        assert_eq!(
            extract_error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
    }

    #[test]
    fn test_extract_error_message_falls_back_to_body() {
        assert_eq!(extract_error_message("plain text failure"), "plain text failure");
        assert_eq!(extract_error_message(r#"{"code":422}"#), r#"{"code":422}"#);
    }

    #[tokio::test]
    async fn test_current_session_starts_empty() {
        let client = IdentityApiClient::new("https://identity.test.app", "key");
        assert!(client.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_password_without_session_is_not_signed_in() {
        let client = IdentityApiClient::new("https://identity.test.app", "key");
        let err = client.update_password("new-password").await.unwrap_err();
        assert!(matches!(err, IdentityError::NotSignedIn));
    }

    #[tokio::test]
    async fn test_refresh_without_session_is_not_signed_in() {
        let client = IdentityApiClient::new("https://identity.test.app", "key");
        let err = client.refresh_session().await.unwrap_err();
        assert!(matches!(err, IdentityError::NotSignedIn));
    }
}
