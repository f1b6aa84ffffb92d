//! The identity backend capability consumed by the auth flows.

use crate::error::IdentityResult;
use crate::events::LifecycleEvent;
use crate::types::{CodePurpose, DeletedAccount, Identity, Session};
use tokio::sync::broadcast;

/// Operations the identity backend must provide.
///
/// The flow controller and event reconciler receive an implementation at
/// construction time; nothing reaches into ambient globals. Tests inject a
/// scripted fake.
#[allow(async_fn_in_trait)]
pub trait IdentityBackend: Send + Sync {
    /// Request a one-time code be sent to `email` for the given purpose.
    ///
    /// `allow_create` instructs the backend to create the account if it does
    /// not exist (registration only; recovery always targets an existing
    /// account).
    async fn request_code(
        &self,
        email: &str,
        purpose: CodePurpose,
        allow_create: bool,
    ) -> IdentityResult<()>;

    /// Submit a one-time code for verification.
    ///
    /// The purpose must match the purpose the code was requested with; the
    /// backend rejects mismatched types.
    async fn verify_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> IdentityResult<Session>;

    /// Sign in with email and password.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> IdentityResult<Session>;

    /// Exchange a third-party identity token for a backend session.
    async fn sign_in_with_id_token(&self, provider: &str, token: &str) -> IdentityResult<Session>;

    /// Set the current account's password. Requires a live session.
    async fn update_password(&self, new_password: &str) -> IdentityResult<Identity>;

    /// Invalidate the current session backend-side and drop it locally.
    async fn sign_out(&self) -> IdentityResult<()>;

    /// The session currently held by the client, if any.
    ///
    /// The returned session may already be expired; callers check
    /// `Session::is_expired` themselves.
    async fn current_session(&self) -> IdentityResult<Option<Session>>;

    /// Delete the account the bearer credential belongs to.
    async fn delete_account(&self, access_token: &str) -> IdentityResult<DeletedAccount>;

    /// Subscribe to the lifecycle event stream.
    ///
    /// The stream is lazy and never terminates under normal operation; a
    /// fresh receiver can be obtained at any time.
    fn lifecycle_events(&self) -> broadcast::Receiver<LifecycleEvent>;
}
