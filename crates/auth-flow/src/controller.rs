//! User-initiated authentication flows.
//!
//! `AuthFlowController` implements the three flows (sign-in, registration,
//! recovery) plus federated sign-in, sign-out, account deletion and startup
//! session restoration as explicit step sequences over the session state
//! store. Every operation brackets its work with the loading flag: set on
//! entry together with clearing the last error, cleared on every exit path.
//!
//! Expected failures never escape these methods; they are captured into
//! `last_error` because the UI observes state rather than catching errors.
//! The one exception is [`AuthFlowController::delete_account`], whose caller
//! needs to react to the failure kind directly.

use crate::federated::{FederatedProvider, FederatedSignIn};
use crate::flow::{FlowInput, FlowMachine, FlowStep};
use crate::state::SessionStateStore;
use identity_client::{
    CodePurpose, DeletedAccount, IdentityBackend, IdentityError, IdentityResult,
};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Error-text fragments the backend uses to report a re-used password.
///
/// The backend only reports this condition in prose; until it exposes a
/// structured error code, this match is the only available signal, and it
/// breaks if the backend rewords or localizes the message.
const CREDENTIAL_UNCHANGED_PHRASES: &[&str] = &[
    "should be different",
    "same password",
    "different from the old password",
];

/// Returns true when the backend rejected a password update because the new
/// credential equals the existing one.
fn is_credential_unchanged(error: &IdentityError) -> bool {
    let message = error.to_string().to_lowercase();
    CREDENTIAL_UNCHANGED_PHRASES
        .iter()
        .any(|phrase| message.contains(phrase))
}

/// Orchestrates the authentication flows against an injected backend.
pub struct AuthFlowController<B, F> {
    backend: Arc<B>,
    federated: Arc<F>,
    store: Arc<SessionStateStore>,
    registration: Mutex<FlowMachine>,
    recovery: Mutex<FlowMachine>,
}

impl<B: IdentityBackend, F: FederatedSignIn> AuthFlowController<B, F> {
    /// Create a controller. Dependencies are injected; nothing is read from
    /// ambient globals.
    pub fn new(backend: Arc<B>, federated: Arc<F>, store: Arc<SessionStateStore>) -> Self {
        Self {
            backend,
            federated,
            store,
            registration: Mutex::new(FlowMachine::new()),
            recovery: Mutex::new(FlowMachine::new()),
        }
    }

    /// The state store this controller writes.
    pub fn store(&self) -> Arc<SessionStateStore> {
        self.store.clone()
    }

    /// Which form the registration flow is waiting on.
    pub fn registration_step(&self) -> FlowStep {
        FlowStep::from(self.registration.lock().unwrap().state())
    }

    /// Which form the recovery flow is waiting on.
    pub fn recovery_step(&self) -> FlowStep {
        FlowStep::from(self.recovery.lock().unwrap().state())
    }

    /// Abandon the registration flow: back to the email form, code flags
    /// cleared.
    pub fn abandon_registration(&self) {
        self.abandon(&self.registration);
    }

    /// Abandon the recovery flow: back to the email form, code flags
    /// cleared.
    pub fn abandon_recovery(&self) {
        self.abandon(&self.recovery);
    }

    // ---- Sign-in flow ----

    /// Sign in with email and password.
    ///
    /// Only invoked while unauthenticated; on failure `is_authenticated`
    /// stays false and the error lands in `last_error`.
    pub async fn sign_in(&self, email: &str, password: &str) {
        self.begin();
        match self.backend.sign_in_with_password(email, password).await {
            Ok(session) => {
                info!(user_id = %session.identity.id, "Sign-in succeeded");
                self.store.update(|state| {
                    state.is_authenticated = true;
                    state.needs_credential_setup = false;
                    state.current_identity = Some(session.identity);
                    state.is_loading = false;
                });
            }
            Err(error) => self.fail(format!("Sign-in failed: {error}")),
        }
    }

    // ---- Registration flow ----

    /// Step 1: request a registration code, creating the account if absent.
    pub async fn start_registration(&self, email: &str) {
        self.send_code(&self.registration, email, CodePurpose::Registration)
            .await;
    }

    /// Step 2: verify the registration code.
    ///
    /// On success the backend returns a live session, but the user is not
    /// considered authenticated until a password is set: `code_verified` and
    /// `needs_credential_setup` go true while `is_authenticated` stays
    /// false.
    pub async fn verify_registration_code(&self, email: &str, code: &str) {
        self.verify_code_step(&self.registration, email, code, CodePurpose::Registration)
            .await;
    }

    /// Step 3: set the password and finish registration.
    pub async fn complete_registration(&self, password: &str) {
        self.finish_credential_setup(&self.registration, password, "registration")
            .await;
    }

    // ---- Recovery flow ----

    /// Step 1: request a recovery code for an existing account.
    pub async fn start_recovery(&self, email: &str) {
        self.send_code(&self.recovery, email, CodePurpose::Recovery).await;
    }

    /// Step 2: verify the recovery code. Recovery codes are a distinct type
    /// on the backend; a registration code never verifies here.
    pub async fn verify_recovery_code(&self, email: &str, code: &str) {
        self.verify_code_step(&self.recovery, email, code, CodePurpose::Recovery)
            .await;
    }

    /// Step 3: set the new password and finish recovery.
    pub async fn complete_recovery(&self, new_password: &str) {
        self.finish_credential_setup(&self.recovery, new_password, "recovery")
            .await;
    }

    // ---- Federated sign-in ----

    /// Sign in through a third-party identity provider.
    ///
    /// Any failure (adapter cancellation, missing token, backend rejection)
    /// forces `is_authenticated` to false so a failed attempt can never
    /// leave a stale authenticated flag behind.
    pub async fn sign_in_with_federated_identity(&self, provider: FederatedProvider) {
        self.begin();

        let token = match self.federated.obtain_identity_token(provider).await {
            Ok(token) => token,
            Err(error) => {
                self.fail_federated(format!("{provider} sign-in failed: {error}"));
                return;
            }
        };

        match self
            .backend
            .sign_in_with_id_token(provider.as_str(), &token)
            .await
        {
            Ok(session) => {
                info!(user_id = %session.identity.id, provider = %provider, "Federated sign-in succeeded");
                self.store.update(|state| {
                    state.is_authenticated = true;
                    state.needs_credential_setup = false;
                    state.current_identity = Some(session.identity);
                    state.is_loading = false;
                });
            }
            Err(error) => {
                self.fail_federated(format!("{provider} sign-in failed: {error}"));
            }
        }
    }

    // ---- Session lifecycle ----

    /// Sign out.
    ///
    /// Local state resets to its initial value whether or not the backend
    /// call succeeds; after a user-initiated sign-out the client must never
    /// still look authenticated.
    pub async fn sign_out(&self) {
        self.begin();

        if let Err(error) = self.backend.sign_out().await {
            warn!(error = %error, "Backend sign-out failed; clearing local state anyway");
        }

        self.reset_flows();
        self.store.reset();
        info!("Signed out");
    }

    /// Delete the current account.
    ///
    /// Requires a valid session; forwards its bearer credential to the
    /// administrative deletion endpoint. Success resets local state like
    /// sign-out. Failure is surfaced both in `last_error` and as a typed
    /// error so the caller can re-prompt.
    pub async fn delete_account(&self) -> IdentityResult<DeletedAccount> {
        self.begin();

        let result = self.run_account_deletion().await;
        match &result {
            Ok(deleted) => {
                info!(user_id = %deleted.user_id, "Account deleted");
                self.reset_flows();
                self.store.reset();
            }
            Err(error) => {
                self.fail(format!("Account deletion failed: {error}"));
            }
        }
        result
    }

    async fn run_account_deletion(&self) -> IdentityResult<DeletedAccount> {
        let session = self
            .backend
            .current_session()
            .await?
            .ok_or(IdentityError::NotSignedIn)?;

        if session.is_expired() {
            return Err(IdentityError::Unauthorized("Session expired".to_string()));
        }

        self.backend.delete_account(&session.access_token).await
    }

    /// Restore the session at startup.
    ///
    /// A present, unexpired session authenticates immediately. An absent or
    /// expired session leaves the client unauthenticated; an expired one is
    /// additionally invalidated backend-side on a best-effort basis.
    pub async fn check_session(&self) {
        self.begin();

        match self.backend.current_session().await {
            Ok(Some(session)) if !session.is_expired() => {
                info!(user_id = %session.identity.id, "Session restored");
                self.store.update(|state| {
                    state.is_authenticated = true;
                    state.needs_credential_setup = false;
                    state.current_identity = Some(session.identity);
                    state.is_loading = false;
                });
            }
            Ok(Some(_)) => {
                info!("Stored session is expired");
                if let Err(error) = self.backend.sign_out().await {
                    warn!(error = %error, "Failed to invalidate expired session backend-side");
                }
                self.store.update(|state| {
                    state.is_authenticated = false;
                    state.current_identity = None;
                    state.is_loading = false;
                });
            }
            Ok(None) => {
                debug!("No active session");
                self.store.update(|state| {
                    state.is_authenticated = false;
                    state.current_identity = None;
                    state.is_loading = false;
                });
            }
            Err(error) if error.is_unauthorized() => {
                warn!(error = %error, "Stored session rejected; resetting local state");
                self.store.reset();
            }
            // Transport failures are retryable and must not reset unrelated
            // state.
            Err(error) => self.fail(format!("Session check failed: {error}")),
        }
    }

    // ---- Shared step implementations ----

    async fn send_code(&self, machine: &Mutex<FlowMachine>, email: &str, purpose: CodePurpose) {
        // Entry clears the stale sent flag along with the loading bracket.
        self.store.update(|state| {
            state.is_loading = true;
            state.last_error = None;
            state.code_sent = false;
        });

        let allow_create = purpose == CodePurpose::Registration;
        match self.backend.request_code(email, purpose, allow_create).await {
            Ok(()) => {
                info!(purpose = ?purpose, "One-time code sent");
                self.advance(machine, FlowInput::CodeSent);
                self.store.update(|state| {
                    state.code_sent = true;
                    state.is_loading = false;
                });
            }
            Err(error) => self.fail(format!("Failed to send verification code: {error}")),
        }
    }

    async fn verify_code_step(
        &self,
        machine: &Mutex<FlowMachine>,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) {
        self.begin();

        match self.backend.verify_code(email, code, purpose).await {
            Ok(session) => {
                info!(user_id = %session.identity.id, purpose = ?purpose, "Code verified, waiting for credential");
                self.advance(machine, FlowInput::CodeVerified);
                // The backend session is live, but a verified-yet-passwordless
                // account does not count as authenticated.
                self.store.update(|state| {
                    state.code_verified = true;
                    state.needs_credential_setup = true;
                    state.current_identity = Some(session.identity);
                    state.is_loading = false;
                });
            }
            Err(error) => self.fail(format!("Code verification failed: {error}")),
        }
    }

    async fn finish_credential_setup(
        &self,
        machine: &Mutex<FlowMachine>,
        password: &str,
        flow: &str,
    ) {
        self.begin();

        match self.backend.update_password(password).await {
            Ok(identity) => {
                info!(flow, user_id = %identity.id, "Credential set, flow complete");
                self.advance(machine, FlowInput::CredentialSet);
                self.store.update(|state| {
                    state.needs_credential_setup = false;
                    state.is_authenticated = true;
                    state.current_identity = Some(identity);
                    state.is_loading = false;
                });
            }
            Err(error) if is_credential_unchanged(&error) => {
                // A retried completion after a prior partial success hits
                // "new password equals old password" on the backend; the
                // credential is in place, so the flow finishes.
                warn!(flow, "Credential already set; treating retried completion as success");
                self.advance(machine, FlowInput::CredentialSet);
                self.store.update(|state| {
                    state.last_error = None;
                    state.needs_credential_setup = false;
                    state.is_authenticated = true;
                    state.is_loading = false;
                });
            }
            Err(error) => self.fail(format!("Failed to set password: {error}")),
        }
    }

    // ---- State helpers ----

    fn begin(&self) {
        self.store.update(|state| {
            state.is_loading = true;
            state.last_error = None;
        });
    }

    fn fail(&self, message: String) {
        warn!(message = %message, "Flow step failed");
        self.store.update(|state| {
            state.last_error = Some(message);
            state.is_loading = false;
        });
    }

    /// Federated failures additionally force the authenticated flag off.
    fn fail_federated(&self, message: String) {
        warn!(message = %message, "Federated sign-in failed");
        self.store.update(|state| {
            state.is_authenticated = false;
            state.last_error = Some(message);
            state.is_loading = false;
        });
    }

    /// Advance a flow machine, tolerating out-of-order inputs.
    ///
    /// A superseded or retried step may arrive after its machine has moved
    /// on (e.g. a second completion after the flow already finished); the
    /// step's own state writes are idempotent, so the stale input is only
    /// logged.
    fn advance(&self, machine: &Mutex<FlowMachine>, input: FlowInput) {
        let mut machine = machine.lock().unwrap();
        let before = FlowStep::from(machine.state());
        if machine.consume(&input).is_err() {
            debug!(step = ?before, input = ?input, "Ignoring out-of-order flow input");
        }
    }

    fn abandon(&self, machine: &Mutex<FlowMachine>) {
        *machine.lock().unwrap() = FlowMachine::new();
        self.store.update(|state| {
            state.code_sent = false;
            state.code_verified = false;
            state.last_error = None;
        });
    }

    fn reset_flows(&self) {
        *self.registration.lock().unwrap() = FlowMachine::new();
        *self.recovery.lock().unwrap() = FlowMachine::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_unchanged_known_phrases() {
        let err =
            IdentityError::ValidationRejected("New password should be different from the old password.".to_string());
        assert!(is_credential_unchanged(&err));

        let err = IdentityError::ValidationRejected("You cannot reuse the same password".to_string());
        assert!(is_credential_unchanged(&err));
    }

    #[test]
    fn test_credential_unchanged_is_case_insensitive() {
        let err = IdentityError::ValidationRejected("Password SHOULD BE DIFFERENT".to_string());
        assert!(is_credential_unchanged(&err));
    }

    #[test]
    fn test_credential_unchanged_ignores_other_errors() {
        let err = IdentityError::ValidationRejected("Password is too weak".to_string());
        assert!(!is_credential_unchanged(&err));

        let err = IdentityError::Server("internal error".to_string());
        assert!(!is_credential_unchanged(&err));
    }
}
