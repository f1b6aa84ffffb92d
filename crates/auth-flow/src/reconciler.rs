//! Backend-pushed event reconciliation.
//!
//! The identity backend publishes lifecycle events asynchronously; this
//! reconciler folds them into the session state store through the same
//! update path the flow controller uses. The two write concurrently with no
//! global ordering; every update overwrites the relevant fields outright,
//! so the last write wins and no stale read-modify-write can resurrect old
//! state.

use crate::state::SessionStateStore;
use identity_client::LifecycleEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Consumes the lifecycle event stream and reconciles it into the store.
pub struct SessionEventReconciler {
    store: Arc<SessionStateStore>,
}

impl SessionEventReconciler {
    /// Create a reconciler writing to the given store.
    pub fn new(store: Arc<SessionStateStore>) -> Self {
        Self { store }
    }

    /// Spawn the consumer loop as a long-lived background task.
    ///
    /// The task runs for the lifetime of the process; individual flow
    /// operations never cancel it.
    pub fn spawn(self, events: broadcast::Receiver<LifecycleEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    /// Consume events until the stream closes.
    pub async fn run(self, mut events: broadcast::Receiver<LifecycleEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.apply(&event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Lifecycle event stream lagged; continuing");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Lifecycle event stream closed");
                    break;
                }
            }
        }
    }

    /// Apply a single event to the store.
    pub fn apply(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::SignedIn { identity } => {
                debug!(user_id = identity.as_ref().map(|i| i.id.as_str()), "Backend reports signed in");
                let identity = identity.clone();
                self.store.update(|state| {
                    state.is_authenticated = true;
                    if let Some(identity) = identity {
                        state.current_identity = Some(identity);
                    }
                });
            }
            LifecycleEvent::SignedOut => {
                // Covers backend-initiated invalidation (revoked refresh
                // token, sign-out on another device), not just local action.
                info!("Backend reports signed out; resetting auth state");
                self.store.reset();
            }
            LifecycleEvent::UserUpdated => debug!("User attributes updated"),
            LifecycleEvent::PasswordRecoveryStarted => debug!("Password recovery started"),
            LifecycleEvent::TokenRefreshed => debug!("Access token refreshed"),
            LifecycleEvent::ChallengeVerified => debug!("Challenge verified"),
            LifecycleEvent::Unknown => debug!("Ignoring unrecognized lifecycle event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AuthState;
    use identity_client::Identity;

    fn identity() -> Identity {
        Identity {
            id: "user-1".to_string(),
            email: Some("survivor@wastelord.app".to_string()),
            created_at: None,
        }
    }

    #[test]
    fn test_signed_in_sets_flag_and_identity() {
        let store = Arc::new(SessionStateStore::new());
        let reconciler = SessionEventReconciler::new(store.clone());

        reconciler.apply(&LifecycleEvent::SignedIn {
            identity: Some(identity()),
        });

        let state = store.snapshot();
        assert!(state.is_authenticated);
        assert_eq!(state.current_identity.unwrap().id, "user-1");
    }

    #[test]
    fn test_signed_in_without_payload_keeps_existing_identity() {
        let store = Arc::new(SessionStateStore::new());
        store.update(|state| state.current_identity = Some(identity()));
        let reconciler = SessionEventReconciler::new(store.clone());

        reconciler.apply(&LifecycleEvent::SignedIn { identity: None });

        let state = store.snapshot();
        assert!(state.is_authenticated);
        assert!(state.current_identity.is_some());
    }

    #[test]
    fn test_signed_in_does_not_touch_credential_setup_flag() {
        let store = Arc::new(SessionStateStore::new());
        store.update(|state| {
            state.code_verified = true;
            state.needs_credential_setup = true;
        });
        let reconciler = SessionEventReconciler::new(store.clone());

        reconciler.apply(&LifecycleEvent::SignedIn { identity: None });

        assert!(store.snapshot().needs_credential_setup);
    }

    #[test]
    fn test_signed_out_resets_to_initial() {
        let store = Arc::new(SessionStateStore::new());
        store.update(|state| {
            state.is_authenticated = true;
            state.current_identity = Some(identity());
            state.code_sent = true;
            state.code_verified = true;
        });
        let reconciler = SessionEventReconciler::new(store.clone());

        reconciler.apply(&LifecycleEvent::SignedOut);

        assert_eq!(store.snapshot(), AuthState::default());
    }

    #[test]
    fn test_informational_events_do_not_change_state() {
        let store = Arc::new(SessionStateStore::new());
        store.update(|state| state.is_authenticated = true);
        let reconciler = SessionEventReconciler::new(store.clone());

        let before = store.snapshot();
        for event in [
            LifecycleEvent::UserUpdated,
            LifecycleEvent::PasswordRecoveryStarted,
            LifecycleEvent::TokenRefreshed,
            LifecycleEvent::ChallengeVerified,
            LifecycleEvent::Unknown,
        ] {
            reconciler.apply(&event);
        }

        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_run_consumes_stream_until_closed() {
        let store = Arc::new(SessionStateStore::new());
        let (tx, rx) = broadcast::channel(16);
        let handle = SessionEventReconciler::new(store.clone()).spawn(rx);

        tx.send(LifecycleEvent::SignedIn { identity: Some(identity()) })
            .unwrap();
        tx.send(LifecycleEvent::SignedOut).unwrap();
        drop(tx);

        // The loop exits once the channel closes, having applied both events.
        handle.await.unwrap();
        assert_eq!(store.snapshot(), AuthState::default());
    }
}
