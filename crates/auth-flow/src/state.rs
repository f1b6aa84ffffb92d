//! Observable session state.
//!
//! `SessionStateStore` is the single source of truth for "is this user
//! allowed past the gate". It holds one mutable [`AuthState`] record with
//! change notification and no validation logic of its own; the flow
//! controller and the event reconciler both write it, and the UI layer
//! observes it.

use identity_client::Identity;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Capacity of the state change channel for async observers.
const STATE_CHANNEL_CAPACITY: usize = 64;

/// Snapshot of the authentication state.
///
/// Invariants (maintained by callers, not the store):
/// - `is_authenticated` implies `!needs_credential_setup` and
///   `current_identity.is_some()`
/// - `needs_credential_setup` implies `code_verified` and
///   `!is_authenticated` (code verified but credential not yet finalized is
///   a distinct, non-authenticated state)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuthState {
    /// User has completed all required steps and may pass the gate.
    pub is_authenticated: bool,
    /// Code verified, waiting on a password before the account counts as
    /// fully authenticated.
    pub needs_credential_setup: bool,
    /// Identity of the current user, when known.
    pub current_identity: Option<Identity>,
    /// An asynchronous operation is in flight.
    pub is_loading: bool,
    /// Human-readable message of the last failure, cleared on each new
    /// operation.
    pub last_error: Option<String>,
    /// A one-time code was sent for the active flow.
    pub code_sent: bool,
    /// The one-time code was accepted by the backend.
    pub code_verified: bool,
}

impl AuthState {
    /// Returns true when the state equals the process-start value.
    pub fn is_initial(&self) -> bool {
        *self == AuthState::default()
    }
}

/// Callback type for synchronous state observation.
pub type StateObserver = Box<dyn Fn(&AuthState) + Send + Sync>;

/// Single mutable state record with change notification.
///
/// Every `update` commits atomically under a lock and then notifies all
/// observers with the committed snapshot before returning; observers never
/// see a partial merge. An additional broadcast channel serves async
/// consumers.
pub struct SessionStateStore {
    state: Mutex<AuthState>,
    observers: Mutex<Vec<StateObserver>>,
    tx: broadcast::Sender<AuthState>,
}

impl SessionStateStore {
    /// Create a store holding the initial (all-false/null) state.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(AuthState::default()),
            observers: Mutex::new(Vec::new()),
            tx,
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> AuthState {
        self.state.lock().unwrap().clone()
    }

    /// Atomically apply a mutation and notify observers of the committed
    /// state.
    pub fn update(&self, apply: impl FnOnce(&mut AuthState)) {
        let committed = {
            let mut state = self.state.lock().unwrap();
            apply(&mut state);
            state.clone()
        };

        for observer in self.observers.lock().unwrap().iter() {
            observer(&committed);
        }
        let _ = self.tx.send(committed);
    }

    /// Reset to the initial state (sign-out, account deletion).
    pub fn reset(&self) {
        self.update(|state| *state = AuthState::default());
    }

    /// Register a synchronous observer, invoked on every committed update.
    pub fn observe(&self, observer: StateObserver) {
        self.observers.lock().unwrap().push(observer);
    }

    /// Subscribe to committed state snapshots on a broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthState> {
        self.tx.subscribe()
    }
}

impl Default for SessionStateStore {
    fn default() -> Self {
        Self::new()
    }
}
