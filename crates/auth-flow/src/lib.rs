//! Authentication/session core for the Wastelord client.
//!
//! This crate provides:
//! - `SessionStateStore`, the observable single source of truth for auth
//!   state
//! - `AuthFlowController`, the sign-in / registration / recovery flows
//! - `SessionEventReconciler`, folding backend-pushed lifecycle events into
//!   the same store
//! - The federated sign-in seam for third-party providers
//! - An explicit per-flow step machine

mod controller;
mod federated;
mod flow;
mod reconciler;
mod state;

pub use controller::AuthFlowController;
pub use federated::{FederatedError, FederatedProvider, FederatedSignIn};
pub use flow::code_flow;
pub use flow::{FlowInput, FlowMachine, FlowMachineState, FlowStep};
pub use reconciler::SessionEventReconciler;
pub use state::{AuthState, SessionStateStore, StateObserver};
