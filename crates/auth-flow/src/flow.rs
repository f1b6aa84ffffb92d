//! Per-flow step machine using rust-fsm.
//!
//! Registration and recovery walk the same three ordered steps: enter an
//! email, enter the code sent to it, then set a password. The machine below
//! tracks which form a flow is waiting on; it is transient, owned by the
//! flow controller, and replaced with a fresh machine when a flow completes
//! or is abandoned.
//!
//! ## State Diagram
//!
//! ```text
//! ┌────────────────┐  CodeSent   ┌──────────────┐  CodeVerified  ┌────────────────────┐
//! │  AwaitingEmail │ ──────────► │ AwaitingCode │ ─────────────► │ AwaitingCredential │
//! └────────────────┘             └──────┬───────┘                └─────────┬──────────┘
//!          ▲                            │ CodeSent (resend)                │ CredentialSet
//!          │                            ▼                                  │
//!          │                     ┌──────────────┐                          │
//!          │                     │ AwaitingCode │                          │
//!          │                     └──────────────┘                          │
//!          └───────────────────────────────────────────────────────────────┘
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Generates a module `code_flow` with State, Input and StateMachine types.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub code_flow(AwaitingEmail)

    AwaitingEmail => {
        CodeSent => AwaitingCode
    },
    AwaitingCode => {
        // Resending a code keeps the flow on the code form.
        CodeSent => AwaitingCode,
        CodeVerified => AwaitingCredential
    },
    AwaitingCredential => {
        // Setting the credential completes the flow; the step returns to
        // the email form for the next run.
        CredentialSet => AwaitingEmail
    }
}

// Re-export the generated types with clearer names.
pub use code_flow::Input as FlowInput;
pub use code_flow::State as FlowMachineState;
pub use code_flow::StateMachine as FlowMachine;

/// Which form a flow is waiting on, for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    /// Waiting for an email address.
    Email,
    /// Waiting for the one-time code.
    Code,
    /// Waiting for a password.
    CredentialSetup,
}

impl From<&FlowMachineState> for FlowStep {
    fn from(state: &FlowMachineState) -> Self {
        match state {
            FlowMachineState::AwaitingEmail => FlowStep::Email,
            FlowMachineState::AwaitingCode => FlowStep::Code,
            FlowMachineState::AwaitingCredential => FlowStep::CredentialSetup,
        }
    }
}
