//! Identity backend client for the Wastelord mobile core.
//!
//! This crate provides:
//! - The data model shared by all auth flows (`Session`, `Identity`)
//! - The typed error taxonomy for backend failures
//! - The `IdentityBackend` trait, the injection seam the flow controller
//!   and event reconciler are built against
//! - An HTTP implementation of that trait against the backend's REST API
//! - The lifecycle event stream (`LifecycleEvent`)

mod backend;
mod error;
mod events;
mod rest;
mod types;

pub use backend::IdentityBackend;
pub use error::{IdentityError, IdentityResult};
pub use events::LifecycleEvent;
pub use rest::IdentityApiClient;
pub use types::{CodePurpose, DeletedAccount, Identity, Session};
