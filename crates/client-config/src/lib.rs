//! Configuration and logging setup for the Wastelord client.
//!
//! This crate provides:
//! - Client configuration with compile-time defaults and env overrides
//! - Logging initialization via `tracing-subscriber`

mod config;
mod logging;

pub use config::{Config, DEFAULT_IDENTITY_API_URL, DEFAULT_IDENTITY_PUBLISHABLE_KEY};
pub use logging::init_logging;
