//! Federated sign-in seam.
//!
//! The platform sign-in SDK (Google, Apple) lives outside this core; the
//! flow controller only needs something that can produce a provider-issued
//! identity token. Implementations wrap the platform SDK; tests inject a
//! scripted fake.

use std::fmt;
use thiserror::Error;

/// Supported third-party identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FederatedProvider {
    Google,
    Apple,
}

impl FederatedProvider {
    /// Wire name of the provider on the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            FederatedProvider::Google => "google",
            FederatedProvider::Apple => "apple",
        }
    }
}

impl fmt::Display for FederatedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure modes of the platform sign-in SDK.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FederatedError {
    /// The user dismissed the provider's sign-in UI.
    #[error("Sign-in was cancelled")]
    Cancelled,

    /// No window/view was available to present the provider's UI in.
    #[error("No presentation context available")]
    NoPresentationContext,

    /// The provider completed but returned no identity token.
    #[error("Provider returned no identity token")]
    NoToken,
}

/// Adapter that obtains a third-party identity token for a provider.
#[allow(async_fn_in_trait)]
pub trait FederatedSignIn: Send + Sync {
    /// Run the provider's sign-in and return its identity token.
    async fn obtain_identity_token(
        &self,
        provider: FederatedProvider,
    ) -> Result<String, FederatedError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_wire_names() {
        assert_eq!(FederatedProvider::Google.as_str(), "google");
        assert_eq!(FederatedProvider::Apple.as_str(), "apple");
    }

    #[test]
    fn test_error_messages_are_human_readable() {
        assert_eq!(FederatedError::Cancelled.to_string(), "Sign-in was cancelled");
        assert_eq!(
            FederatedError::NoToken.to_string(),
            "Provider returned no identity token"
        );
    }
}
