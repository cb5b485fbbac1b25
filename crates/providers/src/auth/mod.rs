//! Credentials for model invocation: stored OAuth tokens with refresh, and
//! static API keys as a fallback.

pub mod oauth;
pub mod store;
pub mod token_manager;

use async_trait::async_trait;
use browser_ai_core::Result;

pub use oauth::{AuthMode, OAuthClient, Pkce, TokenEndpoint};
pub use store::CredentialStore;
pub use token_manager::TokenManager;

/// A ready-to-use credential for the Messages API.
#[derive(Clone, PartialEq, Eq)]
pub enum ModelAuth {
    /// OAuth access token, sent as `Authorization: Bearer`.
    Bearer(String),
    /// Pre-shared API key, sent as `x-api-key`.
    ApiKey(String),
}

impl std::fmt::Debug for ModelAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelAuth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            ModelAuth::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
        }
    }
}

#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// A valid credential, or `Error::Auth` when none can be produced.
    async fn get_valid_credential(&self) -> Result<ModelAuth>;
}

/// Fixed key, no refresh. Used by `run` with an explicit key and in tests.
pub struct StaticCredential(pub ModelAuth);

#[async_trait]
impl CredentialSource for StaticCredential {
    async fn get_valid_credential(&self) -> Result<ModelAuth> {
        Ok(self.0.clone())
    }
}
