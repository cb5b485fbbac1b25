pub mod anthropic;
pub mod auth;

use async_trait::async_trait;
use browser_ai_core::{ChatMessage, Result};

/// Model invocation: role-tagged messages in, plain text out.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn invoke(&self, messages: &[ChatMessage], temperature: f32, max_tokens: u32) -> Result<String>;
}

pub use anthropic::AnthropicProvider;
pub use auth::{
    AuthMode, CredentialSource, CredentialStore, ModelAuth, OAuthClient, Pkce, StaticCredential,
    TokenEndpoint, TokenManager,
};
