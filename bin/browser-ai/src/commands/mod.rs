pub mod auth;
pub mod run_cmd;
pub mod serve;
pub mod tools_cmd;

use std::sync::Arc;

use browser_ai_agent::{AutomationOrchestrator, OrchestratorSettings};
use browser_ai_core::{Config, Paths};
use browser_ai_providers::{AnthropicProvider, CredentialSource, CredentialStore, OAuthClient, TokenManager};
use browser_ai_tools::{McpClient, ToolExecutionClient};

const BACKEND_NAME: &str = "playwright";

/// Command-line settings layered over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub playwright_path: Option<String>,
    pub model: Option<String>,
}

pub fn load_config(overrides: &Overrides) -> anyhow::Result<(Paths, Config)> {
    let paths = Paths::new();
    let mut config = Config::load_or_default(&paths)?;
    if let Some(package) = overrides.playwright_path.as_deref() {
        config.backend = config.backend.with_package(package);
    }
    if let Some(model) = overrides.model.as_deref() {
        config.provider.model = model.to_string();
    }
    Ok((paths, config))
}

pub fn token_manager(paths: &Paths, config: &Config) -> Arc<TokenManager> {
    Arc::new(
        TokenManager::new(CredentialStore::from_paths(paths), Arc::new(OAuthClient::new()))
            .with_static_key(config.static_api_key()),
    )
}

pub async fn connect_backend(config: &Config) -> anyhow::Result<Arc<McpClient>> {
    let backend = &config.backend;
    let client = McpClient::start(
        BACKEND_NAME,
        &backend.command,
        &backend.args,
        &backend.env,
        backend.cwd.as_deref(),
    )
    .await?;
    Ok(Arc::new(client))
}

pub async fn build_orchestrator(
    config: &Config,
    backend: Arc<McpClient>,
    credentials: Arc<dyn CredentialSource>,
) -> anyhow::Result<AutomationOrchestrator> {
    let provider = AnthropicProvider::new(
        credentials,
        Some(&config.provider.api_base),
        &config.provider.model,
        config.provider.timeout_secs,
    )?;

    let mut executor = ToolExecutionClient::new();
    executor.connect(backend).await?;

    let orchestrator = AutomationOrchestrator::new(
        Arc::new(provider),
        executor,
        OrchestratorSettings::from_config(config),
    )?;
    Ok(orchestrator)
}
