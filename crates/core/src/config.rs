use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Static pre-shared key. Used when no OAuth credential is stored.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra system message placed ahead of the automation instructions.
    #[serde(default)]
    pub system_preamble: Option<String>,
}

fn default_api_base() -> String {
    "https://api.anthropic.com/v1".to_string()
}

fn default_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_api_base(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            system_preamble: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefaults {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Check arguments against the backend's parameter schema before dispatch.
    #[serde(default = "default_validate_actions")]
    pub validate_actions: bool,
    /// Action whose result is fed back to the model untruncated.
    #[serde(default = "default_snapshot_tool")]
    pub snapshot_tool: String,
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_iterations() -> u32 {
    30
}

fn default_validate_actions() -> bool {
    true
}

fn default_snapshot_tool() -> String {
    "browser_snapshot".to_string()
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_iterations: default_max_iterations(),
            validate_actions: default_validate_actions(),
            snapshot_tool: default_snapshot_tool(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    #[serde(default = "default_backend_command")]
    pub command: String,
    #[serde(default = "default_backend_args")]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub cwd: Option<String>,
}

fn default_backend_command() -> String {
    "npx".to_string()
}

fn default_backend_args() -> Vec<String> {
    vec![
        "@playwright/mcp@latest".to_string(),
        "--browser".to_string(),
        "chromium".to_string(),
    ]
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: default_backend_command(),
            args: default_backend_args(),
            env: HashMap::new(),
            cwd: None,
        }
    }
}

impl BackendConfig {
    /// Swap the package spec (first argument) for another Playwright MCP
    /// package or local executable path.
    pub fn with_package(mut self, package: &str) -> Self {
        match self.args.first_mut() {
            Some(first) => *first = package.to_string(),
            None => self.args.push(package.to_string()),
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub agent: AgentDefaults,
    #[serde(default)]
    pub backend: BackendConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Configured static key, ignoring blanks.
    pub fn static_api_key(&self) -> Option<String> {
        self.provider
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.agent.max_iterations, 30);
        assert_eq!(cfg.agent.max_tokens, 1000);
        assert!((cfg.agent.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(cfg.backend.command, "npx");
        assert_eq!(cfg.backend.args[0], "@playwright/mcp@latest");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let raw = r#"{
  "provider": { "apiKey": "  sk-test  ", "model": "claude-3-5-haiku-20241022" },
  "agent": { "maxIterations": 5 }
}"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.agent.max_iterations, 5);
        assert_eq!(cfg.agent.snapshot_tool, "browser_snapshot");
        assert_eq!(cfg.provider.model, "claude-3-5-haiku-20241022");
        assert_eq!(cfg.provider.api_base, "https://api.anthropic.com/v1");
        assert_eq!(cfg.static_api_key().as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_blank_api_key_ignored() {
        let mut cfg = Config::default();
        cfg.provider.api_key = Some("   ".to_string());
        assert!(cfg.static_api_key().is_none());
    }

    #[test]
    fn test_with_package_replaces_first_arg() {
        let backend = BackendConfig::default().with_package("/opt/playwright-mcp/cli.js");
        assert_eq!(backend.args[0], "/opt/playwright-mcp/cli.js");
        assert_eq!(backend.args[1], "--browser");

        let empty = BackendConfig { args: vec![], ..BackendConfig::default() };
        assert_eq!(empty.with_package("pkg").args, vec!["pkg".to_string()]);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut cfg = Config::default();
        cfg.agent.max_iterations = 12;
        cfg.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.agent.max_iterations, 12);
    }
}
