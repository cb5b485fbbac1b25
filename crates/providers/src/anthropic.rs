use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use browser_ai_core::{ChatMessage, Error, Result, Role};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::auth::{CredentialSource, ModelAuth};
use crate::Provider;

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OAUTH_BETA: &str = "oauth-2025-04-20";

pub struct AnthropicProvider {
    client: Client,
    api_base: String,
    model: String,
    credentials: Arc<dyn CredentialSource>,
}

impl AnthropicProvider {
    pub fn new(
        credentials: Arc<dyn CredentialSource>,
        api_base: Option<&str>,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Provider(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_base: api_base
                .unwrap_or(ANTHROPIC_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            credentials,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Split out system messages (joined into the top-level `system` field)
    /// and convert the rest to Messages API turns.
    fn convert_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
        let mut system_text: Option<String> = None;
        let mut turns: Vec<Value> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => {
                    system_text = Some(match system_text {
                        Some(existing) => format!("{}\n\n{}", existing, msg.content),
                        None => msg.content.clone(),
                    });
                }
                Role::User | Role::Assistant => {
                    turns.push(json!({
                        "role": msg.role.as_str(),
                        "content": msg.content,
                    }));
                }
            }
        }

        (system_text, Self::merge_consecutive_roles(turns))
    }

    /// The API requires alternating roles; fold runs of the same role together.
    fn merge_consecutive_roles(messages: Vec<Value>) -> Vec<Value> {
        let mut result: Vec<Value> = Vec::new();

        for msg in messages {
            let same_role = result
                .last()
                .and_then(|last| last.get("role"))
                .is_some_and(|role| Some(role) == msg.get("role"));

            if same_role {
                if let Some(last) = result.last_mut() {
                    let merged = format!(
                        "{}\n\n{}",
                        last["content"].as_str().unwrap_or_default(),
                        msg["content"].as_str().unwrap_or_default()
                    );
                    last["content"] = Value::String(merged);
                    continue;
                }
            }
            result.push(msg);
        }

        result
    }

    fn normalize_model(model: &str) -> &str {
        model.strip_prefix("anthropic/").unwrap_or(model)
    }

    fn build_request(&self, messages: &[ChatMessage], temperature: f32, max_tokens: u32) -> Value {
        let (system, turns) = Self::convert_messages(messages);
        let mut request = json!({
            "model": Self::normalize_model(&self.model),
            "max_tokens": max_tokens,
            "temperature": temperature,
            "messages": turns,
        });
        if let Some(sys) = system {
            request["system"] = Value::String(sys);
        }
        request
    }

    fn apply_auth(builder: RequestBuilder, auth: &ModelAuth) -> RequestBuilder {
        match auth {
            ModelAuth::Bearer(token) => builder
                .bearer_auth(token)
                .header("anthropic-beta", OAUTH_BETA),
            ModelAuth::ApiKey(key) => builder.header("x-api-key", key),
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn invoke(&self, messages: &[ChatMessage], temperature: f32, max_tokens: u32) -> Result<String> {
        let auth = self.credentials.get_valid_credential().await?;
        let url = format!("{}/messages", self.api_base);
        let request = self.build_request(messages, temperature, max_tokens);

        info!(
            url = %url,
            model = %self.model,
            messages_count = messages.len(),
            "Calling Anthropic API"
        );

        let builder = self
            .client
            .post(&url)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request);

        let response = Self::apply_auth(builder, &auth)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("Anthropic request failed: {}", e)))?;

        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();

        if status == StatusCode::UNAUTHORIZED {
            error!(status = %status, "Anthropic API rejected the credential");
            return Err(Error::Auth(format!("credential rejected by the API: {}", raw_body)));
        }
        if !status.is_success() {
            error!(status = %status, body = %raw_body, "Anthropic API error");
            return Err(Error::Provider(format!(
                "Anthropic API error {}: {}",
                status, raw_body
            )));
        }

        let resp: AnthropicResponse = serde_json::from_str(&raw_body).map_err(|e| {
            Error::Provider(format!(
                "Failed to parse Anthropic response: {}. Body: {}",
                e,
                raw_body.chars().take(500).collect::<String>()
            ))
        })?;

        let text = resp.text();
        debug!(
            content_len = text.len(),
            stop_reason = resp.stop_reason.as_deref().unwrap_or("none"),
            "Anthropic response parsed"
        );
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

impl AnthropicResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}
