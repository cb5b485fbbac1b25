use std::sync::Arc;

use browser_ai_core::{Error, ExecutionOutcome, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{ActionDescriptor, Backend};

/// Dispatches single actions to the automation backend and normalizes replies.
///
/// Every failure, including "not connected", comes back as an
/// `ExecutionOutcome` with `success == false`; `execute` itself never errors.
pub struct ToolExecutionClient {
    backend: Option<Arc<dyn Backend>>,
    capabilities: Vec<ActionDescriptor>,
}

impl ToolExecutionClient {
    pub fn new() -> Self {
        Self {
            backend: None,
            capabilities: Vec::new(),
        }
    }

    /// Attach a backend and fetch its capability table.
    pub async fn connect(&mut self, backend: Arc<dyn Backend>) -> Result<Vec<ActionDescriptor>> {
        let capabilities = backend.list_capabilities().await?;
        info!(count = capabilities.len(), "Backend capabilities discovered");
        self.capabilities = capabilities.clone();
        self.backend = Some(backend);
        Ok(capabilities)
    }

    pub fn disconnect(&mut self) {
        if self.backend.take().is_some() {
            debug!("Execution client disconnected");
        }
        self.capabilities.clear();
    }

    pub fn is_connected(&self) -> bool {
        self.backend.is_some()
    }

    pub fn capabilities(&self) -> &[ActionDescriptor] {
        &self.capabilities
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.name == name)
    }

    pub async fn execute(&self, name: &str, arguments: Value) -> ExecutionOutcome {
        let Some(backend) = &self.backend else {
            return ExecutionOutcome::failed(
                Error::NotConnected("automation backend".to_string()).to_string(),
            );
        };

        if !self.has_capability(name) {
            warn!(tool = %name, "Unknown backend tool");
            return ExecutionOutcome::failed(format!("Tool '{}' not found", name));
        }

        debug!(tool = %name, "Dispatching action to backend");
        match backend.call(name, arguments).await {
            Ok(reply) => map_reply(name, reply),
            Err(e) => {
                warn!(tool = %name, error = %e, "Backend call failed");
                ExecutionOutcome::failed(e.to_string())
            }
        }
    }
}

impl Default for ToolExecutionClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a raw backend reply to an outcome. Rule order: `isError`, `content`,
/// `error`, then anything else as an opaque success.
fn map_reply(name: &str, reply: Value) -> ExecutionOutcome {
    if reply.get("isError").and_then(Value::as_bool) == Some(true) {
        let text = reply.get("content").map(content_text).unwrap_or_default();
        return if text.is_empty() {
            ExecutionOutcome::failed(format!("Tool '{}' reported an error", name))
        } else {
            ExecutionOutcome::failed(text)
        };
    }

    if let Some(content) = reply.get("content") {
        return ExecutionOutcome::ok(content.clone());
    }

    if let Some(error) = reply.get("error") {
        let message = match error {
            Value::String(s) => s.clone(),
            Value::Object(obj) => obj
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
            other => other.to_string(),
        };
        return ExecutionOutcome::failed(message);
    }

    ExecutionOutcome::ok(reply)
}

/// Joined `text` fields of an MCP content array.
pub fn content_text(content: &Value) -> String {
    match content {
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}
