pub mod catalog;
pub mod executor;
pub mod mcp;
pub mod planning;

use async_trait::async_trait;
use browser_ai_core::Result;
use serde_json::Value;

pub use catalog::ToolCatalog;
pub use executor::{content_text, ToolExecutionClient};
pub use mcp::McpClient;
pub use planning::{
    todo_write_descriptor, PlanningTask, TaskPlanningState, TaskPriority, TaskStatus, TODO_WRITE_TOOL,
};

/// Where an action is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Performed by the automation backend.
    External,
    /// Handled inside the orchestrator (planning-state updates).
    Internal,
}

/// A registered action: name, description and argument schema.
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub kind: ActionKind,
}

impl ActionDescriptor {
    pub fn external(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            kind: ActionKind::External,
        }
    }

    pub fn internal(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            kind: ActionKind::Internal,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.kind == ActionKind::Internal
    }
}

/// Connection to the external automation backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Capabilities advertised by the backend. Called once at connection time.
    async fn list_capabilities(&self) -> Result<Vec<ActionDescriptor>>;

    /// One request/response round trip; returns the backend's raw reply.
    async fn call(&self, name: &str, arguments: Value) -> Result<Value>;
}
