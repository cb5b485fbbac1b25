use std::collections::HashSet;

use browser_ai_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::ActionDescriptor;

/// Name of the internal planning-update action.
pub const TODO_WRITE_TOOL: &str = "todo_write";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

impl TaskPriority {
    /// Lower rank is more urgent.
    pub fn rank(self) -> u8 {
        match self {
            TaskPriority::High => 0,
            TaskPriority::Medium => 1,
            TaskPriority::Low => 2,
        }
    }
}

/// One entry of the model's own task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanningTask {
    pub id: String,
    pub content: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
}

impl PlanningTask {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        status: TaskStatus,
        priority: TaskPriority,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            status,
            priority,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TodoWriteArgs {
    todos: Vec<PlanningTask>,
}

/// Descriptor for `todo_write`, registered as an internal catalog entry.
pub fn todo_write_descriptor() -> ActionDescriptor {
    ActionDescriptor::internal(
        TODO_WRITE_TOOL,
        "Internal task planning and tracking for browser automation. Creates and manages a structured task list to track progress through complex multi-step operations.",
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "description": "The complete list of tasks (full state replacement)",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {
                                "type": "string",
                                "description": "Unique identifier for the task"
                            },
                            "content": {
                                "type": "string",
                                "minLength": 1,
                                "pattern": "\\S",
                                "description": "Task description including verification criteria"
                            },
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed"]
                            },
                            "priority": {
                                "type": "string",
                                "enum": ["high", "medium", "low"]
                            }
                        },
                        "required": ["id", "content", "status", "priority"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["todos"],
            "additionalProperties": false
        }),
    )
}

/// In-memory task list, replaced wholesale on every update.
///
/// Advisory only: the orchestrator exposes `next_actionable` but never
/// enforces ordering.
#[derive(Debug, Default)]
pub struct TaskPlanningState {
    tasks: Vec<PlanningTask>,
}

impl TaskPlanningState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole task set. On validation failure the previous set is kept.
    pub fn replace(&mut self, tasks: Vec<PlanningTask>) -> Result<()> {
        validate_tasks(&tasks)?;
        debug!(count = tasks.len(), "Planning state replaced");
        self.tasks = tasks;
        Ok(())
    }

    /// Parse a `todo_write` argument object (`{"todos": [...]}`) and replace.
    pub fn replace_from_arguments(&mut self, arguments: &Value) -> Result<()> {
        let args: TodoWriteArgs = serde_json::from_value(arguments.clone())
            .map_err(|e| Error::Validation(format!("invalid {} arguments: {}", TODO_WRITE_TOOL, e)))?;
        self.replace(args.todos)
    }

    pub fn list(&self) -> &[PlanningTask] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&PlanningTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Update a single task's status. Returns false for an unknown id.
    pub fn set_status(&mut self, id: &str, status: TaskStatus) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.status = status;
                true
            }
            None => false,
        }
    }

    /// `None` while any task is in progress; otherwise the most urgent
    /// pending task, earliest submitted on ties.
    pub fn next_actionable(&self) -> Option<&PlanningTask> {
        if self.tasks.iter().any(|t| t.status == TaskStatus::InProgress) {
            return None;
        }
        // min_by_key returns the first minimum, which keeps insertion order on ties.
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .min_by_key(|t| t.priority.rank())
    }

    /// True when every task is completed; vacuously true for an empty list.
    pub fn all_completed(&self) -> bool {
        self.tasks.iter().all(|t| t.status == TaskStatus::Completed)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}

fn validate_tasks(tasks: &[PlanningTask]) -> Result<()> {
    let mut seen = HashSet::new();
    for task in tasks {
        if task.content.trim().is_empty() {
            return Err(Error::Validation(format!("task '{}' has empty content", task.id)));
        }
        if !seen.insert(task.id.as_str()) {
            return Err(Error::Validation(format!("duplicate task id '{}'", task.id)));
        }
    }
    Ok(())
}
