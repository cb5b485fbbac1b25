use std::sync::Arc;

use browser_ai_core::{
    Action, ChatMessage, CommandContext, CommandDetails, CommandResult, Config, Error,
    ExecutedAction, ExecutionOutcome, Result,
};
use browser_ai_providers::Provider;
use browser_ai_tools::{
    content_text, todo_write_descriptor, ActionKind, TaskPlanningState, ToolCatalog,
    ToolExecutionClient, TODO_WRITE_TOOL,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::parser::ActionPlanParser;
use crate::prompts;

/// Where the orchestrator is in the current (or last) command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    /// Waiting for the model's next turn.
    Planning,
    /// Running the actions of one parsed plan, in order.
    Executing,
    Done,
    Aborted,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_iterations: u32,
    pub validate_actions: bool,
    /// Action whose text content is fed back untruncated.
    pub snapshot_tool: String,
    /// Leading system message, ahead of the automation instructions.
    pub system_preamble: Option<String>,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            temperature: config.agent.temperature,
            max_tokens: config.agent.max_tokens,
            max_iterations: config.agent.max_iterations,
            validate_actions: config.agent.validate_actions,
            snapshot_tool: config.agent.snapshot_tool.clone(),
            system_preamble: config.provider.system_preamble.clone(),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Drives one command at a time: ask the model, parse, execute, feed results
/// back, until the model answers in prose or the iteration cap is reached.
pub struct AutomationOrchestrator {
    provider: Arc<dyn Provider>,
    executor: ToolExecutionClient,
    catalog: ToolCatalog,
    planning: TaskPlanningState,
    settings: OrchestratorSettings,
    system_prompt: String,
    state: OrchestratorState,
}

impl AutomationOrchestrator {
    /// Build the catalog from the executor's capability table plus the
    /// internal planning action. The executor must already be connected.
    pub fn new(
        provider: Arc<dyn Provider>,
        executor: ToolExecutionClient,
        settings: OrchestratorSettings,
    ) -> Result<Self> {
        if !executor.is_connected() {
            return Err(Error::NotConnected(
                "automation backend must be connected before building the orchestrator".to_string(),
            ));
        }

        let mut catalog =
            ToolCatalog::with_descriptors(executor.capabilities().iter().cloned())?;
        catalog.register(todo_write_descriptor())?;

        let system_prompt = prompts::system_prompt(&catalog.describe_external_only());
        info!(actions = catalog.len(), "Orchestrator ready");

        Ok(Self {
            provider,
            executor,
            catalog,
            planning: TaskPlanningState::new(),
            settings,
            system_prompt,
            state: OrchestratorState::Idle,
        })
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn planning(&self) -> &TaskPlanningState {
        &self.planning
    }

    pub fn executor(&self) -> &ToolExecutionClient {
        &self.executor
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn transition(&mut self, next: OrchestratorState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "State transition");
            self.state = next;
        }
    }

    fn initial_messages(&self, command: &str, context: Option<&CommandContext>) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(3);
        if let Some(preamble) = self.settings.system_preamble.as_deref() {
            messages.push(ChatMessage::system(preamble));
        }
        messages.push(ChatMessage::system(&self.system_prompt));
        messages.push(ChatMessage::user(&prompts::tool_selection_prompt(command, context)));
        messages
    }

    /// Run one natural-language command to completion.
    ///
    /// Per-action failures are recorded and fed back to the model; only a
    /// failed model call ends the command early.
    pub async fn execute_command(
        &mut self,
        command: &str,
        context: Option<&CommandContext>,
    ) -> CommandResult {
        info!(command = %command, "Executing command");
        let mut messages = self.initial_messages(command, context);
        let mut details = CommandDetails::default();
        let mut final_response: Option<String> = None;

        for iteration in 0..self.settings.max_iterations {
            self.transition(OrchestratorState::Planning);
            debug!(iteration, "Model call");

            let text = match self
                .provider
                .invoke(&messages, self.settings.temperature, self.settings.max_tokens)
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, iteration, "Model invocation failed, aborting command");
                    self.transition(OrchestratorState::Aborted);
                    return CommandResult::aborted(e);
                }
            };

            let plan = ActionPlanParser::parse(&text);
            if plan.is_final_answer() {
                info!(iteration, "Model returned final answer");
                final_response = Some(text);
                break;
            }

            self.transition(OrchestratorState::Executing);
            info!(iteration, actions = plan.len(), "Executing plan");

            let mut result_lines = Vec::with_capacity(plan.len());
            for action in &plan.actions {
                let outcome = self.dispatch(action).await;
                let line = self.render_result_line(&action.name, &outcome);

                if outcome.success {
                    details.executed_actions.push(ExecutedAction {
                        tool: action.name.clone(),
                        args: action.arguments.clone(),
                        result: outcome.result.unwrap_or(Value::Null),
                    });
                } else {
                    let error = outcome.error.unwrap_or_default();
                    warn!(tool = %action.name, error = %error, "Action failed");
                    details.executed_actions.push(ExecutedAction {
                        tool: action.name.clone(),
                        args: action.arguments.clone(),
                        result: Value::String(error),
                    });
                    details.errors.push(line.clone());
                }
                result_lines.push(line);
            }

            messages.push(ChatMessage::assistant(&text));
            messages.push(ChatMessage::user(&prompts::continuation_prompt(&result_lines)));
        }

        let response = match final_response {
            Some(text) => text,
            None => {
                warn!(max_iterations = self.settings.max_iterations, "Reached max iterations");
                prompts::iteration_cap_message(&details.errors)
            }
        };

        self.transition(OrchestratorState::Done);
        info!(
            actions = details.executed_actions.len(),
            errors = details.errors.len(),
            "Command finished"
        );

        CommandResult {
            success: details.errors.is_empty(),
            response,
            details: Some(details),
        }
    }

    /// Route by catalog kind. Unknown names go to the executor, which
    /// reports them as not found.
    async fn dispatch(&mut self, action: &Action) -> ExecutionOutcome {
        match self.catalog.kind_of(&action.name) {
            Some(ActionKind::Internal) => self.run_internal(action),
            Some(ActionKind::External) => {
                if self.settings.validate_actions {
                    if let Some(reason) = self.catalog.validation_error(action) {
                        return ExecutionOutcome::failed(format!(
                            "Invalid arguments for '{}': {}",
                            action.name, reason
                        ));
                    }
                }
                self.executor.execute(&action.name, action.arguments.clone()).await
            }
            None => self.executor.execute(&action.name, action.arguments.clone()).await,
        }
    }

    fn run_internal(&mut self, action: &Action) -> ExecutionOutcome {
        match action.name.as_str() {
            TODO_WRITE_TOOL => match self.planning.replace_from_arguments(&action.arguments) {
                Ok(()) => {
                    let count = self.planning.list().len();
                    debug!(count, "Todo list updated");
                    ExecutionOutcome::ok(json!({
                        "message": "Todo list updated",
                        "todoCount": count,
                    }))
                }
                Err(e) => ExecutionOutcome::failed(e.to_string()),
            },
            other => ExecutionOutcome::failed(format!("Unknown internal tool: {}", other)),
        }
    }

    fn render_result_line(&self, name: &str, outcome: &ExecutionOutcome) -> String {
        if !outcome.success {
            return format!("{}: {}", name, outcome.error.as_deref().unwrap_or_default());
        }

        match &outcome.result {
            Some(result) if name == self.settings.snapshot_tool => {
                let text = content_text(result);
                let content = if text.is_empty() { result.to_string() } else { text };
                format!("{}: Success\nContent:\n{}", name, content)
            }
            Some(result) if !result.is_null() => format!("{}: Success\nResult: {}", name, result),
            _ => format!("{}: Success", name),
        }
    }
}
