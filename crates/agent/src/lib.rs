pub mod orchestrator;
pub mod parser;
pub mod prompts;

pub use orchestrator::{AutomationOrchestrator, OrchestratorSettings, OrchestratorState};
pub use parser::{ActionPlanParser, DEFAULT_RATIONALE};
