pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::Config;
pub use error::{Error, Result, AUTH_REQUIRED_MARKER};
pub use paths::Paths;
pub use types::{
    Action, ActionPlan, ChatMessage, CommandContext, CommandDetails, CommandResult, Credential,
    ExecutedAction, ExecutionOutcome, Role,
};
