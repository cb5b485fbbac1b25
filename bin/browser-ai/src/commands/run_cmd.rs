use browser_ai_core::CommandContext;
use tracing::info;

use super::{build_orchestrator, connect_backend, load_config, token_manager, Overrides};

/// One-shot command execution; prints the `CommandResult` as JSON.
pub async fn run(
    overrides: &Overrides,
    message: &str,
    url: Option<String>,
    session: Option<String>,
) -> anyhow::Result<()> {
    let (paths, config) = load_config(overrides)?;
    let backend = connect_backend(&config).await?;

    let outcome = async {
        let mut orchestrator =
            build_orchestrator(&config, backend.clone(), token_manager(&paths, &config)).await?;
        let context = (url.is_some() || session.is_some()).then(|| CommandContext {
            url,
            session_id: session,
        });
        anyhow::Ok(orchestrator.execute_command(message, context.as_ref()).await)
    }
    .await;

    backend.shutdown().await;

    let result = outcome?;
    info!(success = result.success, "Command complete");
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
