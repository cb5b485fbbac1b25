use std::sync::Arc;

use browser_ai_agent::AutomationOrchestrator;
use browser_ai_core::{CommandContext, Config, AUTH_REQUIRED_MARKER};
use browser_ai_providers::CredentialSource;
use browser_ai_tools::McpClient;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{build_orchestrator, connect_backend, load_config, token_manager, Overrides};

const PROTOCOL_VERSION: &str = "2024-11-05";
const TOOL_NAME: &str = "browser_ai";
const AUTH_REMEDIATION: &str =
    "Authentication required. Please run `browser-ai auth` to authenticate.";

const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const PARSE_ERROR: i64 = -32700;

#[derive(Debug, Deserialize)]
struct BrowserAiArgs {
    command: String,
    #[serde(default)]
    context: Option<CommandContext>,
}

fn tool_definition() -> Value {
    json!({
        "name": TOOL_NAME,
        "description": "Execute browser automation tasks using natural language commands. The command is translated into Playwright browser actions which are run until the task is complete.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Natural language description of the browser task to perform"
                },
                "context": {
                    "type": "object",
                    "properties": {
                        "url": {
                            "type": "string",
                            "description": "Current URL or target URL for the automation"
                        },
                        "sessionId": {
                            "type": "string",
                            "description": "Session ID for continuing previous automation"
                        }
                    }
                }
            },
            "required": ["command"]
        }
    })
}

fn text_result(text: &str, is_error: bool) -> Value {
    json!({
        "content": [{"type": "text", "text": text}],
        "isError": is_error,
    })
}

/// Tool-level failure; anything carrying the auth marker becomes the login hint.
fn failure_result(message: &str) -> Value {
    if message.contains(AUTH_REQUIRED_MARKER) {
        warn!("Authentication required");
        return text_result(AUTH_REMEDIATION, true);
    }
    text_result(message, true)
}

fn rpc_result(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn rpc_error(id: Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}

/// Progress of the background backend connection.
#[derive(Clone)]
pub enum BackendState {
    Pending,
    Ready(Arc<McpClient>),
    Failed(String),
}

/// Serves the single `browser_ai` tool. Requests are handled one at a time,
/// so commands never overlap.
pub struct BrowserAiServer {
    config: Config,
    credentials: Arc<dyn CredentialSource>,
    backend: watch::Receiver<BackendState>,
    orchestrator: Option<AutomationOrchestrator>,
}

impl BrowserAiServer {
    pub fn new(
        config: Config,
        credentials: Arc<dyn CredentialSource>,
        backend: watch::Receiver<BackendState>,
    ) -> Self {
        Self {
            config,
            credentials,
            backend,
            orchestrator: None,
        }
    }

    /// Handle one JSON-RPC line. `None` for notifications.
    pub async fn handle_line(&mut self, line: &str) -> Option<Value> {
        let request: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Unparseable request");
                return Some(rpc_error(Value::Null, PARSE_ERROR, &format!("Parse error: {}", e)));
            }
        };

        let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
        let Some(id) = request.get("id").cloned() else {
            debug!(method, "Notification ignored");
            return None;
        };
        let params = request.get("params").cloned().unwrap_or(Value::Null);
        debug!(method, "Request");

        let response = match method {
            "initialize" => rpc_result(
                id,
                json!({
                    "protocolVersion": params
                        .get("protocolVersion")
                        .and_then(Value::as_str)
                        .unwrap_or(PROTOCOL_VERSION),
                    "capabilities": {"tools": {}},
                    "serverInfo": {
                        "name": "browser-ai",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            ),
            "ping" => rpc_result(id, json!({})),
            "tools/list" => rpc_result(id, json!({"tools": [tool_definition()]})),
            "tools/call" => {
                let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
                if name != TOOL_NAME {
                    return Some(rpc_error(id, INVALID_PARAMS, &format!("Unknown tool: {}", name)));
                }
                let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
                rpc_result(id, self.call_tool(arguments).await)
            }
            other => rpc_error(id, METHOD_NOT_FOUND, &format!("Method not found: {}", other)),
        };
        Some(response)
    }

    async fn call_tool(&mut self, arguments: Value) -> Value {
        let args: BrowserAiArgs = match serde_json::from_value(arguments) {
            Ok(a) => a,
            Err(e) => return text_result(&format!("Error: invalid arguments: {}", e), true),
        };

        let orchestrator = match self.orchestrator().await {
            Ok(o) => o,
            Err(e) => {
                error!(error = %e, "Could not prepare orchestrator");
                return failure_result(&format!("Error: {}", e));
            }
        };

        let result = orchestrator
            .execute_command(&args.command, args.context.as_ref())
            .await;

        // An aborted command carries no details; its response names the cause.
        if result.details.is_none() {
            return failure_result(&result.response);
        }
        text_result(&result.response, false)
    }

    /// Waits for the backend connection to settle. A dropped sender while
    /// still pending counts as a failure.
    async fn connected_backend(&mut self) -> anyhow::Result<Arc<McpClient>> {
        let state = match self
            .backend
            .wait_for(|s| !matches!(s, BackendState::Pending))
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => BackendState::Failed("connection task ended".to_string()),
        };
        match state {
            BackendState::Ready(client) => Ok(client),
            BackendState::Failed(reason) => Err(anyhow::anyhow!(
                "Playwright MCP backend is not connected ({}). Please ensure @playwright/mcp is installed.",
                reason
            )),
            BackendState::Pending => Err(anyhow::anyhow!("Playwright MCP backend is not connected")),
        }
    }

    /// Built on first use so setup problems surface on the call that hits them.
    async fn orchestrator(&mut self) -> anyhow::Result<&mut AutomationOrchestrator> {
        if self.orchestrator.is_none() {
            let backend = self.connected_backend().await?;
            self.credentials.get_valid_credential().await?;
            let orchestrator =
                build_orchestrator(&self.config, backend, self.credentials.clone()).await?;
            self.orchestrator = Some(orchestrator);
        }
        self.orchestrator
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("orchestrator unavailable"))
    }
}

/// Serve MCP on stdin/stdout until EOF or Ctrl-C. The backend connects in
/// the background; tool calls wait for it, protocol requests do not.
pub async fn run(overrides: &Overrides) -> anyhow::Result<()> {
    let (paths, config) = load_config(overrides)?;
    let credentials = token_manager(&paths, &config);

    let (backend_tx, backend_rx) = watch::channel(BackendState::Pending);
    let connect_config = config.clone();
    let connect = tokio::spawn(async move {
        let state = match connect_backend(&connect_config).await {
            Ok(client) => BackendState::Ready(client),
            Err(e) => {
                warn!(error = %e, "Failed to connect to Playwright MCP backend, calls will report it");
                BackendState::Failed(e.to_string())
            }
        };
        let _ = backend_tx.send(state);
    });

    let final_state = backend_rx.clone();
    let mut server = BrowserAiServer::new(config, credentials, backend_rx);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    info!("browser-ai MCP server started");

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    if let Some(response) = server.handle_line(&line).await {
                        stdout.write_all(response.to_string().as_bytes()).await?;
                        stdout.write_all(b"\n").await?;
                        stdout.flush().await?;
                    }
                }
                Ok(None) => {
                    info!("stdin closed, shutting down");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "stdin read error");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    connect.abort();
    let state = final_state.borrow().clone();
    if let BackendState::Ready(client) = state {
        client.shutdown().await;
    }
    Ok(())
}
