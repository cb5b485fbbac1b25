use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use browser_ai_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

use crate::{ActionDescriptor, Backend};

const PROTOCOL_VERSION: &str = "2024-11-05";

// ─── JSON-RPC types ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<u64>,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

// ─── MCP tool schema types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct McpTool {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Option<Value>,
}

impl From<McpTool> for ActionDescriptor {
    fn from(tool: McpTool) -> Self {
        ActionDescriptor::external(
            tool.name,
            tool.description.unwrap_or_default(),
            tool.input_schema.unwrap_or_else(|| serde_json::json!({})),
        )
    }
}

// ─── MCP Client ───────────────────────────────────────────────────────────────

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<std::result::Result<Value, String>>>>>;

/// Stdio connection to the automation backend (a Playwright MCP server).
pub struct McpClient {
    server_name: String,
    stdin: Arc<Mutex<ChildStdin>>,
    next_id: Arc<AtomicU64>,
    pending: PendingMap,
    tools: Arc<Mutex<Vec<McpTool>>>,
    closed: Arc<AtomicBool>,
    child: Arc<Mutex<Child>>,
}

impl McpClient {
    /// Launch the backend child process and perform the MCP initialization handshake.
    pub async fn start(
        server_name: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        cwd: Option<&str>,
    ) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        for (k, v) in env {
            cmd.env(k, v);
        }
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        info!(server = %server_name, command, ?args, "Spawning backend");
        let mut child = cmd.spawn().map_err(|e| {
            Error::Backend(format!(
                "MCP[{}]: failed to spawn '{}': {}",
                server_name, command, e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Backend(format!("MCP[{}]: no stdin", server_name)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Backend(format!("MCP[{}]: no stdout", server_name)))?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        // Background task: read newline-delimited JSON-RPC responses from stdout
        tokio::spawn(Self::reader_task(
            stdout,
            pending.clone(),
            closed.clone(),
            server_name.to_string(),
        ));

        let client = Self {
            server_name: server_name.to_string(),
            stdin: Arc::new(Mutex::new(stdin)),
            next_id: Arc::new(AtomicU64::new(1)),
            pending,
            tools: Arc::new(Mutex::new(Vec::new())),
            closed,
            child: Arc::new(Mutex::new(child)),
        };

        client.initialize().await?;
        client.refresh_tools().await?;

        Ok(client)
    }

    fn transport_error(&self, what: &str, e: impl std::fmt::Display) -> Error {
        Error::Backend(format!("MCP[{}]: {} error: {}", self.server_name, what, e))
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| self.transport_error("write", e))?;
        stdin
            .write_all(b"\n")
            .await
            .map_err(|e| self.transport_error("write", e))?;
        stdin
            .flush()
            .await
            .map_err(|e| self.transport_error("flush", e))
    }

    /// Send a JSON-RPC request and wait for the response.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Backend(format!(
                "MCP[{}]: server closed",
                self.server_name
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        };

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let line = serde_json::to_string(&req).map_err(|e| self.transport_error("serialize", e))?;
        debug!(server = %self.server_name, id, method, "MCP → request");

        if let Err(e) = self.write_line(&line).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        rx.await
            .map_err(|_| Error::Backend(format!("MCP[{}]: server closed", self.server_name)))?
            .map_err(|e| Error::Backend(format!("MCP[{}]: {}", self.server_name, e)))
    }

    /// MCP initialize + initialized notification
    async fn initialize(&self) -> Result<()> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "browser-ai-client",
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        let result = self.request("initialize", Some(params)).await?;
        debug!(server = %self.server_name, ?result, "MCP initialized");

        let notif = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        });
        self.write_line(&notif.to_string()).await?;
        info!(server = %self.server_name, "Connected to backend");
        Ok(())
    }

    /// Fetch tools/list and cache it locally.
    pub async fn refresh_tools(&self) -> Result<()> {
        let result = self.request("tools/list", None).await?;
        let tools: Vec<McpTool> = serde_json::from_value(
            result.get("tools").cloned().unwrap_or(Value::Array(vec![])),
        )
        .map_err(|e| self.transport_error("parse tools", e))?;
        info!(server = %self.server_name, count = tools.len(), "Discovered backend tools");
        *self.tools.lock().await = tools;
        Ok(())
    }

    /// Return the cached tool list.
    pub async fn list_tools(&self) -> Vec<McpTool> {
        self.tools.lock().await.clone()
    }

    /// Terminate the backend process.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut child = self.child.lock().await;
        if let Err(e) = child.kill().await {
            debug!(server = %self.server_name, error = %e, "Backend already exited");
        }
        info!(server = %self.server_name, "Disconnected from backend");
    }

    /// Background reader task: dispatches incoming JSON-RPC responses to waiting callers.
    async fn reader_task(
        stdout: ChildStdout,
        pending: PendingMap,
        closed: Arc<AtomicBool>,
        server_name: String,
    ) {
        let reader = BufReader::new(stdout);
        let mut lines = reader.lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) if !line.trim().is_empty() => {
                    debug!(server = %server_name, "MCP ← {}", truncate(&line, 200));
                    match serde_json::from_str::<JsonRpcResponse>(&line) {
                        Ok(resp) => {
                            if let Some(id) = resp.id {
                                let mut map = pending.lock().await;
                                if let Some(tx) = map.remove(&id) {
                                    let payload = if let Some(err) = resp.error {
                                        Err(format!("JSON-RPC error {}: {}", err.code, err.message))
                                    } else {
                                        Ok(resp.result.unwrap_or(Value::Null))
                                    };
                                    let _ = tx.send(payload);
                                }
                            }
                            // Notifications (no id) are ignored.
                        }
                        Err(e) => {
                            warn!(server = %server_name, "MCP: failed to parse response: {}", e);
                        }
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    error!(server = %server_name, "MCP: stdout closed");
                    break;
                }
                Err(e) => {
                    error!(server = %server_name, "MCP: read error: {}", e);
                    break;
                }
            }
        }

        closed.store(true, Ordering::SeqCst);
        let mut map = pending.lock().await;
        for (_, tx) in map.drain() {
            let _ = tx.send(Err("MCP server stdout closed".to_string()));
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl Backend for McpClient {
    async fn list_capabilities(&self) -> Result<Vec<ActionDescriptor>> {
        Ok(self
            .list_tools()
            .await
            .into_iter()
            .map(ActionDescriptor::from)
            .collect())
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<Value> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments
        });
        self.request("tools/call", Some(params)).await
    }
}
