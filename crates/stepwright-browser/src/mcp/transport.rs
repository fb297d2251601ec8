//! MCP Transport Layer
//!
//! Spawns the MCP server as a child process and exchanges newline-delimited
//! JSON-RPC messages over its stdin/stdout.

use super::protocol::{McpError, McpNotification, McpRequest, McpResponse, McpResult};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// MCP server process configuration
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Server name (for logs)
    pub name: String,
    /// Command to run
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Extra environment variables
    pub env: HashMap<String, String>,
    /// How long to wait for each response
    pub request_timeout: Duration,
}

impl McpServerConfig {
    /// Create a config for `command args...` with the default 60s timeout
    pub fn new(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
            env: HashMap::new(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<McpResponse>>>>;

/// Active MCP server connection
pub struct McpConnection {
    /// Server name
    pub name: String,
    request_id: AtomicU64,
    pending: Pending,
    process: Mutex<Option<Child>>,
    stdin: Mutex<Option<ChildStdin>>,
    request_timeout: Duration,
}

impl McpConnection {
    /// Spawn the server process and start the reader threads
    pub fn start(config: &McpServerConfig) -> McpResult<Self> {
        info!(command = %config.command, args = ?config.args, "Starting MCP server process");

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        for (key, value) in &config.env {
            // Expand environment variable references
            let expanded = if value.starts_with("${") && value.ends_with('}') {
                let var_name = &value[2..value.len() - 1];
                std::env::var(var_name).unwrap_or_else(|_| {
                    warn!(var = %var_name, key = %key, "Environment variable not found, using empty string");
                    String::new()
                })
            } else {
                value.clone()
            };
            cmd.env(key, expanded);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| McpError::Transport(format!("Failed to spawn MCP server: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("Failed to get stdin handle".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("Failed to get stdout handle".to_string()))?;
        let stderr = child.stderr.take();

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let reader_pending = pending.clone();
        let server_name = config.name.clone();
        std::thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    Ok(line) if !line.trim().is_empty() => {
                        dispatch_line(&server_name, &line, &reader_pending);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(server = %server_name, error = %e, "Read error");
                        break;
                    }
                }
            }
            // Dropping the senders fails every in-flight request
            reader_pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clear();
            info!(server = %server_name, "MCP server reader thread exited");
        });

        if let Some(stderr) = stderr {
            let server_name = config.name.clone();
            std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                    debug!(server = %server_name, "{}", line);
                }
            });
        }

        Ok(Self {
            name: config.name.clone(),
            request_id: AtomicU64::new(1),
            pending,
            process: Mutex::new(Some(child)),
            stdin: Mutex::new(Some(stdin)),
            request_timeout: config.request_timeout,
        })
    }

    fn write_line(&self, json: &str) -> McpResult<()> {
        let mut guard = self.stdin.lock().unwrap_or_else(|e| e.into_inner());
        let stdin = guard
            .as_mut()
            .ok_or_else(|| McpError::Transport("Connection not started".to_string()))?;
        writeln!(stdin, "{}", json)
            .map_err(|e| McpError::Transport(format!("Failed to write to stdin: {}", e)))?;
        stdin
            .flush()
            .map_err(|e| McpError::Transport(format!("Failed to flush stdin: {}", e)))
    }

    /// Send a request and wait for response
    pub async fn send(&self, request: McpRequest) -> McpResult<McpResponse> {
        let id = request.id;
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);

        let json = serde_json::to_string(&request)
            .map_err(|e| McpError::Protocol(format!("Failed to serialize request: {}", e)))?;
        debug!(server = %self.name, method = %request.method, id, "Sending to MCP server");

        if let Err(e) = self.write_line(&json) {
            self.pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&id);
            return Err(e);
        }

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(McpError::Transport("Response channel closed".to_string()));
            }
            Err(_) => {
                self.pending
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&id);
                return Err(McpError::Timeout(self.request_timeout.as_secs()));
            }
        };

        if let Some(error) = response.error {
            return Err(McpError::Server {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response)
    }

    /// Send a notification (no response expected)
    pub fn notify(&self, notification: McpNotification) -> McpResult<()> {
        let json = serde_json::to_string(&notification)
            .map_err(|e| McpError::Protocol(format!("Failed to serialize notification: {}", e)))?;
        self.write_line(&json)
    }

    /// Get next request ID
    pub fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Stop the connection. Safe to call more than once.
    pub fn stop(&self) {
        self.stdin.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(mut process) = self.process.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = process.kill();
            let _ = process.wait();
            info!(server = %self.name, "MCP server process stopped");
        }
    }

    /// Check if connection is active
    pub fn is_active(&self) -> bool {
        self.stdin
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl Drop for McpConnection {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Route one stdout line to the request waiting on its id.
fn dispatch_line(server: &str, line: &str, pending: &Pending) {
    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!(server = %server, error = %e, "Failed to parse MCP message");
            return;
        }
    };

    // Server-initiated notifications carry no id
    if value.get("id").map_or(true, |id| id.is_null()) {
        debug!(server = %server, method = ?value.get("method"), "MCP notification");
        return;
    }

    match serde_json::from_value::<McpResponse>(value) {
        Ok(response) => {
            let mut pending = pending.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(sender) = pending.remove(&response.id) {
                let _ = sender.send(response);
            }
        }
        Err(e) => warn!(server = %server, error = %e, "Failed to parse MCP response"),
    }
}
