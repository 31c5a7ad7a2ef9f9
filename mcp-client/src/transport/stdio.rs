//! Stdio transport: a child MCP server spoken to over newline-framed
//! stdin/stdout.
//!
//! The command runs under a platform shell wrapper with the parent
//! environment augmented by configured variables; `PATH` is prepended with
//! the usual package-manager bin directories so interpreter-managed servers
//! resolve. The command is checked for resolvability before spawning.
//!
//! Framing: one JSON-RPC message per `\n`-terminated line, so outbound
//! frames containing a raw newline are rejected. stderr is not protocol
//! traffic and is copied to the log.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::{check_frame_size, InboundFrames, InboundSender, Transport, TransportState};
use super::{StdioConfig, TransportOptions};
use crate::error::{McpResult, TransportError};

/// Directories prepended to `PATH` so package-manager-installed servers
/// resolve even under a minimal parent environment.
const EXTRA_PATH_DIRS: &[&str] = &["/usr/local/bin", "/opt/homebrew/bin"];

/// Stdio transport to a local child-process MCP server.
pub struct StdioTransport {
    config: StdioConfig,
    options: TransportOptions,
    state: Arc<StdMutex<TransportState>>,
    child: Arc<Mutex<Option<Child>>>,
    stdin: Option<ChildStdin>,
    inbound: Option<InboundFrames>,
    reader: Option<JoinHandle<()>>,
    stderr_reader: Option<JoinHandle<()>>,
}

impl StdioTransport {
    /// Create a new stdio transport. The process is spawned by `start()`.
    pub fn new(config: StdioConfig, options: TransportOptions) -> Self {
        Self {
            config,
            options,
            state: Arc::new(StdMutex::new(TransportState::Disconnected)),
            child: Arc::new(Mutex::new(None)),
            stdin: None,
            inbound: None,
            reader: None,
            stderr_reader: None,
        }
    }

    fn set_state(&self, state: TransportState) {
        *self.state.lock().expect("state lock poisoned") = state;
    }

    /// The `PATH` value the child runs with: extra bin dirs, then the
    /// inherited value.
    fn augmented_path() -> String {
        let mut dirs: Vec<String> = EXTRA_PATH_DIRS.iter().map(|d| d.to_string()).collect();
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(format!("{home}/.local/bin"));
        }
        if let Ok(inherited) = std::env::var("PATH") {
            dirs.push(inherited);
        }
        dirs.join(":")
    }

    /// Verify the configured command resolves to an executable, the way
    /// `which` would, against the augmented `PATH`.
    fn resolve_command(command: &str, path: &str) -> McpResult<PathBuf> {
        let candidate = Path::new(command);
        if candidate.components().count() > 1 {
            if is_executable(candidate) {
                return Ok(candidate.to_path_buf());
            }
            return Err(TransportError::InvalidState {
                reason: format!("command not executable: {command}"),
            }
            .into());
        }

        for dir in path.split(':').filter(|d| !d.is_empty()) {
            let full = Path::new(dir).join(command);
            if is_executable(&full) {
                return Ok(full);
            }
        }

        Err(TransportError::InvalidState {
            reason: format!("command not found on PATH: {command}"),
        }
        .into())
    }

    /// The shell-wrapped command line for the configured program.
    fn shell_command_line(&self) -> String {
        std::iter::once(&self.config.command)
            .chain(self.config.args.iter())
            .map(|part| shell_quote(part))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Reader task over the child's stdout: one frame per line.
    async fn read_stdout(
        stdout: tokio::process::ChildStdout,
        tx: InboundSender,
        child: Arc<Mutex<Option<Child>>>,
        state: Arc<StdMutex<TransportState>>,
        max_message_size: usize,
    ) {
        let mut lines = BufReader::new(stdout).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    tracing::debug!(bytes = trimmed.len(), "frame from server stdout");
                    let frame = if trimmed.len() > max_message_size {
                        Err(TransportError::MessageTooLarge {
                            limit: max_message_size,
                        }
                        .into())
                    } else {
                        Ok(Bytes::from(trimmed.to_string().into_bytes()))
                    };
                    if tx.send(frame).is_err() {
                        tracing::debug!("inbound receiver dropped, stopping stdout reader");
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "error reading server stdout");
                    break;
                }
            }
        }

        // EOF: if this is an orderly stop the owner already reaped the
        // child; otherwise map the exit status onto the stream.
        let exited = child.lock().await.take();
        let stopping = matches!(
            *state.lock().expect("state lock poisoned"),
            TransportState::Disconnecting | TransportState::Disconnected
        );
        if stopping {
            return;
        }

        match exited {
            Some(mut child) => match child.wait().await {
                Ok(status) if status.success() => {
                    tracing::info!("server process exited cleanly");
                    *state.lock().expect("state lock poisoned") = TransportState::Disconnected;
                }
                Ok(status) => {
                    let err = TransportError::OperationFailed {
                        detail: format!("server process exited with {status}"),
                    };
                    tracing::error!(%status, "server process failed");
                    *state.lock().expect("state lock poisoned") =
                        TransportState::Failed(err.clone());
                    let _ = tx.send(Err(err.into()));
                }
                Err(e) => {
                    let err = TransportError::OperationFailed {
                        detail: format!("failed to reap server process: {e}"),
                    };
                    *state.lock().expect("state lock poisoned") =
                        TransportState::Failed(err.clone());
                    let _ = tx.send(Err(err.into()));
                }
            },
            None => {
                tracing::debug!("stdout closed after child was reaped elsewhere");
            }
        }
    }

    /// Copy the child's stderr to the log, one line at a time.
    async fn read_stderr(stderr: tokio::process::ChildStderr) {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let trimmed = line.trim_end();
            if !trimmed.is_empty() {
                tracing::warn!(target: "mcp_client::server_stderr", "{trimmed}");
            }
        }
    }

    /// Kill the child if it is still running and await its exit.
    async fn reap_child(&self) {
        if let Some(mut child) = self.child.lock().await.take() {
            tracing::debug!(pid = ?child.id(), "terminating server process");
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "failed to kill server process");
            }
            match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
                Ok(Ok(status)) => tracing::debug!(%status, "server process exited"),
                Ok(Err(e)) => tracing::warn!(error = %e, "error awaiting server process"),
                Err(_) => tracing::warn!("server process did not exit within timeout"),
            }
        }
    }
}

/// Whether `path` is an existing executable file.
fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Quote one shell word, single-quote style.
fn shell_quote(word: &str) -> String {
    if !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:".contains(c))
    {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}

#[async_trait]
impl Transport for StdioTransport {
    async fn start(&mut self) -> McpResult<()> {
        match self.state() {
            TransportState::Connected => return Ok(()),
            TransportState::Disconnected => {}
            other => {
                return Err(TransportError::InvalidState {
                    reason: format!("cannot start transport while {other}"),
                }
                .into())
            }
        }

        self.config.validate()?;
        self.set_state(TransportState::Connecting);

        let path = Self::augmented_path();
        Self::resolve_command(&self.config.command, &path)?;

        let command_line = self.shell_command_line();
        tracing::info!(command = %command_line, "spawning server process");

        #[cfg(unix)]
        let mut command = {
            let mut c = Command::new("/bin/sh");
            c.arg("-c").arg(format!("exec {command_line}"));
            c
        };
        #[cfg(windows)]
        let mut command = {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&command_line);
            c
        };

        command
            .env("PATH", &path)
            .envs(&self.config.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            let err = TransportError::ConnectionFailed {
                detail: format!("failed to spawn server process: {e}"),
            };
            self.set_state(TransportState::Failed(err.clone()));
            err
        })?;

        let stdin = child.stdin.take().ok_or(TransportError::ConnectionFailed {
            detail: "failed to capture child stdin".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or(TransportError::ConnectionFailed {
            detail: "failed to capture child stdout".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or(TransportError::ConnectionFailed {
            detail: "failed to capture child stderr".to_string(),
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.inbound = Some(rx);
        self.stdin = Some(stdin);
        *self.child.lock().await = Some(child);

        self.reader = Some(tokio::spawn(Self::read_stdout(
            stdout,
            tx,
            Arc::clone(&self.child),
            Arc::clone(&self.state),
            self.options.max_message_size,
        )));
        self.stderr_reader = Some(tokio::spawn(Self::read_stderr(stderr)));

        self.set_state(TransportState::Connected);
        tracing::info!("stdio transport connected");
        Ok(())
    }

    async fn stop(&mut self) -> McpResult<()> {
        if self.state() == TransportState::Disconnected {
            return Ok(());
        }

        self.set_state(TransportState::Disconnecting);

        // closing stdin lets well-behaved servers exit on their own before
        // the kill below
        self.stdin = None;
        self.reap_child().await;

        if let Some(reader) = self.reader.take() {
            let _ = tokio::time::timeout(Duration::from_secs(1), reader).await;
        }
        if let Some(stderr_reader) = self.stderr_reader.take() {
            stderr_reader.abort();
        }
        self.inbound = None;

        self.set_state(TransportState::Disconnected);
        tracing::info!("stdio transport disconnected");
        Ok(())
    }

    fn state(&self) -> TransportState {
        self.state.lock().expect("state lock poisoned").clone()
    }

    fn inbound(&mut self) -> McpResult<InboundFrames> {
        self.inbound
            .take()
            .ok_or_else(|| {
                TransportError::InvalidState {
                    reason: "inbound stream unavailable: not started or already taken".to_string(),
                }
                .into()
            })
    }

    async fn send(&mut self, frame: Bytes, timeout: Option<Duration>) -> McpResult<()> {
        if self.state() != TransportState::Connected {
            return Err(TransportError::NotConnected.into());
        }
        check_frame_size(&frame, self.options.max_message_size)?;
        if frame.contains(&b'\n') {
            return Err(TransportError::InvalidMessage {
                detail: "frame contains the newline framing delimiter".to_string(),
            }
            .into());
        }

        let stdin = self.stdin.as_mut().ok_or(TransportError::NotConnected)?;
        let deadline = timeout.unwrap_or(self.options.send_timeout);

        let write = async {
            stdin.write_all(&frame).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await?;
            Ok::<_, std::io::Error>(())
        };

        match tokio::time::timeout(deadline, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::OperationFailed {
                detail: format!("failed to write to server stdin: {e}"),
            }
            .into()),
            Err(_) => Err(TransportError::Timeout {
                op: "stdio send".to_string(),
            }
            .into()),
        }
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(stderr_reader) = self.stderr_reader.take() {
            stderr_reader.abort();
        }
        // the child has kill_on_drop set; dropping the handle is enough
    }
}
