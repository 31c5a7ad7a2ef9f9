//! Transport configuration: endpoint selection plus the shared tunables.
//!
//! Configurations can be built programmatically or loaded from JSON, YAML,
//! or TOML files based on the file extension.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::retry::RetryPolicy;
use crate::error::{ConfigError, McpResult};

/// Transport selection and endpoint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Remote server over HTTP GET event stream + POST sends
    Sse(SseConfig),

    /// Local child process over newline-framed stdio
    Stdio(StdioConfig),
}

impl TransportConfig {
    /// Create an SSE transport configuration for the given URL.
    pub fn sse(url: impl AsRef<str>) -> McpResult<Self> {
        let url: Url = url.as_ref().parse().map_err(|e| ConfigError::InvalidValue {
            parameter: "url".to_string(),
            value: url.as_ref().to_string(),
            reason: format!("invalid URL: {e}"),
        })?;
        Ok(Self::Sse(SseConfig {
            url,
            headers: HashMap::new(),
        }))
    }

    /// Create a stdio transport configuration for the given command.
    pub fn stdio(command: impl Into<String>, args: &[impl ToString]) -> Self {
        Self::Stdio(StdioConfig {
            command: command.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            working_dir: None,
            env: HashMap::new(),
        })
    }

    /// A short name for the selected transport.
    pub fn transport_type(&self) -> &'static str {
        match self {
            Self::Sse(_) => "sse",
            Self::Stdio(_) => "stdio",
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> McpResult<()> {
        match self {
            Self::Sse(config) => config.validate(),
            Self::Stdio(config) => config.validate(),
        }
    }

    /// Load a configuration from a file; the format follows the extension
    /// (`.json`, `.yaml`/`.yml`, `.toml`).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> McpResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?
            }
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| ConfigError::InvalidFormat {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?
            }
            Some("toml") => toml::from_str(&content).map_err(|e| ConfigError::InvalidFormat {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?,
            _ => {
                return Err(ConfigError::InvalidFormat {
                    path: path.display().to_string(),
                    reason: "unsupported file format, use .json, .yaml, or .toml".to_string(),
                }
                .into())
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Save this configuration to a file; the format follows the extension.
    pub fn to_file(&self, path: impl AsRef<std::path::Path>) -> McpResult<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => {
                serde_json::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?
            }
            Some("yaml") | Some("yml") => {
                serde_yaml::to_string(self).map_err(|e| ConfigError::InvalidFormat {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?
            }
            Some("toml") => toml::to_string(self).map_err(|e| ConfigError::InvalidFormat {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?,
            _ => {
                return Err(ConfigError::InvalidFormat {
                    path: path.display().to_string(),
                    reason: "unsupported file format, use .json, .yaml, or .toml".to_string(),
                }
                .into())
            }
        };

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// SSE transport configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SseConfig {
    /// URL of the event stream; the POST URL is discovered in-band.
    pub url: Url,

    /// Additional HTTP headers merged into both the GET and POSTs.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl SseConfig {
    /// Add an HTTP header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Validate the SSE configuration.
    pub fn validate(&self) -> McpResult<()> {
        if self.url.scheme() != "http" && self.url.scheme() != "https" {
            return Err(ConfigError::InvalidValue {
                parameter: "url".to_string(),
                value: self.url.to_string(),
                reason: "URL must use http or https scheme".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Stdio transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdioConfig {
    /// Command to execute.
    pub command: String,

    /// Arguments for the command.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the child process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Environment variables set on top of the inherited environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl StdioConfig {
    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Validate the stdio configuration.
    pub fn validate(&self) -> McpResult<()> {
        if self.command.is_empty() {
            return Err(ConfigError::MissingParameter {
                parameter: "command".to_string(),
            }
            .into());
        }
        if let Some(dir) = &self.working_dir {
            if !dir.exists() {
                return Err(ConfigError::InvalidValue {
                    parameter: "working_dir".to_string(),
                    value: dir.display().to_string(),
                    reason: "directory does not exist".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Tunables shared by every transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportOptions {
    /// Maximum wait to establish the underlying connection.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Default outbound send deadline; also the per-request timeout.
    #[serde(with = "humantime_serde")]
    pub send_timeout: Duration,

    /// Hard limit on inbound and outbound frame sizes, in bytes.
    pub max_message_size: usize,

    /// Retry schedule for transient send failures.
    #[serde(default)]
    pub retry_policy: RetryPolicy,

    /// Optional periodic-ping health check. Carried in configuration; not
    /// wired to any task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckOptions>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(30),
            max_message_size: 4 * 1024 * 1024,
            retry_policy: RetryPolicy::default(),
            health_check: None,
        }
    }
}

impl TransportOptions {
    /// Set the send deadline.
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Set the connect deadline.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the frame size limit.
    pub fn max_message_size(mut self, limit: usize) -> Self {
        self.max_message_size = limit;
        self
    }

    /// Set the retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}

/// Optional health-check configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckOptions {
    /// Interval between health probes.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,
}
