//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Top-level canvas-pilot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker: Option<TrackerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fanout: Option<FanoutConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub macros: Option<MacrosConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Upstream canvas server connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the canvas server, e.g. `https://canvas.local:443`.
    pub base_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// Header carrying the access token (default: "Private-Token").
    #[serde(default = "default_auth_header")]
    pub auth_header: String,

    /// Per-call timeout for discrete REST requests (default: 30).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Accept self-signed certificates (default: false).
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_auth_header() -> String {
    "Private-Token".into()
}

fn default_request_timeout() -> u64 {
    30
}

impl ServerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            token_env: None,
            auth_header: default_auth_header(),
            request_timeout_secs: default_request_timeout(),
            accept_invalid_certs: false,
        }
    }

    /// Resolve the access token: check `token` first, then `token_env`.
    pub fn resolve_token(&self) -> Option<String> {
        resolve_secret_field(&self.token, &self.token_env)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Identity of this installation on the canvas server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Installation name registered with the server. Falls back to the host name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installation_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
}

fn default_port() -> u16 {
    8090
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Fixed wait between subscription attempts (default: 5).
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

fn default_reconnect_delay() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutConfig {
    /// How often each subscriber polls the tracker (default: 1000).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacrosConfig {
    /// Attempts per widget mutation before it is counted as failed (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff step between attempts in ms (default: 50). 0 disables backoff.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Upper bound on a single backoff step in ms (default: 1000).
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    50
}

fn default_retry_max_delay() -> u64 {
    1000
}

impl Default for MacrosConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "canvas_pilot_tracker=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    static PATTERN: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
        regex::Regex::new(r"\$\{([^}]+)\}").expect("static pattern compiles")
    });
    PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    ///
    /// A missing file is not an error and yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parse config text (JSON5) after env substitution.
    pub fn parse(raw: &str) -> Result<Self> {
        let substituted = substitute_env_vars(raw);
        json5::from_str(&substituted).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Default config file location.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn gateway_port(&self) -> u16 {
        self.gateway.as_ref().map(|g| g.port).unwrap_or(8090)
    }

    pub fn gateway_bind(&self) -> String {
        self.gateway
            .as_ref()
            .and_then(|g| g.bind.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string())
    }

    pub fn installation_name(&self) -> Option<&str> {
        self.client
            .as_ref()
            .and_then(|c| c.installation_name.as_deref())
            .filter(|n| !n.trim().is_empty())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(
            self.tracker
                .as_ref()
                .map(|t| t.reconnect_delay_secs)
                .unwrap_or(5),
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.fanout
                .as_ref()
                .map(|f| f.poll_interval_ms)
                .unwrap_or(1000),
        )
    }

    pub fn macros(&self) -> MacrosConfig {
        self.macros.clone().unwrap_or_default()
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        match &self.server {
            None => errors.push("No server configured (server.base_url)".to_string()),
            Some(server) => {
                if server.base_url.trim().is_empty() {
                    errors.push("Server base_url cannot be empty".to_string());
                } else if !server.base_url.starts_with("http://")
                    && !server.base_url.starts_with("https://")
                {
                    errors.push(format!(
                        "Server base_url must start with http:// or https://: {}",
                        server.base_url
                    ));
                }
                if server.resolve_token().is_none() {
                    warnings.push("Server has no access token configured".to_string());
                }
                if server.request_timeout_secs == 0 {
                    errors.push("Server request_timeout_secs cannot be 0".to_string());
                }
            }
        }

        if let Some(gw) = &self.gateway {
            if gw.port == 0 {
                errors.push("Gateway port cannot be 0".to_string());
            }
        }

        if let Some(m) = &self.macros {
            if m.max_attempts == 0 {
                errors.push("macros.max_attempts must be at least 1".to_string());
            }
        }

        if self.installation_name().is_none() {
            warnings.push(
                "No client.installation_name set; the host name will be used".to_string(),
            );
        }

        (warnings, errors)
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for canvas-pilot data: `~/.canvas_pilot/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".canvas_pilot")
}
