use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SlickError};

/// Top-level SlickNXT configuration (`slicknxt.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Evaluation frequency. The nominal tick interval is `1 / tick_rate_hz`.
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: f64,
    /// Pending external inputs before new ones are dropped.
    #[serde(default = "default_input_queue_capacity")]
    pub input_queue_capacity: usize,
    /// Broadcast buffer per subscriber. Slower subscribers lose events.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Start evaluating as soon as the engine is up.
    #[serde(default)]
    pub autostart: bool,
    /// Flow description loaded at startup.
    #[serde(default)]
    pub flow_file: Option<PathBuf>,
}

fn default_tick_rate_hz() -> f64 { 10.0 }
fn default_input_queue_capacity() -> usize { 1024 }
fn default_event_capacity() -> usize { 256 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            input_queue_capacity: default_input_queue_capacity(),
            event_capacity: default_event_capacity(),
            autostart: false,
            flow_file: None,
        }
    }
}

impl EngineConfig {
    /// Nominal tick interval. Falls back to the default rate for
    /// non-positive or non-finite values.
    pub fn tick_interval(&self) -> Duration {
        let hz = if self.tick_rate_hz.is_finite() && self.tick_rate_hz > 0.0 {
            self.tick_rate_hz
        } else {
            warn!(tick_rate_hz = self.tick_rate_hz, "Invalid tick rate, using default");
            default_tick_rate_hz()
        };
        Duration::from_secs_f64(1.0 / hz)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token required on every route when set.
    #[serde(default)]
    pub token: Option<String>,
}

fn default_bind() -> String { "127.0.0.1:8000".to_string() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            token: None,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| SlickError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| SlickError::Config(e.to_string()))
    }

    /// Load `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Expand `${ENV_VAR}` patterns in a string. Unset variables are left as-is.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}
