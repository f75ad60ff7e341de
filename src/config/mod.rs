//! Configuration (layered: code > env > defaults).

use std::str::FromStr;
use std::time::Duration;

use bon::Builder;
use strum::{Display, EnumString};

use crate::error::{Result, ToolweaveError};
use crate::util::retry::RetryPolicy;

pub const DEFAULT_MAX_TURNS: usize = 20;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;
pub const DEFAULT_STREAM_IDLE_TIMEOUT_MS: u64 = 120_000;

/// How tool calls opened in the same turn are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ToolExecutionMode {
    /// One at a time, in open order.
    #[default]
    Sequential,
    /// All at once; events are still emitted in open order.
    Concurrent,
}

/// Settings for one orchestrator.
#[derive(Debug, Clone, Builder)]
pub struct LoopConfig {
    /// Turns allowed before the loop fails with `MaxTurnsExceeded`.
    #[builder(default = DEFAULT_MAX_TURNS)]
    pub max_turns: usize,
    #[builder(default = DEFAULT_MAX_OUTPUT_TOKENS)]
    pub max_output_tokens: u32,
    pub system_prompt: Option<String>,
    /// `0` disables the idle timeout.
    #[builder(default = DEFAULT_STREAM_IDLE_TIMEOUT_MS)]
    pub stream_idle_timeout_ms: u64,
    pub tool_timeout_ms: Option<u64>,
    #[builder(default)]
    pub tool_execution: ToolExecutionMode,
    #[builder(default)]
    pub retry: RetryPolicy,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl LoopConfig {
    /// Load from environment variables, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, "TOOLWEAVE_MAX_TURNS")? {
            config.max_turns = v;
        }
        if let Some(v) = parse_var(&lookup, "TOOLWEAVE_MAX_OUTPUT_TOKENS")? {
            config.max_output_tokens = v;
        }
        if let Some(v) = parse_var(&lookup, "TOOLWEAVE_STREAM_IDLE_TIMEOUT_MS")? {
            config.stream_idle_timeout_ms = v;
        }
        config.tool_timeout_ms = parse_var(&lookup, "TOOLWEAVE_TOOL_TIMEOUT_MS")?;
        if let Some(concurrent) = parse_var::<bool>(&lookup, "TOOLWEAVE_CONCURRENT_TOOLS")? {
            config.tool_execution = if concurrent {
                ToolExecutionMode::Concurrent
            } else {
                ToolExecutionMode::Sequential
            };
        }
        config.system_prompt = lookup("TOOLWEAVE_SYSTEM_PROMPT").filter(|s| !s.is_empty());
        Ok(config)
    }

    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        (self.stream_idle_timeout_ms > 0).then(|| Duration::from_millis(self.stream_idle_timeout_ms))
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_ms.map(Duration::from_millis)
    }
}

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5";

/// Credentials and endpoint for the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl std::fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &"..")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            model: DEFAULT_ANTHROPIC_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Load `ANTHROPIC_API_KEY`, `ANTHROPIC_BASE_URL` and `ANTHROPIC_MODEL`.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("ANTHROPIC_API_KEY")
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ToolweaveError::Authentication("Missing ANTHROPIC_API_KEY".into()))?;
        let mut config = Self::new(api_key);
        if let Some(url) = lookup("ANTHROPIC_BASE_URL") {
            config = config.with_base_url(url);
        }
        if let Some(model) = lookup("ANTHROPIC_MODEL") {
            config = config.with_model(model);
        }
        Ok(config)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ToolweaveError::Configuration(format!("{key}={raw:?}: {e}"))),
    }
}
