// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses credentials, upstream endpoints, polling, pacing, and server options from env vars
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration management

use crate::constants::{defaults, env_vars};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Strongly typed log level configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Default level
    #[default]
    Info,
    /// Verbose
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// Parse from string with fallback to `Info`
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Test runs
    Testing,
}

impl Environment {
    /// Parse from string with fallback to `Development`
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Granularity of relayed text events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmissionUnit {
    /// One `message` event per character (typing effect)
    #[default]
    Char,
    /// One `message` event per upstream delta
    Chunk,
}

impl FromStr for EmissionUnit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "char" | "character" => Ok(Self::Char),
            "chunk" | "delta" => Ok(Self::Chunk),
            other => Err(anyhow!("unknown emission unit '{other}' (expected char or chunk)")),
        }
    }
}

impl fmt::Display for EmissionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char => write!(f, "char"),
            Self::Chunk => write!(f, "chunk"),
        }
    }
}

/// Upstream assistant service settings
#[derive(Clone)]
pub struct AssistantConfig {
    /// Bearer token; absent means every chat request fails with `CONFIG_MISSING`
    pub api_key: Option<String>,
    /// Assistant identifier used when creating runs
    pub assistant_id: Option<String>,
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Value of the `OpenAI-Beta` header
    pub beta_header: String,
    /// Deadline for plain requests, and the longest silent gap a streamed run
    /// may have, in seconds
    pub timeout_secs: u64,
}

impl AssistantConfig {
    /// Names of required variables that are unset
    #[must_use]
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_key.is_none() {
            missing.push(env_vars::OPENAI_API_KEY);
        }
        if self.assistant_id.is_none() {
            missing.push(env_vars::ASSISTANT_ID);
        }
        missing
    }

    /// Whether both credentials are present
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.assistant_id.is_some()
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            assistant_id: None,
            base_url: defaults::OPENAI_BASE_URL.to_owned(),
            beta_header: defaults::OPENAI_BETA_HEADER.to_owned(),
            timeout_secs: defaults::UPSTREAM_TIMEOUT_SECS,
        }
    }
}

// Never print the API key
impl fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("assistant_id", &self.assistant_id)
            .field("base_url", &self.base_url)
            .field("beta_header", &self.beta_header)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Search API settings
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Instant answer API base URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::SEARCH_API_URL.to_owned(),
            timeout_secs: defaults::SEARCH_TIMEOUT_SECS,
        }
    }
}

/// Run orchestration settings
#[derive(Debug, Clone)]
pub struct OrchestrationConfig {
    /// Fixed interval between status checks in poll mode
    pub poll_interval_ms: u64,
    /// Poll mode gives up after this long
    pub poll_timeout_secs: u64,
    /// Issue an upstream cancel when the client disconnects mid-run
    pub cancel_on_disconnect: bool,
}

impl OrchestrationConfig {
    /// Poll interval as a `Duration`
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Poll timeout as a `Duration`
    #[must_use]
    pub const fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::RUN_POLL_INTERVAL_MS,
            poll_timeout_secs: defaults::RUN_POLL_TIMEOUT_SECS,
            cancel_on_disconnect: true,
        }
    }
}

/// Stream relay pacing settings
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Delay after each emitted unit
    pub char_delay_ms: u64,
    /// Character or chunk granularity
    pub emission_unit: EmissionUnit,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            char_delay_ms: defaults::RELAY_CHAR_DELAY_MS,
            emission_unit: EmissionUnit::Char,
        }
    }
}

/// CORS settings
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// `*` or a comma separated origin list
    pub allowed_origins: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: "*".to_owned(),
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Log level
    pub log_level: LogLevel,
    /// Deployment environment
    pub environment: Environment,
    /// Upstream assistant service
    pub assistant: AssistantConfig,
    /// Search API
    pub search: SearchConfig,
    /// Run orchestration
    pub orchestration: OrchestrationConfig,
    /// Stream relay pacing
    pub relay: RelayConfig,
    /// CORS
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: defaults::HTTP_PORT,
            log_level: LogLevel::default(),
            environment: Environment::default(),
            assistant: AssistantConfig::default(),
            search: SearchConfig::default(),
            orchestration: OrchestrationConfig::default(),
            relay: RelayConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Missing credentials are not an error here: the server starts and every
    /// chat request reports `CONFIG_MISSING` instead.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric, boolean, or enum variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let assistant_id = non_empty_var(env_vars::ASSISTANT_ID)
            .or_else(|| non_empty_var(env_vars::OPENAI_ASSISTANT_ID));

        let config = Self {
            http_port: parse_env(env_vars::HTTP_PORT, defaults::HTTP_PORT)?,
            log_level: LogLevel::from_str_or_default(
                &env::var(env_vars::RUST_LOG).unwrap_or_default(),
            ),
            environment: Environment::from_str_or_default(
                &env::var(env_vars::ENVIRONMENT).unwrap_or_default(),
            ),
            assistant: AssistantConfig {
                api_key: non_empty_var(env_vars::OPENAI_API_KEY),
                assistant_id,
                base_url: env_var_or(env_vars::OPENAI_BASE_URL, defaults::OPENAI_BASE_URL),
                beta_header: env_var_or(
                    env_vars::OPENAI_BETA_HEADER,
                    defaults::OPENAI_BETA_HEADER,
                ),
                timeout_secs: parse_env(
                    env_vars::UPSTREAM_TIMEOUT_SECS,
                    defaults::UPSTREAM_TIMEOUT_SECS,
                )?,
            },
            search: SearchConfig {
                base_url: env_var_or(env_vars::SEARCH_API_URL, defaults::SEARCH_API_URL),
                timeout_secs: parse_env(
                    env_vars::SEARCH_TIMEOUT_SECS,
                    defaults::SEARCH_TIMEOUT_SECS,
                )?,
            },
            orchestration: OrchestrationConfig {
                poll_interval_ms: parse_env(
                    env_vars::RUN_POLL_INTERVAL_MS,
                    defaults::RUN_POLL_INTERVAL_MS,
                )?,
                poll_timeout_secs: parse_env(
                    env_vars::RUN_POLL_TIMEOUT_SECS,
                    defaults::RUN_POLL_TIMEOUT_SECS,
                )?,
                cancel_on_disconnect: parse_bool_env(env_vars::CANCEL_RUN_ON_DISCONNECT, true)?,
            },
            relay: RelayConfig {
                char_delay_ms: parse_env(
                    env_vars::RELAY_CHAR_DELAY_MS,
                    defaults::RELAY_CHAR_DELAY_MS,
                )?,
                emission_unit: parse_env(env_vars::RELAY_EMISSION_UNIT, EmissionUnit::Char)?,
            },
            cors: CorsConfig {
                allowed_origins: env_var_or(env_vars::CORS_ALLOWED_ORIGINS, "*"),
            },
        };

        if config.orchestration.poll_interval_ms == 0 {
            return Err(anyhow!("{} must be greater than zero", env_vars::RUN_POLL_INTERVAL_MS));
        }

        let missing = config.assistant.missing_credentials();
        if !missing.is_empty() {
            warn!(
                missing = ?missing,
                "Assistant credentials not configured; chat requests will fail until they are set"
            );
        }

        Ok(config)
    }

    /// Human-readable configuration summary (no secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Assistant Relay Configuration:\n\
             - HTTP Port: {}\n\
             - Environment: {}\n\
             - Log Level: {}\n\
             - Assistant API: {}\n\
             - API Key: {}\n\
             - Assistant ID: {}\n\
             - Search API: {}\n\
             - Poll Interval: {}ms (timeout {}s)\n\
             - Relay Pacing: {}ms per {}\n\
             - Cancel On Disconnect: {}",
            self.http_port,
            self.environment,
            self.log_level,
            self.assistant.base_url,
            if self.assistant.api_key.is_some() {
                "configured"
            } else {
                "missing"
            },
            self.assistant.assistant_id.as_deref().unwrap_or("missing"),
            self.search.base_url,
            self.orchestration.poll_interval_ms,
            self.orchestration.poll_timeout_secs,
            self.relay.char_delay_ms,
            self.relay.emission_unit,
            self.orchestration.cancel_on_disconnect,
        )
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    non_empty_var(key).unwrap_or_else(|| default.to_owned())
}

/// Read a variable, treating empty values as unset
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Parse a variable with `FromStr`, falling back to `default` when unset
fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    non_empty_var(key).map_or(Ok(default), |raw| {
        raw.parse::<T>()
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("Invalid {key} value: {raw}"))
    })
}

/// Parse a boolean variable accepting `true/false/1/0/yes/no`
fn parse_bool_env(key: &str, default: bool) -> Result<bool> {
    non_empty_var(key).map_or(Ok(default), |raw| match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("Invalid {key} value: {raw}")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emission_unit_parsing() {
        assert_eq!("char".parse::<EmissionUnit>().unwrap(), EmissionUnit::Char);
        assert_eq!("Chunk".parse::<EmissionUnit>().unwrap(), EmissionUnit::Chunk);
        assert!("word".parse::<EmissionUnit>().is_err());
    }

    #[test]
    fn test_missing_credentials() {
        let mut config = AssistantConfig::default();
        assert_eq!(
            config.missing_credentials(),
            vec![env_vars::OPENAI_API_KEY, env_vars::ASSISTANT_ID]
        );

        config.api_key = Some("sk-test".to_owned());
        config.assistant_id = Some("asst_1".to_owned());
        assert!(config.is_configured());
        assert!(config.missing_credentials().is_empty());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = AssistantConfig {
            api_key: Some("sk-secret".to_owned()),
            ..AssistantConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("***"));
    }
}
