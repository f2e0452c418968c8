// ABOUTME: System-wide constants for the assistant relay
// ABOUTME: Environment variable names, defaults, upstream protocol values, and wire event names
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Constants Module
//!
//! Hardcoded protocol values and the defaults used when the corresponding
//! environment variable is absent.

/// Service identity used in logs and health responses
pub mod service_names {
    /// Name reported by logging and `/health`
    pub const ASSISTANT_RELAY: &str = "assistant-relay";

    /// Service version from Cargo.toml
    pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Environment variable names read by [`crate::config::environment::ServerConfig`]
pub mod env_vars {
    /// Assistant service bearer token
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    /// Assistant identifier
    pub const ASSISTANT_ID: &str = "ASSISTANT_ID";
    /// Alternate name for the assistant identifier
    pub const OPENAI_ASSISTANT_ID: &str = "OPENAI_ASSISTANT_ID";
    /// Assistant service base URL
    pub const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
    /// Value sent in the `OpenAI-Beta` header
    pub const OPENAI_BETA_HEADER: &str = "OPENAI_BETA_HEADER";
    /// Per-request upstream timeout
    pub const UPSTREAM_TIMEOUT_SECS: &str = "UPSTREAM_TIMEOUT_SECS";
    /// Search API base URL
    pub const SEARCH_API_URL: &str = "SEARCH_API_URL";
    /// Search request timeout
    pub const SEARCH_TIMEOUT_SECS: &str = "SEARCH_TIMEOUT_SECS";
    /// Fixed interval between run status checks
    pub const RUN_POLL_INTERVAL_MS: &str = "RUN_POLL_INTERVAL_MS";
    /// Upper bound on a polled run
    pub const RUN_POLL_TIMEOUT_SECS: &str = "RUN_POLL_TIMEOUT_SECS";
    /// Delay between relayed text units
    pub const RELAY_CHAR_DELAY_MS: &str = "RELAY_CHAR_DELAY_MS";
    /// `char` or `chunk`
    pub const RELAY_EMISSION_UNIT: &str = "RELAY_EMISSION_UNIT";
    /// Cancel the upstream run when the client disconnects
    pub const CANCEL_RUN_ON_DISCONNECT: &str = "CANCEL_RUN_ON_DISCONNECT";
    /// Listen port
    pub const HTTP_PORT: &str = "HTTP_PORT";
    /// Allowed CORS origins
    pub const CORS_ALLOWED_ORIGINS: &str = "CORS_ALLOWED_ORIGINS";
    /// Deployment environment
    pub const ENVIRONMENT: &str = "ENVIRONMENT";
    /// Log level
    pub const RUST_LOG: &str = "RUST_LOG";
}

/// Defaults applied when the environment is silent
pub mod defaults {
    /// Assistant service base URL
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
    /// Assistants API beta version
    pub const OPENAI_BETA_HEADER: &str = "assistants=v2";
    /// Upstream request timeout (seconds)
    pub const UPSTREAM_TIMEOUT_SECS: u64 = 60;
    /// Upstream connect timeout (seconds)
    pub const UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 10;
    /// `DuckDuckGo` Instant Answer API
    pub const SEARCH_API_URL: &str = "https://api.duckduckgo.com";
    /// Search request timeout (seconds)
    pub const SEARCH_TIMEOUT_SECS: u64 = 10;
    /// Run status poll interval (milliseconds)
    pub const RUN_POLL_INTERVAL_MS: u64 = 1000;
    /// Give up on a polled run after this many seconds
    pub const RUN_POLL_TIMEOUT_SECS: u64 = 300;
    /// Typing effect delay per character (milliseconds)
    pub const RELAY_CHAR_DELAY_MS: u64 = 10;
    /// HTTP listen port
    pub const HTTP_PORT: u16 = 8081;
    /// Page size when listing thread messages
    pub const MESSAGE_PAGE_LIMIT: u32 = 100;
}

/// Assistant service protocol values
pub mod upstream {
    /// Beta-version header required on every assistants call
    pub const BETA_HEADER_NAME: &str = "OpenAI-Beta";
    /// Stream terminator payload
    pub const DONE_SENTINEL: &str = "[DONE]";
    /// Run object stream events share this prefix
    pub const RUN_EVENT_PREFIX: &str = "thread.run.";
    /// Run step events (ignored by the relay)
    pub const RUN_STEP_EVENT_PREFIX: &str = "thread.run.step.";
    /// Incremental message text
    pub const MESSAGE_DELTA_EVENT: &str = "thread.message.delta";
    /// Upstream stream error event
    pub const ERROR_EVENT: &str = "error";
    /// Terminator event name
    pub const DONE_EVENT: &str = "done";
}

/// Tool names understood by the dispatcher
pub mod tools {
    /// Web search backed by the search API
    pub const WEB_SEARCH: &str = "web_search";
    /// Source label reported in search results
    pub const SEARCH_SOURCE: &str = "DuckDuckGo";
    /// Human-facing search URL used for fallback results
    pub const SEARCH_FALLBACK_URL: &str = "https://duckduckgo.com/";
}
