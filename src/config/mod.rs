// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Exposes environment-driven configuration for the relay, upstream, and search clients
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration module for the assistant relay
//!
//! All configuration is read from environment variables at startup. See
//! [`environment::ServerConfig::from_env`] for the full list.

/// Environment and server configuration
pub mod environment;

pub use environment::{
    AssistantConfig, CorsConfig, EmissionUnit, Environment, LogLevel, OrchestrationConfig,
    RelayConfig, SearchConfig, ServerConfig,
};
