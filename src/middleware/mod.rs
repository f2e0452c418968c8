// ABOUTME: HTTP middleware for request tracing, request-id propagation, and CORS
// ABOUTME: Provides request ID generation, span creation, and the CORS layer for the router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// CORS configuration
pub mod cors;
/// Request ids and spans
pub mod tracing;

pub use cors::setup_cors;
pub use self::tracing::{
    create_request_span, create_turn_span, new_request_id, request_id_from_headers,
    MakeRequestUuid, REQUEST_ID_HEADER,
};
