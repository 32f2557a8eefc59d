// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Leave management HTTP server.
//!
//! Employees file leave requests; managers, HR and administrators decide them.
//! Every protected route runs an ordered access chain, and every security
//! relevant action lands in the audit log.

pub mod api;
pub mod api_response;
pub mod auth_middleware;
pub mod authz;
pub mod client_info;
pub mod error;
pub mod health;
pub mod jobs;
pub mod notify;
pub mod pagination;
pub mod routes;

pub use api::{create_app_state, create_router, AppServices, AppState};
pub use error::ServerError;
pub use leave_server_config::ServerConfig;
