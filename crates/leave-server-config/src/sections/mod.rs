// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod audit;
mod auth;
mod backup;
mod database;
mod http;
mod logging;
mod policy;
mod smtp;

pub use audit::{AuditConfig, AuditConfigLayer};
pub use auth::{AuthConfig, AuthConfigLayer, DEV_TOKEN_SECRET};
pub use backup::{BackupConfig, BackupConfigLayer};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use policy::{AttributePolicyLayer, PolicyConfigLayer, WorkingHoursLayer};
pub use smtp::{SmtpConfig, SmtpConfigLayer, TlsMode};
