// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit trail for authentication outcomes, access decisions and
//! administrative actions.
//!
//! Handlers build an [`AuditLogEntry`] and hand it to [`AuditService::log`],
//! which enqueues without waiting. A background task fans each entry out to
//! the configured [`AuditSink`]s.

pub mod error;
pub mod event;
pub mod pipeline;
pub mod sink;

pub use error::{AuditError, AuditResult, AuditSinkError};
pub use event::{AuditEventType, AuditLogBuilder, AuditLogEntry, AuditOutcome, AuditSeverity};
pub use pipeline::AuditService;
pub use sink::AuditSink;

#[cfg(feature = "sink-sqlite")]
pub use sink::sqlite::SqliteAuditSink;

#[cfg(feature = "sink-tracing")]
pub use sink::tracing::TracingAuditSink;
