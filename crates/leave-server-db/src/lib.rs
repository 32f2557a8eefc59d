// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for the leave server.
//!
//! Each table family has a `*Store` trait and a `*Repository` holding a
//! [`SqlitePool`](sqlx::SqlitePool). The repositories also implement the
//! storage traits the auth crate defines, so the login pipeline and the access
//! engine run directly against the database:
//!
//! - [`UserRepository`] implements [`leave_server_auth::CredentialStore`]
//! - [`LeaveRepository`] implements [`leave_server_auth::ResourceSnapshotStore`]

pub mod audit_log;
pub mod error;
pub mod job;
pub mod leave;
pub mod migrations;
pub mod pool;
pub mod user;

#[cfg(test)]
pub(crate) mod testing;

pub use audit_log::{
	AuditActor, AuditLogFilter, AuditLogPage, AuditLogRecord, AuditLogRepository, AuditLogStore,
	DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use error::{DbError, Result};
pub use job::{JobDefinition, JobRepository, JobRun, JobStatus, JobStore, TriggerSource};
pub use leave::{
	LeaveRepository, LeaveRequest, LeaveStatus, LeaveStore, LeaveType, LeaveUpdate, NewLeaveRequest,
};
pub use migrations::run_migrations;
pub use pool::create_pool;
pub use user::{UserProfile, UserRepository, UserStore};
