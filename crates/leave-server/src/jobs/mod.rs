// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background jobs run by the scheduler.

pub mod backup;
pub mod job_history_cleanup;

pub use backup::{BackupJob, BACKUP_JOB_ID};
pub use job_history_cleanup::{JobHistoryCleanupJob, JOB_HISTORY_CLEANUP_JOB_ID};
