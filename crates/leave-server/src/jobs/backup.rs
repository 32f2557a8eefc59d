// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Online SQLite backup.
//!
//! `VACUUM INTO` writes a consistent, compacted copy of the live database
//! without blocking readers. Scheduled runs audit themselves as
//! `AUTO_BACKUP`; manual runs are audited by the handler that triggered them,
//! which knows the acting administrator.

use async_trait::async_trait;
use chrono::Utc;
use leave_server_audit::{AuditEventType, AuditLogEntry, AuditService};
use leave_server_jobs::{Job, JobContext, JobError, JobOutput};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const BACKUP_JOB_ID: &str = "database-backup";

pub struct BackupJob {
	pool: SqlitePool,
	directory: PathBuf,
	audit: Arc<AuditService>,
}

impl BackupJob {
	pub fn new(pool: SqlitePool, directory: impl Into<PathBuf>, audit: Arc<AuditService>) -> Self {
		Self {
			pool,
			directory: directory.into(),
			audit,
		}
	}

	/// Write one backup file and return its path.
	#[tracing::instrument(skip(self), fields(directory = %self.directory.display()))]
	pub async fn backup_now(&self) -> Result<PathBuf, JobError> {
		tokio::fs::create_dir_all(&self.directory)
			.await
			.map_err(|e| JobError::failed(format!("cannot create backup directory: {e}")))?;

		let path = backup_path(&self.directory, Utc::now());
		let target = path.to_string_lossy().to_string();

		sqlx::query("VACUUM INTO ?")
			.bind(&target)
			.execute(&self.pool)
			.await
			.map_err(|e| JobError::retryable(format!("backup failed: {e}")))?;

		tracing::info!(file = %target, "database backup written");
		Ok(path)
	}
}

/// `<dir>/backup-<timestamp>.db`, with a filename-safe UTC timestamp.
fn backup_path(directory: &Path, at: chrono::DateTime<Utc>) -> PathBuf {
	directory.join(format!("backup-{}.db", at.format("%Y-%m-%dT%H-%M-%S%.3fZ")))
}

#[async_trait]
impl Job for BackupJob {
	fn id(&self) -> &str {
		BACKUP_JOB_ID
	}

	fn name(&self) -> &str {
		"Database Backup"
	}

	fn description(&self) -> &str {
		"Copies the live database into the backup directory"
	}

	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		if ctx.cancellation_token.is_cancelled() {
			return Err(JobError::Cancelled);
		}

		let result = self.backup_now().await;

		if !ctx.is_manual() {
			let entry = AuditLogEntry::builder(AuditEventType::AutoBackup).resource("backup", &ctx.run_id);
			let entry = match &result {
				Ok(path) => entry.detail("file", path.to_string_lossy().to_string()),
				Err(e) => entry.failed().detail("error", e.to_string()),
			};
			self.audit.log(entry.build());
		}

		let path = result?;
		let file = path.to_string_lossy().to_string();
		Ok(JobOutput {
			message: "Backup completed".to_string(),
			metadata: Some(serde_json::json!({ "file": file })),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use leave_server_db::{create_pool, run_migrations};

	#[test]
	fn file_name_is_timestamped() {
		let at = Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 7).unwrap();
		let path = backup_path(Path::new("/var/backups"), at);
		assert_eq!(
			path,
			PathBuf::from("/var/backups/backup-2025-03-04T00-00-07.000Z.db")
		);
	}

	#[tokio::test]
	async fn writes_a_readable_copy() {
		let dir = tempfile::tempdir().unwrap();
		let db_url = format!("sqlite:{}", dir.path().join("live.db").display());
		let pool = create_pool(&db_url).await.unwrap();
		run_migrations(&pool).await.unwrap();

		let job = BackupJob::new(
			pool,
			dir.path().join("backups"),
			Arc::new(AuditService::disabled()),
		);
		let path = job.backup_now().await.unwrap();
		assert!(path.exists());

		let copy = create_pool(&format!("sqlite:{}", path.display())).await.unwrap();
		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
			.fetch_one(&copy)
			.await
			.unwrap();
		assert_eq!(count, 0);
	}
}
