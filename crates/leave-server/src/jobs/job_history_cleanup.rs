// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use chrono::{Duration, Utc};
use leave_server_db::JobRepository;
use leave_server_jobs::{Job, JobContext, JobError, JobOutput};
use std::sync::Arc;

pub const JOB_HISTORY_CLEANUP_JOB_ID: &str = "job-history-cleanup";

/// Deletes finished `job_runs` rows older than the retention window.
pub struct JobHistoryCleanupJob {
	repository: Arc<JobRepository>,
	retention_days: i64,
}

impl JobHistoryCleanupJob {
	pub fn new(repository: Arc<JobRepository>, retention_days: i64) -> Self {
		Self {
			repository,
			retention_days,
		}
	}
}

#[async_trait]
impl Job for JobHistoryCleanupJob {
	fn id(&self) -> &str {
		JOB_HISTORY_CLEANUP_JOB_ID
	}

	fn name(&self) -> &str {
		"Job History Cleanup"
	}

	fn description(&self) -> &str {
		"Removes old job run history entries"
	}

	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		if ctx.cancellation_token.is_cancelled() {
			return Err(JobError::Cancelled);
		}

		let cutoff = Utc::now() - Duration::days(self.retention_days);
		match self.repository.prune_runs(cutoff).await {
			Ok(count) => {
				tracing::info!(
					deleted = count,
					retention_days = self.retention_days,
					"job history cleanup completed"
				);
				Ok(JobOutput {
					message: format!("Cleaned up {count} old job run records"),
					metadata: Some(serde_json::json!({
						"deleted_count": count,
						"retention_days": self.retention_days
					})),
				})
			}
			Err(e) => Err(JobError::retryable(format!("job history cleanup failed: {e}"))),
		}
	}
}
