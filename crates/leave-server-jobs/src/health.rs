// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::types::{JobRun, JobStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct JobHealthStatus {
	pub job_id: String,
	pub name: String,
	pub schedule: String,
	pub status: HealthState,
	pub last_run: Option<LastRunInfo>,
	pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastRunInfo {
	pub run_id: String,
	pub status: JobStatus,
	pub started_at: DateTime<Utc>,
	pub duration_ms: Option<i64>,
	pub error: Option<String>,
}

impl From<JobRun> for LastRunInfo {
	fn from(run: JobRun) -> Self {
		Self {
			run_id: run.id,
			status: run.status,
			started_at: run.started_at,
			duration_ms: run.duration_ms,
			error: run.error_message,
		}
	}
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
	Healthy,
	Degraded,
	Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobsHealthStatus {
	pub status: HealthState,
	pub jobs: Vec<JobHealthStatus>,
}

/// A job is degraded after one failed run and unhealthy after three in a row.
pub fn determine_health_state(last_run: Option<&JobRun>, consecutive_failures: u32) -> HealthState {
	match last_run.map(|r| r.status) {
		Some(JobStatus::Failed) if consecutive_failures >= 3 => HealthState::Unhealthy,
		Some(JobStatus::Failed) if consecutive_failures >= 1 => HealthState::Degraded,
		_ => HealthState::Healthy,
	}
}
