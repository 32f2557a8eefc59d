// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health check types and component checks.
//!
//! Only the database can make the service unhealthy. Mail and background
//! jobs degrade it: requests still work, notifications or backups may not.

use leave_server_jobs::{HealthState, JobScheduler, JobsHealthStatus};
use leave_server_smtp::SmtpClient;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
	Healthy,
	Degraded,
	Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
	pub status: HealthStatus,
	pub latency_ms: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SmtpHealth {
	pub status: HealthStatus,
	pub latency_ms: u64,
	pub configured: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobsHealth {
	pub status: HealthStatus,
	#[serde(flatten)]
	pub detail: JobsHealthStatus,
}

#[derive(Debug, Serialize)]
pub struct HealthComponents {
	pub database: DatabaseHealth,
	pub smtp: SmtpHealth,
	pub jobs: JobsHealth,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: HealthStatus,
	pub timestamp: String,
	pub duration_ms: u64,
	pub version: &'static str,
	pub components: HealthComponents,
}

const DB_CHECK_TIMEOUT: Duration = Duration::from_millis(500);
const SMTP_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

fn elapsed_ms(start: Instant) -> u64 {
	u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

pub async fn check_database(pool: &SqlitePool) -> DatabaseHealth {
	let start = Instant::now();
	let result = timeout(
		DB_CHECK_TIMEOUT,
		sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool),
	)
	.await;
	let latency_ms = elapsed_ms(start);

	let (status, error) = match result {
		Ok(Ok(_)) => (HealthStatus::Healthy, None),
		Ok(Err(e)) => (HealthStatus::Unhealthy, Some(e.to_string())),
		Err(_) => (
			HealthStatus::Unhealthy,
			Some("database health check timed out".to_string()),
		),
	};
	DatabaseHealth {
		status,
		latency_ms,
		error,
	}
}

/// Without SMTP the server logs mail instead of sending it, which is a valid
/// development setup and reported as healthy.
pub async fn check_smtp(client: Option<&Arc<SmtpClient>>) -> SmtpHealth {
	let start = Instant::now();

	let (configured, status, error) = match client {
		None => (false, HealthStatus::Healthy, None),
		Some(client) => match timeout(SMTP_CHECK_TIMEOUT, client.check_health()).await {
			Ok(Ok(())) => (true, HealthStatus::Healthy, None),
			Ok(Err(e)) => (true, HealthStatus::Degraded, Some(e.to_string())),
			Err(_) => (
				true,
				HealthStatus::Degraded,
				Some("SMTP health check timed out".to_string()),
			),
		},
	};

	SmtpHealth {
		status,
		latency_ms: elapsed_ms(start),
		configured,
		error,
	}
}

pub async fn check_jobs(scheduler: &JobScheduler) -> JobsHealth {
	let detail = scheduler.health_status().await;
	let status = match detail.status {
		HealthState::Healthy => HealthStatus::Healthy,
		HealthState::Degraded | HealthState::Unhealthy => HealthStatus::Degraded,
	};
	JobsHealth { status, detail }
}

pub fn aggregate_status(components: &HealthComponents) -> HealthStatus {
	let statuses = [
		components.database.status,
		components.smtp.status,
		components.jobs.status,
	];

	if statuses.contains(&HealthStatus::Unhealthy) {
		HealthStatus::Unhealthy
	} else if statuses.contains(&HealthStatus::Degraded) {
		HealthStatus::Degraded
	} else {
		HealthStatus::Healthy
	}
}
