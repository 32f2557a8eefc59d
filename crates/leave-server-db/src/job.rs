// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scheduled job definitions and their run history.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{parse_timestamp, DbError, Result};

const RUN_COLUMNS: &str = "id, job_id, status, started_at, completed_at, duration_ms, \
	error_message, retry_count, triggered_by, metadata";

fn timestamp(t: DateTime<Utc>) -> String {
	t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	Running,
	Succeeded,
	Failed,
	Cancelled,
}

impl JobStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			JobStatus::Running => "running",
			JobStatus::Succeeded => "succeeded",
			JobStatus::Failed => "failed",
			JobStatus::Cancelled => "cancelled",
		}
	}
}

impl std::str::FromStr for JobStatus {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"running" => Ok(JobStatus::Running),
			"succeeded" => Ok(JobStatus::Succeeded),
			"failed" => Ok(JobStatus::Failed),
			"cancelled" => Ok(JobStatus::Cancelled),
			_ => Err(format!("unknown job status: {s}")),
		}
	}
}

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
	Schedule,
	Manual,
	Retry,
}

impl TriggerSource {
	pub fn as_str(&self) -> &'static str {
		match self {
			TriggerSource::Schedule => "schedule",
			TriggerSource::Manual => "manual",
			TriggerSource::Retry => "retry",
		}
	}
}

impl std::str::FromStr for TriggerSource {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"schedule" => Ok(TriggerSource::Schedule),
			"manual" => Ok(TriggerSource::Manual),
			"retry" => Ok(TriggerSource::Retry),
			_ => Err(format!("unknown trigger source: {s}")),
		}
	}
}

/// A registered job. `interval_secs` is set for periodic jobs, `run_at`
/// (`"HH:MM"`, server local time) for daily ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
	pub id: String,
	pub name: String,
	pub description: String,
	pub job_type: String,
	pub interval_secs: Option<i64>,
	pub run_at: Option<String>,
	pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
	pub id: String,
	pub job_id: String,
	pub status: JobStatus,
	pub started_at: DateTime<Utc>,
	pub completed_at: Option<DateTime<Utc>>,
	pub duration_ms: Option<i64>,
	pub error_message: Option<String>,
	pub retry_count: u32,
	pub triggered_by: TriggerSource,
	pub metadata: Option<serde_json::Value>,
}

#[async_trait]
pub trait JobStore: Send + Sync {
	async fn upsert_definition(&self, def: &JobDefinition) -> Result<()>;
	async fn list_definitions(&self) -> Result<Vec<JobDefinition>>;
	async fn record_run_start(&self, run: &JobRun) -> Result<()>;
	async fn record_run_complete(
		&self,
		run_id: &str,
		status: JobStatus,
		error: Option<String>,
		metadata: Option<serde_json::Value>,
	) -> Result<()>;
	async fn list_runs(&self, job_id: &str, limit: u32) -> Result<Vec<JobRun>>;
	async fn get_last_run(&self, job_id: &str) -> Result<Option<JobRun>>;
	async fn count_consecutive_failures(&self, job_id: &str) -> Result<u32>;
	async fn prune_runs(&self, before: DateTime<Utc>) -> Result<u64>;
}

#[derive(Clone)]
pub struct JobRepository {
	pool: SqlitePool,
}

impl JobRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, def), fields(job_id = %def.id))]
	pub async fn upsert_definition(&self, def: &JobDefinition) -> Result<()> {
		let now = timestamp(Utc::now());
		sqlx::query(
			r#"
			INSERT INTO job_definitions (id, name, description, job_type, interval_secs, run_at, enabled, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT(id) DO UPDATE SET
				name = excluded.name,
				description = excluded.description,
				job_type = excluded.job_type,
				interval_secs = excluded.interval_secs,
				run_at = excluded.run_at,
				enabled = excluded.enabled,
				updated_at = excluded.updated_at
			"#,
		)
		.bind(&def.id)
		.bind(&def.name)
		.bind(&def.description)
		.bind(&def.job_type)
		.bind(def.interval_secs)
		.bind(&def.run_at)
		.bind(def.enabled)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_definitions(&self) -> Result<Vec<JobDefinition>> {
		let rows = sqlx::query(
			"SELECT id, name, description, job_type, interval_secs, run_at, enabled FROM job_definitions ORDER BY name",
		)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows
			.iter()
			.map(|row| JobDefinition {
				id: row.get("id"),
				name: row.get("name"),
				description: row
					.get::<Option<String>, _>("description")
					.unwrap_or_default(),
				job_type: row.get("job_type"),
				interval_secs: row.get("interval_secs"),
				run_at: row.get("run_at"),
				enabled: row.get("enabled"),
			})
			.collect())
	}

	#[tracing::instrument(skip(self, run), fields(run_id = %run.id, job_id = %run.job_id))]
	pub async fn record_run_start(&self, run: &JobRun) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO job_runs (id, job_id, status, started_at, retry_count, triggered_by)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&run.id)
		.bind(&run.job_id)
		.bind(run.status.as_str())
		.bind(timestamp(run.started_at))
		.bind(i64::from(run.retry_count))
		.bind(run.triggered_by.as_str())
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	/// # Errors
	/// Returns `DbError::NotFound` if no run has this id.
	#[tracing::instrument(skip(self, error, metadata), fields(status = %status.as_str()))]
	pub async fn record_run_complete(
		&self,
		run_id: &str,
		status: JobStatus,
		error: Option<String>,
		metadata: Option<serde_json::Value>,
	) -> Result<()> {
		let now = timestamp(Utc::now());
		let metadata = metadata.map(|m| m.to_string());

		let result = sqlx::query(
			r#"
			UPDATE job_runs
			SET status = ?,
				completed_at = ?,
				duration_ms = CAST((julianday(?) - julianday(started_at)) * 86400000 AS INTEGER),
				error_message = ?,
				metadata = ?
			WHERE id = ?
			"#,
		)
		.bind(status.as_str())
		.bind(&now)
		.bind(&now)
		.bind(error)
		.bind(metadata)
		.bind(run_id)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("job run {run_id}")));
		}
		Ok(())
	}

	/// Most recent runs of `job_id`, newest first.
	#[tracing::instrument(skip(self))]
	pub async fn list_runs(&self, job_id: &str, limit: u32) -> Result<Vec<JobRun>> {
		let rows = sqlx::query(&format!(
			"SELECT {RUN_COLUMNS} FROM job_runs WHERE job_id = ? ORDER BY started_at DESC, rowid DESC LIMIT ?"
		))
		.bind(job_id)
		.bind(i64::from(limit))
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_run).collect()
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_last_run(&self, job_id: &str) -> Result<Option<JobRun>> {
		Ok(self.list_runs(job_id, 1).await?.into_iter().next())
	}

	/// Number of failed runs since the most recent non-failed one.
	#[tracing::instrument(skip(self))]
	pub async fn count_consecutive_failures(&self, job_id: &str) -> Result<u32> {
		let (count,): (i64,) = sqlx::query_as(
			r#"
			SELECT COUNT(*)
			FROM job_runs
			WHERE job_id = ?1
				AND status = 'failed'
				AND started_at > COALESCE(
					(SELECT MAX(started_at) FROM job_runs WHERE job_id = ?1 AND status != 'failed'),
					''
				)
			"#,
		)
		.bind(job_id)
		.fetch_one(&self.pool)
		.await?;

		Ok(u32::try_from(count).unwrap_or(u32::MAX))
	}

	/// Delete completed runs that finished before `before`.
	#[tracing::instrument(skip(self))]
	pub async fn prune_runs(&self, before: DateTime<Utc>) -> Result<u64> {
		let result = sqlx::query("DELETE FROM job_runs WHERE completed_at IS NOT NULL AND completed_at < ?")
			.bind(timestamp(before))
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected())
	}
}

fn row_to_run(row: &sqlx::sqlite::SqliteRow) -> Result<JobRun> {
	let status: String = row.get("status");
	let started_at: String = row.get("started_at");
	let completed_at: Option<String> = row.get("completed_at");
	let retry_count: i64 = row.get("retry_count");
	let triggered_by: String = row.get("triggered_by");
	let metadata: Option<String> = row.get("metadata");

	Ok(JobRun {
		id: row.get("id"),
		job_id: row.get("job_id"),
		status: status.parse().map_err(DbError::Internal)?,
		started_at: parse_timestamp("started_at", &started_at)?,
		completed_at: completed_at
			.map(|s| parse_timestamp("completed_at", &s))
			.transpose()?,
		duration_ms: row.get("duration_ms"),
		error_message: row.get("error_message"),
		retry_count: u32::try_from(retry_count).unwrap_or(0),
		triggered_by: triggered_by.parse().map_err(DbError::Internal)?,
		metadata: metadata.as_deref().map(serde_json::from_str).transpose()?,
	})
}

#[async_trait]
impl JobStore for JobRepository {
	async fn upsert_definition(&self, def: &JobDefinition) -> Result<()> {
		self.upsert_definition(def).await
	}

	async fn list_definitions(&self) -> Result<Vec<JobDefinition>> {
		self.list_definitions().await
	}

	async fn record_run_start(&self, run: &JobRun) -> Result<()> {
		self.record_run_start(run).await
	}

	async fn record_run_complete(
		&self,
		run_id: &str,
		status: JobStatus,
		error: Option<String>,
		metadata: Option<serde_json::Value>,
	) -> Result<()> {
		self.record_run_complete(run_id, status, error, metadata)
			.await
	}

	async fn list_runs(&self, job_id: &str, limit: u32) -> Result<Vec<JobRun>> {
		self.list_runs(job_id, limit).await
	}

	async fn get_last_run(&self, job_id: &str) -> Result<Option<JobRun>> {
		self.get_last_run(job_id).await
	}

	async fn count_consecutive_failures(&self, job_id: &str) -> Result<u32> {
		self.count_consecutive_failures(job_id).await
	}

	async fn prune_runs(&self, before: DateTime<Utc>) -> Result<u64> {
		self.prune_runs(before).await
	}
}
