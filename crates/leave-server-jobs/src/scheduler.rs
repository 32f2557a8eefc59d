// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::context::{CancellationToken, JobContext};
use crate::error::{JobError, Result};
use crate::health::{determine_health_state, HealthState, JobHealthStatus, JobsHealthStatus};
use crate::job::Job;
use crate::types::{
	until_next_daily, CompletedRun, JobDefinition, JobRun, JobStatus, JobType, TriggerSource,
};
use chrono::{Local, NaiveTime, Utc};
use leave_server_db::JobStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);
const RETRY_FACTOR: u32 = 2;
const MAX_RETRIES: u32 = 3;

struct RegisteredJob {
	job: Arc<dyn Job>,
	job_type: JobType,
	cancellation_token: CancellationToken,
}

pub struct JobScheduler {
	jobs: BTreeMap<String, RegisteredJob>,
	repository: Arc<dyn JobStore>,
	retry_base_delay: Duration,
	shutdown_tx: broadcast::Sender<()>,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl JobScheduler {
	pub fn new(repository: Arc<dyn JobStore>) -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			jobs: BTreeMap::new(),
			repository,
			retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
			shutdown_tx,
			handles: Mutex::new(Vec::new()),
		}
	}

	/// Delay before the first retry; later retries double it up to one minute.
	pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
		self.retry_base_delay = delay;
		self
	}

	pub fn register_periodic(&mut self, job: Arc<dyn Job>, interval: Duration) {
		self.register(job, JobType::Periodic { interval });
	}

	/// Run `job` once a day at `at`, server local time.
	pub fn register_daily(&mut self, job: Arc<dyn Job>, at: NaiveTime) {
		self.register(job, JobType::Daily { at });
	}

	pub fn register_one_shot(&mut self, job: Arc<dyn Job>) {
		self.register(job, JobType::OneShot);
	}

	fn register(&mut self, job: Arc<dyn Job>, job_type: JobType) {
		let id = job.id().to_string();
		self.jobs.insert(
			id,
			RegisteredJob {
				job,
				job_type,
				cancellation_token: CancellationToken::new(),
			},
		);
	}

	/// Upsert a definition row for every registered job. Runs are recorded
	/// against these rows, so this must happen before any trigger.
	#[instrument(skip(self))]
	pub async fn persist_definitions(&self) -> Result<()> {
		for (job_id, registered) in &self.jobs {
			let def = JobDefinition {
				id: job_id.clone(),
				name: registered.job.name().to_string(),
				description: registered.job.description().to_string(),
				job_type: registered.job_type.as_str().to_string(),
				interval_secs: match &registered.job_type {
					JobType::Periodic { interval } => i64::try_from(interval.as_secs()).ok(),
					_ => None,
				},
				run_at: match &registered.job_type {
					JobType::Daily { at } => Some(at.format("%H:%M").to_string()),
					_ => None,
				},
				enabled: true,
			};
			self.repository.upsert_definition(&def).await?;
		}
		Ok(())
	}

	/// Persist definitions and spawn one loop per scheduled job.
	#[instrument(skip(self))]
	pub async fn start(&self) -> Result<()> {
		self.persist_definitions().await?;
		let mut handles = self.handles.lock().await;

		for (job_id, registered) in &self.jobs {
			if registered.job_type == JobType::OneShot {
				continue;
			}

			let job = Arc::clone(&registered.job);
			let repository = Arc::clone(&self.repository);
			let mut shutdown_rx = self.shutdown_tx.subscribe();
			let cancellation_token = registered.cancellation_token.clone();
			let job_type = registered.job_type.clone();
			let retry_base_delay = self.retry_base_delay;
			let job_id = job_id.clone();

			let handle = tokio::spawn(async move {
				loop {
					let delay = match &job_type {
						JobType::Periodic { interval } => *interval,
						JobType::Daily { at } => until_next_daily(Local::now().naive_local(), *at),
						JobType::OneShot => break,
					};
					tokio::select! {
						_ = tokio::time::sleep(delay) => {
							if cancellation_token.is_cancelled() {
								continue;
							}
							let _ = run_job_with_retry(
								&job,
								repository.as_ref(),
								TriggerSource::Schedule,
								&cancellation_token,
								retry_base_delay,
							).await;
						}
						_ = shutdown_rx.recv() => {
							info!(job_id = %job_id, "Shutting down scheduled job");
							break;
						}
					}
				}
			});

			handles.push(handle);
		}

		info!(job_count = handles.len(), "Job scheduler started");
		Ok(())
	}

	/// Run a registered job now and wait for it to finish.
	#[instrument(skip(self))]
	pub async fn trigger_job(
		&self,
		job_id: &str,
		triggered_by: TriggerSource,
	) -> Result<CompletedRun> {
		let registered = self
			.jobs
			.get(job_id)
			.ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

		run_job_with_retry(
			&registered.job,
			self.repository.as_ref(),
			triggered_by,
			&registered.cancellation_token,
			self.retry_base_delay,
		)
		.await
	}

	#[instrument(skip(self))]
	pub async fn cancel_job(&self, job_id: &str) -> Result<()> {
		let registered = self
			.jobs
			.get(job_id)
			.ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

		registered.cancellation_token.cancel();
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		let _ = self.shutdown_tx.send(());

		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}

		info!("Job scheduler shut down");
	}

	pub fn job_ids(&self) -> Vec<String> {
		self.jobs.keys().cloned().collect()
	}

	#[instrument(skip(self))]
	pub async fn job_status(&self, job_id: &str) -> Option<JobHealthStatus> {
		let registered = self.jobs.get(job_id)?;

		let last_run = self.repository.get_last_run(job_id).await.ok().flatten();
		let consecutive_failures = self
			.repository
			.count_consecutive_failures(job_id)
			.await
			.unwrap_or(0);

		Some(JobHealthStatus {
			job_id: job_id.to_string(),
			name: registered.job.name().to_string(),
			schedule: registered.job_type.describe(),
			status: determine_health_state(last_run.as_ref(), consecutive_failures),
			last_run: last_run.map(Into::into),
			consecutive_failures,
		})
	}

	/// Per-job health plus the worst state across all jobs.
	#[instrument(skip(self))]
	pub async fn health_status(&self) -> JobsHealthStatus {
		let mut jobs = Vec::new();
		for job_id in self.jobs.keys() {
			if let Some(status) = self.job_status(job_id).await {
				jobs.push(status);
			}
		}

		JobsHealthStatus {
			status: jobs
				.iter()
				.map(|j| j.status)
				.max()
				.unwrap_or(HealthState::Healthy),
			jobs,
		}
	}
}

async fn run_job_with_retry(
	job: &Arc<dyn Job>,
	repository: &dyn JobStore,
	triggered_by: TriggerSource,
	cancellation_token: &CancellationToken,
	retry_base_delay: Duration,
) -> Result<CompletedRun> {
	let mut retry_count = 0u32;
	let run_id = uuid::Uuid::new_v4().to_string();

	repository
		.record_run_start(&JobRun {
			id: run_id.clone(),
			job_id: job.id().to_string(),
			status: JobStatus::Running,
			started_at: Utc::now(),
			completed_at: None,
			duration_ms: None,
			error_message: None,
			retry_count,
			triggered_by,
			metadata: None,
		})
		.await?;

	loop {
		let ctx = JobContext {
			run_id: run_id.clone(),
			triggered_by: if retry_count > 0 {
				TriggerSource::Retry
			} else {
				triggered_by
			},
			cancellation_token: cancellation_token.clone(),
		};

		match job.run(&ctx).await {
			Ok(output) => {
				repository
					.record_run_complete(
						&run_id,
						JobStatus::Succeeded,
						None,
						output.metadata.clone(),
					)
					.await?;
				info!(job_id = %job.id(), run_id = %run_id, "Job completed successfully");
				return Ok(CompletedRun { run_id, output });
			}
			Err(JobError::Cancelled) => {
				repository
					.record_run_complete(&run_id, JobStatus::Cancelled, None, None)
					.await?;
				info!(job_id = %job.id(), run_id = %run_id, "Job cancelled");
				return Err(JobError::Cancelled);
			}
			Err(JobError::Failed { message, retryable }) => {
				if retryable && retry_count < MAX_RETRIES {
					retry_count += 1;
					let delay = backoff_delay(retry_base_delay, retry_count);
					warn!(
						job_id = %job.id(),
						run_id = %run_id,
						retry_count,
						delay_ms = delay.as_millis() as u64,
						error = %message,
						"Job failed, retrying"
					);
					tokio::time::sleep(delay).await;
					continue;
				}

				repository
					.record_run_complete(&run_id, JobStatus::Failed, Some(message.clone()), None)
					.await?;
				warn!(job_id = %job.id(), run_id = %run_id, error = %message, "Job failed");
				return Err(JobError::Failed { message, retryable });
			}
			Err(e) => {
				let message = e.to_string();
				repository
					.record_run_complete(&run_id, JobStatus::Failed, Some(message.clone()), None)
					.await?;
				warn!(job_id = %job.id(), run_id = %run_id, error = %message, "Job failed with error");
				return Err(e);
			}
		}
	}
}

/// `base * 2^(retry_count - 1)`, capped at one minute.
pub(crate) fn backoff_delay(base: Duration, retry_count: u32) -> Duration {
	let exponent = retry_count.saturating_sub(1).min(16);
	base.saturating_mul(RETRY_FACTOR.pow(exponent))
		.min(MAX_RETRY_DELAY)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::JobOutput;
	use async_trait::async_trait;
	use leave_server_db::{run_migrations, JobRepository};
	use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
	use std::sync::atomic::{AtomicU32, Ordering};

	async fn setup_db() -> SqlitePool {
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect("sqlite::memory:")
			.await
			.unwrap();
		run_migrations(&pool).await.unwrap();
		pool
	}

	async fn scheduler_with(job: Arc<dyn Job>) -> (JobScheduler, Arc<JobRepository>) {
		let repository = Arc::new(JobRepository::new(setup_db().await));
		let mut scheduler = JobScheduler::new(repository.clone())
			.with_retry_base_delay(Duration::from_millis(1));
		scheduler.register_one_shot(job);
		scheduler.start().await.unwrap();
		(scheduler, repository)
	}

	/// Fails with the given error kind `failures` times, then succeeds.
	struct FlakyJob {
		failures: u32,
		retryable: bool,
		attempts: AtomicU32,
	}

	impl FlakyJob {
		fn new(failures: u32, retryable: bool) -> Self {
			Self {
				failures,
				retryable,
				attempts: AtomicU32::new(0),
			}
		}
	}

	#[async_trait]
	impl Job for FlakyJob {
		fn id(&self) -> &str {
			"flaky"
		}

		fn name(&self) -> &str {
			"Flaky"
		}

		fn description(&self) -> &str {
			"Fails a fixed number of times"
		}

		async fn run(&self, ctx: &JobContext) -> std::result::Result<JobOutput, JobError> {
			if ctx.cancellation_token.is_cancelled() {
				return Err(JobError::Cancelled);
			}
			let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
			if attempt < self.failures {
				return Err(JobError::Failed {
					message: format!("attempt {attempt} failed"),
					retryable: self.retryable,
				});
			}
			Ok(JobOutput {
				message: "done".to_string(),
				metadata: Some(serde_json::json!({ "attempts": attempt + 1 })),
			})
		}
	}

	mod backoff {
		use super::*;

		#[test]
		fn doubles_from_base() {
			let base = Duration::from_secs(1);
			assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
			assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
			assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
		}

		#[test]
		fn caps_at_one_minute() {
			let base = Duration::from_secs(1);
			assert_eq!(backoff_delay(base, 10), MAX_RETRY_DELAY);
			assert_eq!(backoff_delay(base, 100), MAX_RETRY_DELAY);
		}
	}

	mod runs {
		use super::*;

		#[tokio::test]
		async fn retryable_failures_are_retried_within_one_run() {
			let (scheduler, repository) = scheduler_with(Arc::new(FlakyJob::new(2, true))).await;

			let completed = scheduler
				.trigger_job("flaky", TriggerSource::Manual)
				.await
				.unwrap();
			assert_eq!(completed.output.metadata.unwrap()["attempts"], 3);

			let runs = repository.list_runs("flaky", 10).await.unwrap();
			assert_eq!(runs.len(), 1);
			assert_eq!(runs[0].status, JobStatus::Succeeded);
			assert_eq!(runs[0].triggered_by, TriggerSource::Manual);
		}

		#[tokio::test]
		async fn permanent_failure_is_recorded() {
			let (scheduler, repository) = scheduler_with(Arc::new(FlakyJob::new(1, false))).await;

			let err = scheduler
				.trigger_job("flaky", TriggerSource::Manual)
				.await
				.unwrap_err();
			assert!(matches!(err, JobError::Failed { retryable: false, .. }));

			let last = repository.get_last_run("flaky").await.unwrap().unwrap();
			assert_eq!(last.status, JobStatus::Failed);
			assert_eq!(last.error_message.as_deref(), Some("attempt 0 failed"));
		}

		#[tokio::test]
		async fn retries_are_bounded() {
			let (scheduler, _) = scheduler_with(Arc::new(FlakyJob::new(10, true))).await;
			let err = scheduler
				.trigger_job("flaky", TriggerSource::Manual)
				.await
				.unwrap_err();
			assert!(matches!(err, JobError::Failed { retryable: true, .. }));
		}

		#[tokio::test]
		async fn cancelled_job_records_cancellation() {
			let (scheduler, repository) = scheduler_with(Arc::new(FlakyJob::new(0, false))).await;
			scheduler.cancel_job("flaky").await.unwrap();

			let err = scheduler
				.trigger_job("flaky", TriggerSource::Manual)
				.await
				.unwrap_err();
			assert!(matches!(err, JobError::Cancelled));
			let last = repository.get_last_run("flaky").await.unwrap().unwrap();
			assert_eq!(last.status, JobStatus::Cancelled);
		}

		#[tokio::test]
		async fn unknown_job_is_not_found() {
			let (scheduler, _) = scheduler_with(Arc::new(FlakyJob::new(0, false))).await;
			match scheduler.trigger_job("missing", TriggerSource::Manual).await {
				Err(JobError::NotFound(id)) => assert_eq!(id, "missing"),
				other => panic!("expected NotFound, got {other:?}"),
			}
		}
	}

	mod scheduling {
		use super::*;

		#[tokio::test]
		async fn periodic_job_runs_until_shutdown() {
			let repository = Arc::new(JobRepository::new(setup_db().await));
			let mut scheduler = JobScheduler::new(repository.clone());
			scheduler.register_periodic(
				Arc::new(FlakyJob::new(0, false)),
				Duration::from_millis(20),
			);
			scheduler.start().await.unwrap();

			tokio::time::sleep(Duration::from_millis(150)).await;
			scheduler.shutdown().await;

			let runs = repository.list_runs("flaky", 100).await.unwrap();
			assert!(!runs.is_empty());
			assert!(runs.iter().all(|r| r.triggered_by == TriggerSource::Schedule));
		}

		#[tokio::test]
		async fn daily_definition_records_run_time() {
			let repository = Arc::new(JobRepository::new(setup_db().await));
			let mut scheduler = JobScheduler::new(repository.clone());
			scheduler.register_daily(Arc::new(FlakyJob::new(0, false)), NaiveTime::MIN);
			scheduler.start().await.unwrap();

			let defs = repository.list_definitions().await.unwrap();
			assert_eq!(defs[0].job_type, "daily");
			assert_eq!(defs[0].run_at.as_deref(), Some("00:00"));
			scheduler.shutdown().await;
		}
	}

	mod health {
		use super::*;

		#[tokio::test]
		async fn failed_job_degrades_overall_health() {
			let (scheduler, _) = scheduler_with(Arc::new(FlakyJob::new(1, false))).await;
			assert_eq!(scheduler.health_status().await.status, HealthState::Healthy);

			let _ = scheduler.trigger_job("flaky", TriggerSource::Manual).await;
			let health = scheduler.health_status().await;
			assert_eq!(health.status, HealthState::Degraded);
			assert_eq!(health.jobs[0].consecutive_failures, 1);
			assert_eq!(health.jobs[0].schedule, "on demand");

			tokio::time::sleep(Duration::from_millis(5)).await;
			scheduler.trigger_job("flaky", TriggerSource::Manual).await.unwrap();
			assert_eq!(scheduler.health_status().await.status, HealthState::Healthy);
		}
	}
}
