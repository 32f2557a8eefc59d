// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application state and router assembly.

use axum::{
	middleware::from_fn_with_state,
	routing::{delete, get, post, put},
	Router,
};
use chrono::{Duration, NaiveTime};
use leave_server_audit::{AuditService, AuditSink, SqliteAuditSink, TracingAuditSink};
use leave_server_auth::{
	AuthPipeline, AuthSettings, Clock, Notifier, PolicyConfig, ResourceSnapshotStore,
	SessionTokenIssuer, SystemClock,
};
use leave_server_config::ServerConfig;
use leave_server_db::{AuditLogRepository, JobRepository, LeaveRepository, UserRepository};
use leave_server_jobs::JobScheduler;
use leave_server_smtp::SmtpClient;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::{
	auth_middleware::auth_layer,
	error::ServerError,
	jobs::{BackupJob, JobHistoryCleanupJob},
	notify::{build_notifier, AuditingNotifier},
	routes,
};

const JOB_HISTORY_RETENTION_DAYS: i64 = 30;
const JOB_HISTORY_CLEANUP_INTERVAL: std::time::Duration =
	std::time::Duration::from_secs(24 * 60 * 60);

#[derive(Clone)]
pub struct AppState {
	pub pool: SqlitePool,
	pub config: Arc<ServerConfig>,
	pub policy: Arc<PolicyConfig>,
	pub users: Arc<UserRepository>,
	pub leaves: Arc<LeaveRepository>,
	/// What access checks read about a leave request.
	pub resources: Arc<dyn ResourceSnapshotStore>,
	pub audit_logs: Arc<AuditLogRepository>,
	pub auth: Arc<AuthPipeline>,
	pub audit: Arc<AuditService>,
	/// Audited wrapper around the mail transport.
	pub notifier: Arc<dyn Notifier>,
	pub smtp: Option<Arc<SmtpClient>>,
	pub scheduler: Arc<JobScheduler>,
	pub clock: Arc<dyn Clock>,
}

/// Outside collaborators, replaceable in tests.
pub struct AppServices {
	pub notifier: Arc<dyn Notifier>,
	pub smtp: Option<Arc<SmtpClient>>,
	pub clock: Arc<dyn Clock>,
}

impl AppServices {
	pub fn from_config(config: &ServerConfig) -> Self {
		let (notifier, smtp) = build_notifier(config.smtp.as_ref());
		Self {
			notifier,
			smtp,
			clock: Arc::new(SystemClock),
		}
	}
}

/// Build the shared state. Registers jobs and persists their definitions but
/// does not start the scheduler.
pub async fn create_app_state(
	pool: SqlitePool,
	config: &ServerConfig,
	services: AppServices,
) -> Result<AppState, ServerError> {
	let audit = Arc::new(create_audit_service(pool.clone(), config));
	let notifier: Arc<dyn Notifier> =
		Arc::new(AuditingNotifier::new(services.notifier, audit.clone()));

	let users = Arc::new(UserRepository::new(pool.clone()));
	let signing_key = config
		.auth
		.signing_key()
		.ok_or_else(|| ServerError::Internal("no session signing key configured".to_string()))?;
	let tokens = SessionTokenIssuer::new(
		signing_key,
		Duration::seconds(i64::try_from(config.auth.session_ttl_secs).unwrap_or(i64::MAX)),
	);
	let settings = AuthSettings {
		lockout_threshold: config.auth.lockout_threshold,
		otp_ttl: Duration::seconds(i64::try_from(config.auth.otp_ttl_secs).unwrap_or(i64::MAX)),
	};
	let auth = Arc::new(AuthPipeline::new(
		users.clone(),
		notifier.clone(),
		tokens,
		services.clock.clone(),
		settings,
	));

	let scheduler = create_scheduler(pool.clone(), config, audit.clone());
	scheduler.persist_definitions().await?;

	let leaves = Arc::new(LeaveRepository::new(pool.clone()));
	Ok(AppState {
		resources: leaves.clone(),
		leaves,
		audit_logs: Arc::new(AuditLogRepository::new(pool.clone())),
		pool,
		config: Arc::new(config.clone()),
		policy: Arc::new(config.policy.clone()),
		users,
		auth,
		audit,
		notifier,
		smtp: services.smtp,
		scheduler: Arc::new(scheduler),
		clock: services.clock,
	})
}

fn create_audit_service(pool: SqlitePool, config: &ServerConfig) -> AuditService {
	if !config.audit.enabled {
		tracing::warn!("audit logging disabled");
		return AuditService::disabled();
	}

	let mut sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(SqliteAuditSink::new(pool))];
	if config.audit.log_to_tracing {
		sinks.push(Arc::new(TracingAuditSink::new()));
	}
	AuditService::new(config.audit.queue_capacity, sinks)
}

fn create_scheduler(
	pool: SqlitePool,
	config: &ServerConfig,
	audit: Arc<AuditService>,
) -> JobScheduler {
	let job_repo = Arc::new(JobRepository::new(pool.clone()));
	let mut scheduler = JobScheduler::new(job_repo.clone());

	let backup = Arc::new(BackupJob::new(pool, config.backup.directory.clone(), audit));
	if config.backup.enabled {
		let daily_at = &config.backup.daily_at;
		let at =
			NaiveTime::from_hms_opt(daily_at.hour(), daily_at.minute(), 0).unwrap_or(NaiveTime::MIN);
		scheduler.register_daily(backup, at);
	} else {
		// Still reachable through the manual backup endpoint.
		scheduler.register_one_shot(backup);
	}

	scheduler.register_periodic(
		Arc::new(JobHistoryCleanupJob::new(job_repo, JOB_HISTORY_RETENTION_DAYS)),
		JOB_HISTORY_CLEANUP_INTERVAL,
	);

	scheduler
}

pub fn create_router(state: AppState) -> Router {
	let auth_routes = Router::new()
		.route("/api/auth/register", post(routes::auth::register))
		.route("/api/auth/login", post(routes::auth::login))
		.route("/api/auth/verify-otp", post(routes::auth::verify_otp))
		.route("/api/auth/logout", post(routes::auth::logout));

	let leave_routes = Router::new()
		.route("/api/leave", post(routes::leave::create_leave))
		.route("/api/leave/mine", get(routes::leave::list_my_leaves))
		.route(
			"/api/leave/{id}",
			get(routes::leave::get_leave).put(routes::leave::update_leave),
		)
		.route("/api/leave/{id}/approve", post(routes::leave::approve_leave))
		.route("/api/leave/{id}/reject", post(routes::leave::reject_leave))
		.route(
			"/api/leave/{id}/manager-approve",
			post(routes::leave::manager_approve_leave),
		)
		.route("/api/leave/{id}/access", put(routes::leave::update_access))
		.route(
			"/api/leave/{id}/classification",
			put(routes::leave::update_classification),
		);

	let admin_routes = Router::new()
		.route("/api/admin/users", get(routes::admin::list_users))
		.route(
			"/api/admin/users/{id}",
			get(routes::admin::get_user).delete(routes::admin::delete_user),
		)
		.route("/api/admin/users/{id}/role", put(routes::admin::update_role))
		.route(
			"/api/admin/users/{id}/department",
			put(routes::admin::update_department),
		)
		.route(
			"/api/admin/users/{id}/toggle-active",
			put(routes::admin::toggle_active),
		)
		.route("/api/admin/users/{id}/unlock", put(routes::admin::unlock_user))
		.route(
			"/api/logs",
			get(routes::logs::list_logs).delete(routes::logs::clear_logs),
		)
		.route("/api/backups/manual", post(routes::backups::manual_backup));

	Router::new()
		.route("/api/health", get(routes::health::health_check))
		.merge(auth_routes)
		.merge(leave_routes)
		.merge(admin_routes)
		.layer(from_fn_with_state(state.clone(), auth_layer))
		.with_state(state)
}
