// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! On-demand database backup.

use axum::{extract::State, Json};
use leave_server_audit::{AuditEventType, AuditLogEntry};
use leave_server_jobs::{CompletedRun, TriggerSource};
use serde::Serialize;

use crate::{
	api::AppState,
	auth_middleware::RequireAuth,
	authz::{authorize, chains},
	client_info::ClientInfo,
	error::ServerError,
	jobs::BACKUP_JOB_ID,
};

#[derive(Debug, Serialize)]
pub struct BackupResponse {
	pub message: String,
	pub file: Option<String>,
	pub run_id: String,
}

fn backup_file(run: &CompletedRun) -> Option<String> {
	run.output
		.metadata
		.as_ref()
		.and_then(|m| m.get("file"))
		.and_then(|f| f.as_str())
		.map(str::to_string)
}

/// POST /api/backups/manual
///
/// Runs the backup job through the scheduler, so the run is recorded in job
/// history alongside scheduled ones.
#[tracing::instrument(skip(state, client, user), fields(user_id = %user.actor.id))]
pub async fn manual_backup(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
) -> Result<Json<BackupResponse>, ServerError> {
	authorize(&state, &user, &chains::administer(), None, &client)?;

	let entry = client
		.apply(AuditLogEntry::builder(AuditEventType::ManualBackup))
		.actor(user.actor.id);

	match state
		.scheduler
		.trigger_job(BACKUP_JOB_ID, TriggerSource::Manual)
		.await
	{
		Ok(run) => {
			let file = backup_file(&run);
			let mut entry = entry.resource("backup", run.run_id.clone());
			if let Some(file) = &file {
				entry = entry.detail("file", file.as_str());
			}
			state.audit.log(entry.build());
			Ok(Json(BackupResponse {
				message: run.output.message,
				file,
				run_id: run.run_id,
			}))
		}
		Err(e) => {
			state
				.audit
				.log(entry.failed().detail("error", e.to_string()).build());
			Err(e.into())
		}
	}
}
