// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Leave request routes.
//!
//! Every mutating handler authorizes through an access chain before touching
//! the store, audits its outcome, and sends mail without waiting for it.

use axum::{
	extract::{Path, State},
	http::StatusCode,
	Json,
};
use chrono::NaiveDate;
use leave_server_audit::{AuditEventType, AuditLogEntry};
use leave_server_auth::{
	AccessModel, Classification, EmailTemplate, LeaveRequestId, Notifier, ResourceSnapshot, Role,
	UserId,
};
use leave_server_db::{
	LeaveRequest, LeaveStatus, LeaveType, LeaveUpdate, NewLeaveRequest, UserProfile,
};
use leave_server_email::{deliver_to_all, EmailError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
	api::AppState,
	auth_middleware::{CurrentUser, RequireAuth},
	authz::{authorize, bypasses_read_checks, chains, deny, deny_rule, MANAGER_APPROVAL_MAX_DAYS},
	client_info::ClientInfo,
	error::ServerError,
};

#[derive(Debug, Deserialize)]
pub struct CreateLeaveRequest {
	pub start_date: NaiveDate,
	pub end_date: NaiveDate,
	pub leave_type: LeaveType,
	pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct EmployeeSummary {
	pub id: UserId,
	pub name: String,
	pub email: String,
	pub role: Role,
	pub department: Option<String>,
}

impl From<UserProfile> for EmployeeSummary {
	fn from(profile: UserProfile) -> Self {
		Self {
			id: profile.id,
			name: profile.name,
			email: profile.email,
			role: profile.role,
			department: profile.department,
		}
	}
}

#[derive(Debug, Serialize)]
pub struct LeaveDetail {
	#[serde(flatten)]
	pub leave: LeaveRequest,
	pub employee: Option<EmployeeSummary>,
}

#[derive(Debug, Serialize)]
pub struct LeaveActionResponse {
	pub message: String,
	pub leave: LeaveRequest,
}

#[derive(Debug, Default, Deserialize)]
pub struct AccessUpdate {
	#[serde(default)]
	pub grant: Vec<UserId>,
	#[serde(default)]
	pub revoke: Vec<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct ClassificationUpdate {
	pub classification: Classification,
}

fn validate_dates(start: NaiveDate, end: NaiveDate) -> Result<(), ServerError> {
	if end < start {
		return Err(ServerError::BadRequest(
			"End date cannot be before start date".to_string(),
		));
	}
	Ok(())
}

async fn load_leave(state: &AppState, id: &LeaveRequestId) -> Result<LeaveRequest, ServerError> {
	state
		.leaves
		.get_leave(id)
		.await?
		.ok_or_else(|| ServerError::NotFound(format!("leave request {id}")))
}

/// What the access checks see of a request. A miss is a 404, never a denial.
async fn load_snapshot(
	state: &AppState,
	id: &LeaveRequestId,
) -> Result<ResourceSnapshot, ServerError> {
	state
		.resources
		.get_resource_snapshot(id)
		.await?
		.ok_or_else(|| ServerError::NotFound(format!("leave request {id}")))
}

fn leave_entry(
	event: AuditEventType,
	user: &CurrentUser,
	leave: &LeaveRequest,
	client: &ClientInfo,
) -> AuditLogEntry {
	client
		.apply(AuditLogEntry::builder(event))
		.actor(user.actor.id)
		.resource("leave_request", leave.id.to_string())
		.detail("status", leave.status.as_str())
		.build()
}

/// Deliver in the background; a lost notification never fails the request.
fn notify(notifier: Arc<dyn Notifier>, to: String, template: EmailTemplate) {
	tokio::spawn(async move {
		if let Err(e) = notifier.deliver(&to, &template).await {
			tracing::warn!(error = %e, template = template.name(), "leave notification not delivered");
		}
	});
}

fn notify_approvers(state: &AppState, employee: &str, leave: &LeaveRequest) {
	let recipients: Vec<String> = state
		.config
		.smtp
		.as_ref()
		.map(|s| s.approver_addresses.clone())
		.unwrap_or_default();
	let notifier = state.notifier.clone();
	let template = EmailTemplate::LeaveRequest {
		employee: employee.to_string(),
		kind: leave.leave_type.to_string(),
		start: leave.start_date.to_string(),
		end: leave.end_date.to_string(),
	};

	tokio::spawn(async move {
		match deliver_to_all(notifier.as_ref(), &recipients, &template).await {
			Ok(count) => tracing::debug!(delivered = count, "approvers notified"),
			Err(EmailError::NoRecipients) => tracing::debug!("no approver addresses configured"),
			Err(e) => tracing::warn!(error = %e, "approver notification failed"),
		}
	});
}

#[tracing::instrument(skip(state, user), fields(user_id = %user.actor.id))]
pub async fn list_my_leaves(
	State(state): State<AppState>,
	RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<LeaveRequest>>, ServerError> {
	let leaves = state.leaves.list_leaves_for_employee(&user.actor.id).await?;
	Ok(Json(leaves))
}

#[tracing::instrument(skip(state, client, user, body), fields(user_id = %user.actor.id))]
pub async fn create_leave(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
	Json(body): Json<CreateLeaveRequest>,
) -> Result<(StatusCode, Json<LeaveRequest>), ServerError> {
	authorize(&state, &user, &chains::create_leave(), None, &client)?;

	validate_dates(body.start_date, body.end_date)?;
	let reason = body.reason.trim().to_string();
	if reason.is_empty() {
		return Err(ServerError::BadRequest("A reason is required".to_string()));
	}

	let leave = state
		.leaves
		.create_leave(&NewLeaveRequest {
			employee_id: user.actor.id,
			start_date: body.start_date,
			end_date: body.end_date,
			leave_type: body.leave_type,
			reason,
		})
		.await?;

	state.audit.log(
		client
			.apply(AuditLogEntry::builder(AuditEventType::CreateLeave))
			.actor(user.actor.id)
			.resource("leave_request", leave.id.to_string())
			.detail("leave_type", leave.leave_type.as_str())
			.detail("days", leave.duration_days())
			.build(),
	);
	notify_approvers(&state, &user.profile.name, &leave);

	Ok((StatusCode::CREATED, Json(leave)))
}

#[tracing::instrument(skip(state, client, user), fields(user_id = %user.actor.id, leave_id = %id))]
pub async fn get_leave(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
	Path(id): Path<LeaveRequestId>,
) -> Result<Json<LeaveDetail>, ServerError> {
	let snapshot = load_snapshot(&state, &id).await?;
	if !bypasses_read_checks(&user) {
		authorize(&state, &user, &chains::read_leave(), Some(&snapshot), &client)?;
	}

	let leave = load_leave(&state, &id).await?;

	let employee = state
		.users
		.get_user_by_id(&leave.employee_id)
		.await?
		.map(EmployeeSummary::from);
	Ok(Json(LeaveDetail { leave, employee }))
}

#[tracing::instrument(skip(state, client, user, body), fields(user_id = %user.actor.id, leave_id = %id))]
pub async fn update_leave(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
	Path(id): Path<LeaveRequestId>,
	Json(body): Json<LeaveUpdate>,
) -> Result<Json<LeaveActionResponse>, ServerError> {
	let snapshot = load_snapshot(&state, &id).await?;
	authorize(
		&state,
		&user,
		&chains::edit_leave(),
		Some(&snapshot.owner_only()),
		&client,
	)?;

	let existing = load_leave(&state, &id).await?;

	validate_dates(
		body.start_date.unwrap_or(existing.start_date),
		body.end_date.unwrap_or(existing.end_date),
	)?;
	if body.reason.as_deref().is_some_and(|r| r.trim().is_empty()) {
		return Err(ServerError::BadRequest("A reason is required".to_string()));
	}

	let leave = match state.leaves.update_pending(&id, &body).await {
		Ok(leave) => leave,
		Err(leave_server_db::DbError::Conflict(_)) => {
			return Err(ServerError::Conflict(
				"Cannot update leave after a decision".to_string(),
			))
		}
		Err(e) => return Err(e.into()),
	};

	state
		.audit
		.log(leave_entry(AuditEventType::UpdateLeave, &user, &leave, &client));
	Ok(Json(LeaveActionResponse {
		message: "Leave updated".to_string(),
		leave,
	}))
}

/// Record a decision, audit it and tell the employee.
async fn decide(
	state: &AppState,
	user: &CurrentUser,
	client: &ClientInfo,
	id: &LeaveRequestId,
	status: LeaveStatus,
	event: AuditEventType,
) -> Result<LeaveRequest, ServerError> {
	let leave = state.leaves.decide(id, status, &user.actor.id).await?;
	state.audit.log(leave_entry(event, user, &leave, client));

	if let Some(employee) = state.users.get_user_by_id(&leave.employee_id).await? {
		let kind = leave.leave_type.to_string();
		let template = match status {
			LeaveStatus::Approved => EmailTemplate::LeaveApproved {
				name: employee.name.clone(),
				kind,
			},
			_ => EmailTemplate::LeaveRejected {
				name: employee.name.clone(),
				kind,
			},
		};
		notify(state.notifier.clone(), employee.email, template);
	}
	Ok(leave)
}

#[tracing::instrument(skip(state, client, user), fields(user_id = %user.actor.id, leave_id = %id))]
pub async fn approve_leave(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
	Path(id): Path<LeaveRequestId>,
) -> Result<Json<LeaveActionResponse>, ServerError> {
	authorize(&state, &user, &chains::approve_leave(), None, &client)?;
	let leave = decide(
		&state,
		&user,
		&client,
		&id,
		LeaveStatus::Approved,
		AuditEventType::ApproveLeave,
	)
	.await?;
	Ok(Json(LeaveActionResponse {
		message: "Leave approved".to_string(),
		leave,
	}))
}

#[tracing::instrument(skip(state, client, user), fields(user_id = %user.actor.id, leave_id = %id))]
pub async fn reject_leave(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
	Path(id): Path<LeaveRequestId>,
) -> Result<Json<LeaveActionResponse>, ServerError> {
	authorize(&state, &user, &chains::reject_leave(), None, &client)?;
	let leave = decide(
		&state,
		&user,
		&client,
		&id,
		LeaveStatus::Rejected,
		AuditEventType::RejectLeave,
	)
	.await?;
	Ok(Json(LeaveActionResponse {
		message: "Leave rejected".to_string(),
		leave,
	}))
}

#[tracing::instrument(skip(state, client, user), fields(user_id = %user.actor.id, leave_id = %id))]
pub async fn manager_approve_leave(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
	Path(id): Path<LeaveRequestId>,
) -> Result<Json<LeaveActionResponse>, ServerError> {
	let chain = chains::manager_approve_leave();
	authorize(&state, &user, &chain, None, &client)?;

	let snapshot = load_snapshot(&state, &id).await?;
	let employee = state
		.users
		.get_user_by_id(&snapshot.owner)
		.await?
		.ok_or_else(|| ServerError::NotFound(format!("employee {}", snapshot.owner)))?;

	let same_department = match (&user.actor.department, &employee.department) {
		(Some(mine), Some(theirs)) => mine == theirs,
		_ => false,
	};
	if !same_department {
		return Err(deny(
			&state,
			&user,
			chain.operation(),
			AccessModel::Abac,
			"Managers can only approve leave within their department",
			Some(&snapshot),
			&client,
		));
	}

	let leave = load_leave(&state, &id).await?;
	if leave.duration_days() > MANAGER_APPROVAL_MAX_DAYS {
		return Err(deny_rule(
			&state,
			&user,
			chain.operation(),
			"long_leave_requires_hr",
			"Long leaves (>10 days) require HR approval",
			&snapshot,
			&client,
		));
	}

	let leave = decide(
		&state,
		&user,
		&client,
		&id,
		LeaveStatus::Approved,
		AuditEventType::ManagerApproveLeave,
	)
	.await?;
	Ok(Json(LeaveActionResponse {
		message: "Leave approved by manager".to_string(),
		leave,
	}))
}

#[tracing::instrument(skip(state, client, user, body), fields(user_id = %user.actor.id, leave_id = %id))]
pub async fn update_access(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
	Path(id): Path<LeaveRequestId>,
	Json(body): Json<AccessUpdate>,
) -> Result<Json<LeaveRequest>, ServerError> {
	let snapshot = load_snapshot(&state, &id).await?;
	authorize(
		&state,
		&user,
		&chains::share_leave(),
		Some(&snapshot.owner_only()),
		&client,
	)?;

	let grant: Vec<UserId> = body
		.grant
		.into_iter()
		.filter(|u| *u != snapshot.owner)
		.collect();
	for user_id in &grant {
		if state.users.get_user_by_id(user_id).await?.is_none() {
			return Err(ServerError::BadRequest(format!("Unknown user {user_id}")));
		}
	}

	if !grant.is_empty() {
		state.leaves.grant_access(&id, &grant).await?;
	}
	if !body.revoke.is_empty() {
		state.leaves.revoke_access(&id, &body.revoke).await?;
	}

	let leave = load_leave(&state, &id).await?;
	let ids = |list: &[UserId]| list.iter().map(|u| u.to_string()).collect::<Vec<_>>();
	state.audit.log(
		client
			.apply(AuditLogEntry::builder(AuditEventType::UpdateLeaveAccess))
			.actor(user.actor.id)
			.resource("leave_request", leave.id.to_string())
			.detail("granted", ids(&grant))
			.detail("revoked", ids(&body.revoke))
			.build(),
	);
	Ok(Json(leave))
}

#[tracing::instrument(skip(state, client, user, body), fields(user_id = %user.actor.id, leave_id = %id))]
pub async fn update_classification(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
	Path(id): Path<LeaveRequestId>,
	Json(body): Json<ClassificationUpdate>,
) -> Result<Json<LeaveRequest>, ServerError> {
	authorize(&state, &user, &chains::classify_leave(), None, &client)?;

	state.leaves.set_classification(&id, body.classification).await?;
	let leave = load_leave(&state, &id).await?;

	state.audit.log(
		client
			.apply(AuditLogEntry::builder(AuditEventType::ClassifyLeave))
			.actor(user.actor.id)
			.resource("leave_request", leave.id.to_string())
			.detail("classification", body.classification.as_str())
			.build(),
	);
	Ok(Json(leave))
}
