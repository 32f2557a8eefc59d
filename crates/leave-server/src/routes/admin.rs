// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User administration. Every route requires the admin role.

use axum::{
	extract::{Path, State},
	Json,
};
use leave_server_audit::{AuditEventType, AuditLogBuilder, AuditLogEntry};
use leave_server_auth::{Role, UserId};
use leave_server_db::UserProfile;
use serde::{Deserialize, Serialize};

use crate::{
	api::AppState,
	api_response::{message, MessageResponse},
	auth_middleware::{CurrentUser, RequireAuth},
	authz::{authorize, chains},
	client_info::ClientInfo,
	error::ServerError,
};

#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
	pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct DepartmentUpdate {
	pub department: String,
}

#[derive(Debug, Serialize)]
pub struct ToggleActiveResponse {
	pub message: String,
	pub is_active: bool,
}

fn require_admin(
	state: &AppState,
	user: &CurrentUser,
	client: &ClientInfo,
) -> Result<(), ServerError> {
	authorize(state, user, &chains::administer(), None, client)
}

fn user_entry(
	event: AuditEventType,
	admin: &CurrentUser,
	target: &UserId,
	client: &ClientInfo,
) -> AuditLogBuilder {
	client
		.apply(AuditLogEntry::builder(event))
		.actor(admin.actor.id)
		.resource("user", target.to_string())
}

#[tracing::instrument(skip(state, client, user), fields(user_id = %user.actor.id))]
pub async fn list_users(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<UserProfile>>, ServerError> {
	require_admin(&state, &user, &client)?;
	Ok(Json(state.users.list_users().await?))
}

#[tracing::instrument(skip(state, client, user), fields(user_id = %user.actor.id, target = %id))]
pub async fn get_user(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
	Path(id): Path<UserId>,
) -> Result<Json<UserProfile>, ServerError> {
	require_admin(&state, &user, &client)?;
	state
		.users
		.get_user_by_id(&id)
		.await?
		.map(Json)
		.ok_or_else(|| ServerError::NotFound(format!("user {id}")))
}

#[tracing::instrument(skip(state, client, user, body), fields(user_id = %user.actor.id, target = %id))]
pub async fn update_role(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
	Path(id): Path<UserId>,
	Json(body): Json<RoleUpdate>,
) -> Result<Json<MessageResponse>, ServerError> {
	require_admin(&state, &user, &client)?;
	state.users.update_role(&id, body.role).await?;

	state.audit.log(
		user_entry(AuditEventType::UpdateUserRole, &user, &id, &client)
			.detail("role", body.role.as_str())
			.build(),
	);
	Ok(message(format!("Role updated to {}", body.role)))
}

#[tracing::instrument(skip(state, client, user, body), fields(user_id = %user.actor.id, target = %id))]
pub async fn update_department(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
	Path(id): Path<UserId>,
	Json(body): Json<DepartmentUpdate>,
) -> Result<Json<MessageResponse>, ServerError> {
	require_admin(&state, &user, &client)?;
	let department = body.department.trim();
	if department.is_empty() {
		return Err(ServerError::BadRequest("Department is required".to_string()));
	}
	state.users.update_department(&id, department).await?;

	state.audit.log(
		user_entry(AuditEventType::UpdateUserDepartment, &user, &id, &client)
			.detail("department", department)
			.build(),
	);
	Ok(message("Department updated"))
}

#[tracing::instrument(skip(state, client, user), fields(user_id = %user.actor.id, target = %id))]
pub async fn toggle_active(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
	Path(id): Path<UserId>,
) -> Result<Json<ToggleActiveResponse>, ServerError> {
	require_admin(&state, &user, &client)?;
	if id == user.actor.id {
		return Err(ServerError::BadRequest(
			"Administrators cannot deactivate themselves".to_string(),
		));
	}
	let is_active = state.users.toggle_active(&id).await?;

	state.audit.log(
		user_entry(AuditEventType::ToggleUserActive, &user, &id, &client)
			.detail("is_active", is_active)
			.build(),
	);
	let verb = if is_active { "activated" } else { "deactivated" };
	Ok(Json(ToggleActiveResponse {
		message: format!("User {verb}"),
		is_active,
	}))
}

#[tracing::instrument(skip(state, client, user), fields(user_id = %user.actor.id, target = %id))]
pub async fn unlock_user(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
	Path(id): Path<UserId>,
) -> Result<Json<MessageResponse>, ServerError> {
	require_admin(&state, &user, &client)?;
	state.auth.unlock(&id).await?;

	state
		.audit
		.log(user_entry(AuditEventType::UnlockAccount, &user, &id, &client).build());
	Ok(message("Account unlocked"))
}

#[tracing::instrument(skip(state, client, user), fields(user_id = %user.actor.id, target = %id))]
pub async fn delete_user(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
	Path(id): Path<UserId>,
) -> Result<Json<MessageResponse>, ServerError> {
	require_admin(&state, &user, &client)?;
	if id == user.actor.id {
		return Err(ServerError::BadRequest(
			"Administrators cannot delete themselves".to_string(),
		));
	}
	if !state.users.delete_user(&id).await? {
		return Err(ServerError::NotFound(format!("user {id}")));
	}

	state
		.audit
		.log(user_entry(AuditEventType::DeleteUser, &user, &id, &client).build());
	Ok(message("User deleted"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn role_update_accepts_hr_alias() {
		let body: RoleUpdate = serde_json::from_str(r#"{"role":"HR"}"#).unwrap();
		assert_eq!(body.role, Role::Hr);
	}

	#[test]
	fn role_update_rejects_unknown_roles() {
		assert!(serde_json::from_str::<RoleUpdate>(r#"{"role":"owner"}"#).is_err());
	}
}
