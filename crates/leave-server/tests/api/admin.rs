// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User administration, audit log queries, backups and health.

use axum::http::{Method, StatusCode};
use leave_server_audit::AuditEventType;
use leave_server_auth::Role;
use leave_server_db::AuditLogFilter;
use serde_json::json;

use super::support::{setup, setup_with};

#[tokio::test]
async fn admin_routes_reject_other_roles() {
	let app = setup().await;
	let (_, hr) = app.user("Hana", Role::Hr, None).await;

	for (method, uri) in [
		(Method::GET, "/api/admin/users"),
		(Method::GET, "/api/logs"),
		(Method::DELETE, "/api/logs"),
		(Method::POST, "/api/backups/manual"),
	] {
		let (status, body) = app.call(method.clone(), uri, Some(&hr), None).await;
		assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
		assert_eq!(body["model"], "rbac");
	}
}

#[tokio::test]
async fn admin_manages_users() {
	let app = setup().await;
	let (_, admin) = app.user("Root", Role::Admin, None).await;
	let (ana_id, ana) = app.user("Ana", Role::Employee, None).await;

	let (status, users) = app.call(Method::GET, "/api/admin/users", Some(&admin), None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(users.as_array().unwrap().len(), 2);

	let user_uri = format!("/api/admin/users/{ana_id}");
	let (status, _) = app
		.call(
			Method::PUT,
			&format!("{user_uri}/role"),
			Some(&admin),
			Some(json!({ "role": "manager" })),
		)
		.await;
	assert_eq!(status, StatusCode::OK);
	let (status, _) = app
		.call(
			Method::PUT,
			&format!("{user_uri}/department"),
			Some(&admin),
			Some(json!({ "department": "Finance" })),
		)
		.await;
	assert_eq!(status, StatusCode::OK);

	let (_, profile) = app.call(Method::GET, &user_uri, Some(&admin), None).await;
	assert_eq!(profile["role"], "manager");
	assert_eq!(profile["department"], "Finance");

	// The promotion applies to the existing session.
	let (status, _) = app
		.call(
			Method::POST,
			&format!("/api/leave/{}/reject", uuid::Uuid::new_v4()),
			Some(&ana),
			None,
		)
		.await;
	assert_eq!(status, StatusCode::NOT_FOUND);

	let (status, body) = app
		.call(Method::PUT, &format!("{user_uri}/toggle-active"), Some(&admin), None)
		.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["is_active"], false);

	let (status, _) = app.call(Method::DELETE, &user_uri, Some(&admin), None).await;
	assert_eq!(status, StatusCode::OK);
	let (status, _) = app.call(Method::GET, &user_uri, Some(&admin), None).await;
	assert_eq!(status, StatusCode::NOT_FOUND);
	let (status, _) = app.call(Method::DELETE, &user_uri, Some(&admin), None).await;
	assert_eq!(status, StatusCode::NOT_FOUND);

	for event in [
		AuditEventType::UpdateUserRole,
		AuditEventType::UpdateUserDepartment,
		AuditEventType::ToggleUserActive,
		AuditEventType::DeleteUser,
	] {
		app.wait_for_audit(
			AuditLogFilter {
				event_type: Some(event),
				..Default::default()
			},
			|logs| logs.len() == 1,
		)
		.await;
	}
}

#[tokio::test]
async fn admins_cannot_remove_themselves() {
	let app = setup().await;
	let (admin_id, admin) = app.user("Root", Role::Admin, None).await;
	let uri = format!("/api/admin/users/{admin_id}");

	let (status, _) = app.call(Method::DELETE, &uri, Some(&admin), None).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	let (status, _) = app
		.call(Method::PUT, &format!("{uri}/toggle-active"), Some(&admin), None)
		.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_role_is_rejected() {
	let app = setup().await;
	let (_, admin) = app.user("Root", Role::Admin, None).await;
	let (ana_id, _) = app.user("Ana", Role::Employee, None).await;

	let (status, _) = app
		.call(
			Method::PUT,
			&format!("/api/admin/users/{ana_id}/role"),
			Some(&admin),
			Some(json!({ "role": "owner" })),
		)
		.await;
	assert!(status.is_client_error());
}

#[tokio::test]
async fn logs_are_filtered_and_paginated() {
	let app = setup().await;
	let (admin_id, admin) = app.user("Root", Role::Admin, None).await;
	app.register("Ana", "ana@example.com", None).await;
	for _ in 0..3 {
		app.call(
			Method::POST,
			"/api/auth/login",
			None,
			Some(json!({ "email": "ana@example.com", "password": "nope-nope" })),
		)
		.await;
	}
	app.wait_for_audit(
		AuditLogFilter {
			event_type: Some(AuditEventType::LoginFailed),
			..Default::default()
		},
		|logs| logs.len() == 3,
	)
	.await;

	let (status, page) = app
		.call(
			Method::GET,
			"/api/logs?action=LOGIN_FAILED&status=FAILED&limit=2",
			Some(&admin),
			None,
		)
		.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(page["total"], 3);
	assert_eq!(page["pages"], 2);
	assert_eq!(page["logs"].as_array().unwrap().len(), 2);

	let (_, page) = app
		.call(
			Method::GET,
			&format!("/api/logs?user={admin_id}&action=OTP_VERIFIED"),
			Some(&admin),
			None,
		)
		.await;
	assert_eq!(page["total"], 1);
	assert_eq!(page["logs"][0]["actor"]["name"], "Root");

	let (status, _) = app
		.call(Method::GET, "/api/logs?action=NOT_A_THING", Some(&admin), None)
		.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn clearing_logs_leaves_a_record() {
	let app = setup().await;
	let (_, admin) = app.user("Root", Role::Admin, None).await;
	app.wait_for_audit(AuditLogFilter::default(), |logs| !logs.is_empty())
		.await;

	let (status, body) = app.call(Method::DELETE, "/api/logs", Some(&admin), None).await;
	assert_eq!(status, StatusCode::OK);
	assert!(body["deleted"].as_u64().unwrap() >= 1);

	app.wait_for_audit(AuditLogFilter::default(), |logs| {
		logs.iter().any(|l| l.event_type == AuditEventType::ClearLogs)
	})
	.await;
}

#[tokio::test]
async fn manual_backup_writes_a_file() {
	let app = setup().await;
	let (_, admin) = app.user("Root", Role::Admin, None).await;

	let (status, body) = app
		.call(Method::POST, "/api/backups/manual", Some(&admin), None)
		.await;
	assert_eq!(status, StatusCode::OK, "{body}");
	let file = body["file"].as_str().unwrap();
	assert!(std::path::Path::new(file).exists());

	app.wait_for_audit(
		AuditLogFilter {
			event_type: Some(AuditEventType::ManualBackup),
			..Default::default()
		},
		|logs| logs.len() == 1 && logs[0].details["file"] == file,
	)
	.await;
}

#[tokio::test]
async fn manual_backup_works_with_schedule_disabled() {
	let app = setup_with(|c| c.backup.enabled = false).await;
	let (_, admin) = app.user("Root", Role::Admin, None).await;

	let (status, _) = app
		.call(Method::POST, "/api/backups/manual", Some(&admin), None)
		.await;
	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_reports_components() {
	let app = setup().await;
	let (status, body) = app.call(Method::GET, "/api/health", None, None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["status"], "healthy");
	assert_eq!(body["components"]["database"]["status"], "healthy");
	assert_eq!(body["components"]["smtp"]["configured"], false);
	assert_eq!(body["components"]["jobs"]["jobs"].as_array().unwrap().len(), 2);
}
