// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Leave request lifecycle through the access chains.

use axum::http::{Method, StatusCode};
use chrono::NaiveDate;
use leave_server_audit::{AuditEventType, AuditOutcome};
use leave_server_auth::{EmailTemplate, Role};
use leave_server_config::{SmtpConfig, TlsMode};
use leave_server_db::AuditLogFilter;
use serde_json::{json, Value};

use super::support::{setup, setup_with, TestApp};

fn leave_body(start: &str, end: &str) -> Value {
	json!({
		"start_date": start,
		"end_date": end,
		"leave_type": "annual",
		"reason": "family trip",
	})
}

async fn file_leave(app: &TestApp, token: &str, start: &str, end: &str) -> String {
	let (status, body) = app
		.call(Method::POST, "/api/leave", Some(token), Some(leave_body(start, end)))
		.await;
	assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
	body["id"].as_str().unwrap().to_string()
}

fn set_local_time(app: &TestApp, hour: u32, minute: u32) {
	let at = NaiveDate::from_ymd_opt(2025, 1, 6)
		.unwrap()
		.and_hms_opt(hour, minute, 0)
		.unwrap()
		.and_utc()
		.fixed_offset();
	app.clock.set(at);
}

async fn classify(app: &TestApp, hr: &str, id: &str, classification: &str) {
	let (status, _) = app
		.call(
			Method::PUT,
			&format!("/api/leave/{id}/classification"),
			Some(hr),
			Some(json!({ "classification": classification })),
		)
		.await;
	assert_eq!(status, StatusCode::OK);
}

mod create {
	use super::*;

	#[tokio::test]
	async fn creates_a_pending_internal_request() {
		let app = setup().await;
		let (owner, token) = app.user("Ana", Role::Employee, None).await;

		let (status, body) = app
			.call(
				Method::POST,
				"/api/leave",
				Some(&token),
				Some(leave_body("2025-03-03", "2025-03-07")),
			)
			.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(body["status"], "pending");
		assert_eq!(body["classification"], "internal");
		assert_eq!(body["employee_id"], owner.to_string());

		let (_, mine) = app.call(Method::GET, "/api/leave/mine", Some(&token), None).await;
		assert_eq!(mine.as_array().unwrap().len(), 1);

		app.wait_for_audit(
			AuditLogFilter {
				event_type: Some(AuditEventType::CreateLeave),
				actor: Some(owner),
				..Default::default()
			},
			|logs| logs.len() == 1,
		)
		.await;
	}

	#[tokio::test]
	async fn outside_working_hours_is_refused_except_for_admins() {
		let app = setup().await;
		let (_, employee) = app.user("Ben", Role::Employee, None).await;
		let (_, admin) = app.user("Root", Role::Admin, None).await;
		set_local_time(&app, 20, 0);

		let (status, body) = app
			.call(
				Method::POST,
				"/api/leave",
				Some(&employee),
				Some(leave_body("2025-03-03", "2025-03-04")),
			)
			.await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["model"], "rubac_time");

		let (status, _) = app
			.call(
				Method::POST,
				"/api/leave",
				Some(&admin),
				Some(leave_body("2025-03-03", "2025-03-04")),
			)
			.await;
		assert_eq!(status, StatusCode::CREATED);

		app.wait_for_audit(
			AuditLogFilter {
				event_type: Some(AuditEventType::AccessDenied),
				outcome: Some(AuditOutcome::Denied),
				..Default::default()
			},
			|logs| logs.iter().any(|l| l.details["model"] == "rubac_time"),
		)
		.await;
	}

	#[tokio::test]
	async fn validates_dates_and_reason() {
		let app = setup().await;
		let (_, token) = app.user("Cid", Role::Employee, None).await;

		let (status, _) = app
			.call(
				Method::POST,
				"/api/leave",
				Some(&token),
				Some(leave_body("2025-03-07", "2025-03-03")),
			)
			.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);

		let mut body = leave_body("2025-03-03", "2025-03-04");
		body["reason"] = json!("   ");
		let (status, _) = app.call(Method::POST, "/api/leave", Some(&token), Some(body)).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn approvers_are_notified() {
		let app = setup_with(|c| {
			c.smtp = Some(SmtpConfig {
				host: "localhost".to_string(),
				port: 25,
				username: None,
				password: None,
				from_address: "leave@example.com".to_string(),
				from_name: "Leave".to_string(),
				tls_mode: TlsMode::None,
				approver_addresses: vec!["hr@example.com".to_string()],
			});
		})
		.await;
		let (_, token) = app.user("Dee", Role::Employee, None).await;
		file_leave(&app, &token, "2025-03-03", "2025-03-04").await;

		app.wait_for_mail(|(to, template)| {
			to == "hr@example.com"
				&& matches!(template, EmailTemplate::LeaveRequest { employee, .. } if employee == "Dee")
		})
		.await;
	}
}

mod read {
	use super::*;
	use async_trait::async_trait;
	use leave_server_auth::{
		Classification, LeaveRequestId, ResourceSnapshot, ResourceSnapshotStore, StoreError,
	};
	use std::sync::Arc;

	/// Serves fixed snapshots regardless of what the leave table holds.
	struct FixedSnapshots(Vec<ResourceSnapshot>);

	#[async_trait]
	impl ResourceSnapshotStore for FixedSnapshots {
		async fn get_resource_snapshot(
			&self,
			id: &LeaveRequestId,
		) -> Result<Option<ResourceSnapshot>, StoreError> {
			Ok(self.0.iter().find(|s| s.id == *id).cloned())
		}
	}

	#[tokio::test]
	async fn decisions_read_the_snapshot_store() {
		let app = setup().await;
		let (owner_id, owner) = app.user("Ana", Role::Employee, None).await;
		let (manager_id, manager) = app.user("Max", Role::Manager, None).await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-04").await;
		let uri = format!("/api/leave/{id}");

		let (status, _) = app.call(Method::GET, &uri, Some(&manager), None).await;
		assert_eq!(status, StatusCode::FORBIDDEN);

		// The table still lists no delegates; the store says otherwise.
		let leave_id: LeaveRequestId = id.parse().unwrap();
		let snapshot = ResourceSnapshot::new(leave_id, Classification::Internal, owner_id)
			.with_delegates([manager_id]);
		let app = app.with_resource_store(Arc::new(FixedSnapshots(vec![snapshot])));

		let (status, body) = app.call(Method::GET, &uri, Some(&manager), None).await;
		assert_eq!(status, StatusCode::OK, "{body}");
		assert_eq!(body["id"], json!(id));
	}

	#[tokio::test]
	async fn missing_snapshot_is_not_found() {
		let app = setup().await;
		let (_, owner) = app.user("Ana", Role::Employee, None).await;
		let (_, manager) = app.user("Max", Role::Manager, None).await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-04").await;
		let app = app.with_resource_store(Arc::new(FixedSnapshots(Vec::new())));

		let (status, _) = app
			.call(Method::GET, &format!("/api/leave/{id}"), Some(&manager), None)
			.await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		let (status, _) = app
			.call(
				Method::PUT,
				&format!("/api/leave/{id}"),
				Some(&owner),
				Some(json!({ "reason": "changed plans" })),
			)
			.await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn internal_requests_need_clearance_and_ownership() {
		let app = setup().await;
		let (_, owner) = app.user("Ana", Role::Employee, None).await;
		let (manager_id, manager) = app.user("Max", Role::Manager, None).await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-04").await;
		let uri = format!("/api/leave/{id}");

		// Employees are not cleared for internal material, even their own.
		let (status, body) = app.call(Method::GET, &uri, Some(&owner), None).await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["model"], "mac");

		// Cleared, but neither owner nor delegate.
		let (status, body) = app.call(Method::GET, &uri, Some(&manager), None).await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["model"], "dac");

		let (status, _) = app
			.call(
				Method::PUT,
				&format!("{uri}/access"),
				Some(&owner),
				Some(json!({ "grant": [manager_id] })),
			)
			.await;
		assert_eq!(status, StatusCode::OK);

		let (status, body) = app.call(Method::GET, &uri, Some(&manager), None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["employee"]["name"], "Ana");
		assert_eq!(body["delegated_access"], json!([manager_id]));
	}

	#[tokio::test]
	async fn hr_reads_everything() {
		let app = setup().await;
		let (_, owner) = app.user("Ana", Role::Employee, None).await;
		let (_, hr) = app.user("Hana", Role::Hr, None).await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-04").await;
		classify(&app, &hr, &id, "confidential").await;

		let (status, body) = app
			.call(Method::GET, &format!("/api/leave/{id}"), Some(&hr), None)
			.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["classification"], "confidential");
	}

	#[tokio::test]
	async fn classification_changes_who_may_read() {
		let app = setup().await;
		let (_, owner) = app.user("Ana", Role::Employee, None).await;
		let (_, other) = app.user("Ola", Role::Employee, None).await;
		let (manager_id, manager) = app.user("Max", Role::Manager, None).await;
		let (_, hr) = app.user("Hana", Role::Hr, None).await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-04").await;
		let uri = format!("/api/leave/{id}");

		classify(&app, &hr, &id, "public").await;
		assert_eq!(app.call(Method::GET, &uri, Some(&owner), None).await.0, StatusCode::OK);
		let (status, body) = app.call(Method::GET, &uri, Some(&other), None).await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["model"], "dac");

		app.call(
			Method::PUT,
			&format!("{uri}/access"),
			Some(&owner),
			Some(json!({ "grant": [manager_id] })),
		)
		.await;
		classify(&app, &hr, &id, "confidential").await;
		let (status, body) = app.call(Method::GET, &uri, Some(&manager), None).await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["model"], "mac");
	}

	#[tokio::test]
	async fn only_hr_and_admin_classify() {
		let app = setup().await;
		let (_, owner) = app.user("Ana", Role::Employee, None).await;
		let (_, manager) = app.user("Max", Role::Manager, None).await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-04").await;

		let (status, body) = app
			.call(
				Method::PUT,
				&format!("/api/leave/{id}/classification"),
				Some(&manager),
				Some(json!({ "classification": "public" })),
			)
			.await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["model"], "rbac");
	}

	#[tokio::test]
	async fn missing_request_is_404() {
		let app = setup().await;
		let (_, hr) = app.user("Hana", Role::Hr, None).await;
		let (status, _) = app
			.call(
				Method::GET,
				&format!("/api/leave/{}", uuid::Uuid::new_v4()),
				Some(&hr),
				None,
			)
			.await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}
}

mod edit {
	use super::*;

	#[tokio::test]
	async fn owner_edits_pending_requests_only() {
		let app = setup().await;
		let (_, owner) = app.user("Ana", Role::Employee, None).await;
		let (_, hr) = app.user("Hana", Role::Hr, None).await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-04").await;
		let uri = format!("/api/leave/{id}");

		let (status, body) = app
			.call(Method::PUT, &uri, Some(&owner), Some(json!({ "end_date": "2025-03-05" })))
			.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["leave"]["end_date"], "2025-03-05");
		assert_eq!(body["leave"]["reason"], "family trip");

		let (status, _) = app
			.call(Method::PUT, &uri, Some(&owner), Some(json!({ "end_date": "2025-03-01" })))
			.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);

		app.call(Method::POST, &format!("{uri}/approve"), Some(&hr), None)
			.await;
		let (status, _) = app
			.call(Method::PUT, &uri, Some(&owner), Some(json!({ "reason": "changed" })))
			.await;
		assert_eq!(status, StatusCode::CONFLICT);
	}

	#[tokio::test]
	async fn delegates_may_not_edit_or_share() {
		let app = setup().await;
		let (_, owner) = app.user("Ana", Role::Employee, None).await;
		let (delegate_id, delegate) = app.user("Max", Role::Manager, None).await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-04").await;
		let uri = format!("/api/leave/{id}");
		app.call(
			Method::PUT,
			&format!("{uri}/access"),
			Some(&owner),
			Some(json!({ "grant": [delegate_id] })),
		)
		.await;

		let (status, body) = app
			.call(Method::PUT, &uri, Some(&delegate), Some(json!({ "reason": "mine now" })))
			.await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["model"], "dac");

		let (status, _) = app
			.call(
				Method::PUT,
				&format!("{uri}/access"),
				Some(&delegate),
				Some(json!({ "revoke": [delegate_id] })),
			)
			.await;
		assert_eq!(status, StatusCode::FORBIDDEN);
	}

	#[tokio::test]
	async fn sharing_validates_and_revokes() {
		let app = setup().await;
		let (_, owner) = app.user("Ana", Role::Employee, None).await;
		let (peer_id, _) = app.user("Pia", Role::Employee, None).await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-04").await;
		let uri = format!("/api/leave/{id}/access");

		let (status, _) = app
			.call(
				Method::PUT,
				&uri,
				Some(&owner),
				Some(json!({ "grant": [uuid::Uuid::new_v4()] })),
			)
			.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);

		let (_, body) = app
			.call(Method::PUT, &uri, Some(&owner), Some(json!({ "grant": [peer_id] })))
			.await;
		assert_eq!(body["delegated_access"], json!([peer_id]));

		let (_, body) = app
			.call(Method::PUT, &uri, Some(&owner), Some(json!({ "revoke": [peer_id] })))
			.await;
		assert_eq!(body["delegated_access"], json!([]));

		app.wait_for_audit(
			AuditLogFilter {
				event_type: Some(AuditEventType::UpdateLeaveAccess),
				..Default::default()
			},
			|logs| logs.len() == 2,
		)
		.await;
	}
}

mod decide {
	use super::*;

	#[tokio::test]
	async fn approval_is_for_hr_and_admin() {
		let app = setup().await;
		let (_, owner) = app.user("Ana", Role::Employee, None).await;
		let (_, manager) = app.user("Max", Role::Manager, None).await;
		let (hr_id, hr) = app.user("Hana", Role::Hr, None).await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-04").await;
		let uri = format!("/api/leave/{id}/approve");

		for token in [&owner, &manager] {
			let (status, body) = app.call(Method::POST, &uri, Some(token), None).await;
			assert_eq!(status, StatusCode::FORBIDDEN);
			assert_eq!(body["model"], "rbac");
		}

		let (status, body) = app.call(Method::POST, &uri, Some(&hr), None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["leave"]["status"], "approved");
		assert_eq!(body["leave"]["approved_by"], hr_id.to_string());

		let (status, _) = app.call(Method::POST, &uri, Some(&hr), None).await;
		assert_eq!(status, StatusCode::CONFLICT);

		app.wait_for_mail(|(to, template)| {
			to == "ana@example.com" && matches!(template, EmailTemplate::LeaveApproved { .. })
		})
		.await;
	}

	#[tokio::test]
	async fn managers_may_reject() {
		let app = setup().await;
		let (_, owner) = app.user("Ana", Role::Employee, None).await;
		let (_, manager) = app.user("Max", Role::Manager, None).await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-04").await;

		let (status, body) = app
			.call(Method::POST, &format!("/api/leave/{id}/reject"), Some(&manager), None)
			.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["leave"]["status"], "rejected");

		app.wait_for_mail(|(to, template)| {
			to == "ana@example.com" && matches!(template, EmailTemplate::LeaveRejected { .. })
		})
		.await;
		app.wait_for_audit(
			AuditLogFilter {
				event_type: Some(AuditEventType::RejectLeave),
				..Default::default()
			},
			|logs| logs.len() == 1,
		)
		.await;
	}

	#[tokio::test]
	async fn deciding_a_missing_request_is_404() {
		let app = setup().await;
		let (_, hr) = app.user("Hana", Role::Hr, None).await;
		let (status, _) = app
			.call(
				Method::POST,
				&format!("/api/leave/{}/approve", uuid::Uuid::new_v4()),
				Some(&hr),
				None,
			)
			.await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}
}

mod manager_approve {
	use super::*;

	async fn scenario(employee_dept: &str) -> (TestApp, String, String) {
		let app = setup().await;
		let (_, owner) = app.user("Ana", Role::Employee, Some(employee_dept)).await;
		let (_, manager) = app.user("Max", Role::Manager, Some("Finance")).await;
		(app, owner, manager)
	}

	#[tokio::test]
	async fn same_department_short_leave_is_approved() {
		let (app, owner, manager) = scenario("Finance").await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-07").await;

		let (status, body) = app
			.call(
				Method::POST,
				&format!("/api/leave/{id}/manager-approve"),
				Some(&manager),
				None,
			)
			.await;
		assert_eq!(status, StatusCode::OK, "{body}");
		assert_eq!(body["leave"]["status"], "approved");
	}

	#[tokio::test]
	async fn other_departments_are_refused() {
		let (app, owner, manager) = scenario("Sales").await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-04").await;

		let (status, body) = app
			.call(
				Method::POST,
				&format!("/api/leave/{id}/manager-approve"),
				Some(&manager),
				None,
			)
			.await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["model"], "abac");
	}

	#[tokio::test]
	async fn long_leave_needs_hr() {
		let (app, owner, manager) = scenario("Finance").await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-15").await;

		let (status, body) = app
			.call(
				Method::POST,
				&format!("/api/leave/{id}/manager-approve"),
				Some(&manager),
				None,
			)
			.await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["message"], "Long leaves (>10 days) require HR approval");

		app.wait_for_audit(
			AuditLogFilter {
				event_type: Some(AuditEventType::AccessDenied),
				..Default::default()
			},
			|logs| logs.iter().any(|l| l.details["rule"] == "long_leave_requires_hr"),
		)
		.await;
	}

	#[tokio::test]
	async fn ten_days_is_still_a_manager_decision() {
		let (app, owner, manager) = scenario("Finance").await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-13").await;

		let (status, _) = app
			.call(
				Method::POST,
				&format!("/api/leave/{id}/manager-approve"),
				Some(&manager),
				None,
			)
			.await;
		assert_eq!(status, StatusCode::OK);
	}

	#[tokio::test]
	async fn outside_office_hours_is_refused() {
		let (app, owner, manager) = scenario("Finance").await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-04").await;
		set_local_time(&app, 18, 30);

		let (status, body) = app
			.call(
				Method::POST,
				&format!("/api/leave/{id}/manager-approve"),
				Some(&manager),
				None,
			)
			.await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["model"], "abac");
	}

	#[tokio::test]
	async fn configured_bundle_sets_approval_hours() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("server.toml");
		std::fs::write(
			&path,
			r#"
[[policy.attribute_policies]]
name = "manager_approve"
role = "Manager"
time_window = { start = "09:00", end = "20:00" }
"#,
		)
		.unwrap();
		let loaded = leave_server_config::load_config_with_file(path.clone()).unwrap();

		let app = setup_with(|c| c.policy = loaded.policy).await;
		let (_, owner) = app.user("Ana", Role::Employee, Some("Finance")).await;
		let (_, manager) = app.user("Max", Role::Manager, Some("Finance")).await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-04").await;
		set_local_time(&app, 18, 30);

		let (status, body) = app
			.call(
				Method::POST,
				&format!("/api/leave/{id}/manager-approve"),
				Some(&manager),
				None,
			)
			.await;
		assert_eq!(status, StatusCode::OK, "{body}");
	}

	#[tokio::test]
	async fn configured_location_limits_filing() {
		let app = setup_with(|c| c.policy.allowed_locations = vec!["Lagos".to_string()]).await;
		let (_, token) = app.user("Ana", Role::Employee, None).await;

		let (status, body) = app
			.call(
				Method::POST,
				"/api/leave",
				Some(&token),
				Some(leave_body("2025-03-03", "2025-03-04")),
			)
			.await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["model"], "rubac_location");
	}

	#[tokio::test]
	async fn non_managers_are_refused() {
		let (app, owner, _) = scenario("Finance").await;
		let id = file_leave(&app, &owner, "2025-03-03", "2025-03-04").await;

		let (status, body) = app
			.call(
				Method::POST,
				&format!("/api/leave/{id}/manager-approve"),
				Some(&owner),
				None,
			)
			.await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["model"], "abac");
	}
}
