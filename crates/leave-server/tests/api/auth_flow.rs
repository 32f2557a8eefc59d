// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Registration, password + OTP login, lockout and session lifetime.

use axum::http::{header::SET_COOKIE, Method, StatusCode};
use chrono::Duration;
use leave_server_audit::{AuditEventType, AuditOutcome};
use leave_server_auth::{EmailTemplate, Role};
use leave_server_db::AuditLogFilter;
use serde_json::json;

use super::support::{setup, setup_with, PASSWORD};

async fn attempt(app: &super::support::TestApp, email: &str, password: &str) -> StatusCode {
	app.call(
		Method::POST,
		"/api/auth/login",
		None,
		Some(json!({ "email": email, "password": password })),
	)
	.await
	.0
}

#[tokio::test]
async fn register_login_and_verify_issues_a_working_session() {
	let app = setup().await;
	app.register("Ana", "ana@example.com", Some("Finance")).await;

	let (status, body) = app
		.call(
			Method::POST,
			"/api/auth/login",
			None,
			Some(json!({ "email": "Ana@Example.com", "password": PASSWORD })),
		)
		.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["message"], "OTP sent to email");
	assert_eq!(body["email"], "ana@example.com");

	let otp = app.wait_for_otp("ana@example.com").await;
	assert_eq!(otp.len(), 6);
	assert!(otp.chars().all(|c| c.is_ascii_digit()));

	let response = app
		.request(
			Method::POST,
			"/api/auth/verify-otp",
			None,
			Some(json!({ "email": "ana@example.com", "otp": otp })),
		)
		.await;
	assert_eq!(response.status(), StatusCode::OK);
	let cookie = response
		.headers()
		.get(SET_COOKIE)
		.unwrap()
		.to_str()
		.unwrap()
		.to_string();
	assert!(cookie.starts_with("token="));
	assert!(cookie.contains("HttpOnly"));
	assert!(cookie.contains("Max-Age=3600"));

	let body = super::support::json_body(response).await;
	assert_eq!(body["user"]["role"], "employee");
	let token = body["token"].as_str().unwrap();

	let (status, leaves) = app
		.call(Method::GET, "/api/leave/mine", Some(token), None)
		.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(leaves, json!([]));
}

#[tokio::test]
async fn protected_routes_require_a_session() {
	let app = setup().await;
	let (status, body) = app.call(Method::GET, "/api/leave/mine", None, None).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);
	assert_eq!(body["error"], "unauthorized");

	let (status, _) = app
		.call(Method::GET, "/api/leave/mine", Some("not.a-token"), None)
		.await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_user_and_wrong_password_look_the_same() {
	let app = setup().await;
	app.register("Ben", "ben@example.com", None).await;

	let (s1, b1) = app
		.call(
			Method::POST,
			"/api/auth/login",
			None,
			Some(json!({ "email": "nobody@example.com", "password": PASSWORD })),
		)
		.await;
	let (s2, b2) = app
		.call(
			Method::POST,
			"/api/auth/login",
			None,
			Some(json!({ "email": "ben@example.com", "password": "wrong-password" })),
		)
		.await;
	assert_eq!(s1, StatusCode::UNAUTHORIZED);
	assert_eq!(s2, StatusCode::UNAUTHORIZED);
	assert_eq!(b1, b2);
}

#[tokio::test]
async fn fifth_failure_locks_until_an_admin_unlocks() {
	let app = setup().await;
	let id = app.register("Cara", "cara@example.com", None).await;
	let (_, admin) = app.user("Root", Role::Admin, None).await;

	for _ in 0..4 {
		assert_eq!(
			attempt(&app, "cara@example.com", "bad-password").await,
			StatusCode::UNAUTHORIZED
		);
	}
	assert_eq!(
		attempt(&app, "cara@example.com", "bad-password").await,
		StatusCode::LOCKED
	);
	// Correct password no longer helps.
	assert_eq!(attempt(&app, "cara@example.com", PASSWORD).await, StatusCode::LOCKED);

	app.wait_for_mail(|(to, template)| {
		to == "cara@example.com" && matches!(template, EmailTemplate::SuspiciousLogin { .. })
	})
	.await;

	let (status, _) = app
		.call(
			Method::PUT,
			&format!("/api/admin/users/{id}/unlock"),
			Some(&admin),
			None,
		)
		.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(attempt(&app, "cara@example.com", PASSWORD).await, StatusCode::OK);

	app.wait_for_audit(
		AuditLogFilter {
			event_type: Some(AuditEventType::AccountLocked),
			..Default::default()
		},
		|logs| logs.iter().any(|l| l.outcome == AuditOutcome::Failed),
	)
	.await;
	app.wait_for_audit(
		AuditLogFilter {
			event_type: Some(AuditEventType::UnlockAccount),
			..Default::default()
		},
		|logs| logs.len() == 1,
	)
	.await;
}

#[tokio::test]
async fn successful_login_resets_the_failure_count() {
	let app = setup().await;
	app.register("Dan", "dan@example.com", None).await;

	for _ in 0..4 {
		attempt(&app, "dan@example.com", "bad-password").await;
	}
	assert_eq!(attempt(&app, "dan@example.com", PASSWORD).await, StatusCode::OK);
	for _ in 0..4 {
		assert_eq!(
			attempt(&app, "dan@example.com", "bad-password").await,
			StatusCode::UNAUTHORIZED
		);
	}
}

#[tokio::test]
async fn otp_is_single_use() {
	let app = setup().await;
	app.register("Eve", "eve@example.com", None).await;
	assert_eq!(attempt(&app, "eve@example.com", PASSWORD).await, StatusCode::OK);
	let otp = app.wait_for_otp("eve@example.com").await;

	let verify = || {
		app.call(
			Method::POST,
			"/api/auth/verify-otp",
			None,
			Some(json!({ "email": "eve@example.com", "otp": otp })),
		)
	};
	assert_eq!(verify().await.0, StatusCode::OK);
	let (status, body) = verify().await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);
	assert_eq!(body["message"], "Invalid or expired OTP");
}

#[tokio::test]
async fn otp_expires_after_three_minutes() {
	let app = setup().await;
	app.register("Fay", "fay@example.com", None).await;
	assert_eq!(attempt(&app, "fay@example.com", PASSWORD).await, StatusCode::OK);
	let otp = app.wait_for_otp("fay@example.com").await;

	app.clock.advance(Duration::seconds(181));
	let (status, _) = app
		.call(
			Method::POST,
			"/api/auth/verify-otp",
			None,
			Some(json!({ "email": "fay@example.com", "otp": otp })),
		)
		.await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);

	app.wait_for_audit(
		AuditLogFilter {
			event_type: Some(AuditEventType::OtpFailed),
			..Default::default()
		},
		|logs| !logs.is_empty(),
	)
	.await;
}

#[tokio::test]
async fn session_expires_after_an_hour() {
	let app = setup().await;
	let (_, token) = app.user("Gus", Role::Employee, None).await;

	app.clock.advance(Duration::minutes(59));
	let (status, _) = app.call(Method::GET, "/api/leave/mine", Some(&token), None).await;
	assert_eq!(status, StatusCode::OK);

	app.clock.advance(Duration::minutes(2));
	let (status, _) = app.call(Method::GET, "/api/leave/mine", Some(&token), None).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
	let app = setup().await;
	app.register("Hal", "hal@example.com", None).await;
	let (status, _) = app
		.call(
			Method::POST,
			"/api/auth/register",
			None,
			Some(json!({ "name": "Hal Two", "email": "HAL@example.com", "password": PASSWORD })),
		)
		.await;
	assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn registration_validates_input() {
	let app = setup().await;
	for body in [
		json!({ "name": "", "email": "x@example.com", "password": PASSWORD }),
		json!({ "name": "X", "email": "not-an-email", "password": PASSWORD }),
		json!({ "name": "X", "email": "x@example.com", "password": "short" }),
	] {
		let (status, _) = app
			.call(Method::POST, "/api/auth/register", None, Some(body.clone()))
			.await;
		assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
	}
}

#[tokio::test]
async fn registration_can_be_disabled() {
	let app = setup_with(|c| c.auth.signups_disabled = true).await;
	let (status, _) = app
		.call(
			Method::POST,
			"/api/auth/register",
			None,
			Some(json!({ "name": "Ivy", "email": "ivy@example.com", "password": PASSWORD })),
		)
		.await;
	assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deactivated_users_cannot_log_in_or_use_sessions() {
	let app = setup().await;
	let (id, token) = app.user("Jo", Role::Employee, None).await;

	assert!(!app.state.users.toggle_active(&id).await.unwrap());

	let (status, _) = app.call(Method::GET, "/api/leave/mine", Some(&token), None).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);
	assert_eq!(
		attempt(&app, "jo@example.com", PASSWORD).await,
		StatusCode::UNAUTHORIZED
	);
}

#[tokio::test]
async fn logout_expires_the_cookie() {
	let app = setup().await;
	let (_, token) = app.user("Kim", Role::Employee, None).await;

	let response = app
		.request(Method::POST, "/api/auth/logout", Some(&token), None)
		.await;
	assert_eq!(response.status(), StatusCode::OK);
	let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
	assert!(cookie.contains("Max-Age=0"));

	app.wait_for_audit(
		AuditLogFilter {
			event_type: Some(AuditEventType::Logout),
			..Default::default()
		},
		|logs| logs.len() == 1,
	)
	.await;
}
