// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Registration and the two-step login.
//!
//! `login` checks the password and mails a one-time code; `verify-otp`
//! exchanges the code for a session token, returned in the body and as an
//! HttpOnly cookie.

use axum::{
	extract::State,
	http::{header::SET_COOKIE, StatusCode},
	response::{IntoResponse, Response},
	Json,
};
use chrono::{DateTime, Utc};
use leave_server_audit::{AuditEventType, AuditLogEntry};
use leave_server_auth::{AuthError, Registration, Role, UserId};
use leave_server_db::UserProfile;
use leave_server_smtp::is_valid_email;
use serde::{Deserialize, Serialize};

use crate::{
	api::AppState,
	api_response::message,
	auth_middleware::OptionalAuth,
	client_info::ClientInfo,
	error::ServerError,
};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
	pub name: String,
	pub email: String,
	pub password: String,
	#[serde(default)]
	pub department: Option<String>,
	#[serde(default)]
	pub location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
	pub message: String,
	pub id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
	pub email: String,
	pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
	pub message: String,
	pub email: String,
	pub otp_expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
	pub email: String,
	pub otp: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
	pub message: String,
	pub token: String,
	pub expires_at: DateTime<Utc>,
	pub user: UserProfile,
}

fn normalize_email(email: &str) -> String {
	email.trim().to_ascii_lowercase()
}

#[tracing::instrument(skip(state, client, body))]
pub async fn register(
	State(state): State<AppState>,
	client: ClientInfo,
	Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ServerError> {
	if state.config.auth.signups_disabled {
		return Err(ServerError::Forbidden("Registration is disabled".to_string()));
	}

	let name = body.name.trim().to_string();
	let email = normalize_email(&body.email);
	if name.is_empty() {
		return Err(ServerError::BadRequest("Name is required".to_string()));
	}
	if !is_valid_email(&email) {
		return Err(ServerError::BadRequest("A valid email is required".to_string()));
	}
	if body.password.chars().count() < MIN_PASSWORD_LEN {
		return Err(ServerError::BadRequest(format!(
			"Password must be at least {MIN_PASSWORD_LEN} characters"
		)));
	}

	let registration = Registration {
		name,
		identifier: email.clone(),
		password: body.password,
		role: Role::Employee,
		department: body.department.filter(|d| !d.trim().is_empty()),
		location: body.location.filter(|l| !l.trim().is_empty()),
	};

	let audit = client.apply(AuditLogEntry::builder(AuditEventType::Register).detail("email", email.as_str()));
	match state.auth.register(registration).await {
		Ok(id) => {
			state.audit.log(audit.actor(id).resource("user", id.to_string()).build());
			Ok((
				StatusCode::CREATED,
				Json(RegisterResponse {
					message: "Registration successful".to_string(),
					id,
				}),
			))
		}
		Err(AuthError::Conflict(_)) => {
			state
				.audit
				.log(audit.failed().detail("reason", "email_taken").build());
			Err(ServerError::Conflict("Email already registered".to_string()))
		}
		Err(e) => Err(e.into()),
	}
}

#[tracing::instrument(skip(state, client, body))]
pub async fn login(
	State(state): State<AppState>,
	client: ClientInfo,
	Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServerError> {
	let email = normalize_email(&body.email);
	let profile = state.users.get_user_by_email(&email).await?;
	let known_id = profile.as_ref().map(|p| p.id);

	let failure = |event: AuditEventType, reason: &str| {
		client
			.apply(AuditLogEntry::builder(event))
			.failed()
			.actor_opt(known_id)
			.detail("email", email.as_str())
			.detail("reason", reason)
			.build()
	};

	if profile.as_ref().is_some_and(|p| !p.is_active) {
		state.audit.log(failure(AuditEventType::LoginFailed, "inactive"));
		return Err(AuthError::AuthenticationFailure.into());
	}

	match state
		.auth
		.authenticate_from(&email, &body.password, &client.login_origin())
		.await
	{
		Ok(pending) => {
			state.audit.log(
				client
					.apply(AuditLogEntry::builder(AuditEventType::Login))
					.actor(pending.user_id)
					.detail("stage", "password")
					.build(),
			);
			Ok(Json(LoginResponse {
				message: "OTP sent to email".to_string(),
				email: pending.identifier,
				otp_expires_at: pending.expires_at,
			}))
		}
		Err(AuthError::AccountLocked) => {
			state.audit.log(failure(AuditEventType::AccountLocked, "locked"));
			Err(ServerError::Locked)
		}
		Err(AuthError::AuthenticationFailure) => {
			state.audit.log(failure(AuditEventType::LoginFailed, "invalid_credentials"));
			Err(AuthError::AuthenticationFailure.into())
		}
		Err(e) => Err(e.into()),
	}
}

#[tracing::instrument(skip(state, client, body))]
pub async fn verify_otp(
	State(state): State<AppState>,
	client: ClientInfo,
	Json(body): Json<VerifyOtpRequest>,
) -> Result<Response, ServerError> {
	let email = normalize_email(&body.email);
	let profile = state.users.get_user_by_email(&email).await?;
	let known_id = profile.as_ref().map(|p| p.id);

	let session = match state.auth.verify_otp(&email, body.otp.trim()).await {
		Ok(session) => session,
		Err(e @ (AuthError::InvalidOrExpiredOtp | AuthError::AccountLocked)) => {
			state.audit.log(
				client
					.apply(AuditLogEntry::builder(AuditEventType::OtpFailed))
					.failed()
					.actor_opt(known_id)
					.detail("email", email.as_str())
					.build(),
			);
			return Err(e.into());
		}
		Err(e) => return Err(e.into()),
	};

	let Some(user) = state.users.get_user_by_id(&session.claims.sub).await? else {
		return Err(AuthError::InvalidOrExpiredOtp.into());
	};
	if !user.is_active {
		return Err(AuthError::AuthenticationFailure.into());
	}

	state.audit.log(
		client
			.apply(AuditLogEntry::builder(AuditEventType::OtpVerified))
			.actor(user.id)
			.detail("jti", session.claims.jti.to_string())
			.build(),
	);

	let max_age = state.auth.session_ttl().num_seconds();
	let cookie = session_cookie(&state, &session.token, max_age);
	let body = SessionResponse {
		message: "Login successful".to_string(),
		expires_at: session.claims.expires_at(),
		token: session.token,
		user,
	};
	Ok(([(SET_COOKIE, cookie)], Json(body)).into_response())
}

#[tracing::instrument(skip(state, client, user))]
pub async fn logout(
	State(state): State<AppState>,
	client: ClientInfo,
	OptionalAuth(user): OptionalAuth,
) -> Response {
	if let Some(user) = user {
		state.audit.log(
			client
				.apply(AuditLogEntry::builder(AuditEventType::Logout))
				.actor(user.profile.id)
				.build(),
		);
	}
	let cookie = session_cookie(&state, "", 0);
	([(SET_COOKIE, cookie)], message("Logged out")).into_response()
}

fn session_cookie(state: &AppState, value: &str, max_age: i64) -> String {
	let secure = if state.config.auth.cookie_secure {
		"; Secure"
	} else {
		""
	};
	format!(
		"{}={value}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age}{secure}",
		state.config.auth.cookie_name
	)
}
