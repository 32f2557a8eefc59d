// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server error types and HTTP response conversions.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
};
use leave_server_auth::{AccessError, AccessModel, AuthError, StoreError};
use leave_server_db::DbError;
use leave_server_jobs::JobError;

use crate::api_response::{access_denied, error_response, unauthorized};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Invalid request: {0}")]
	BadRequest(String),

	/// Failed login step or missing/invalid session.
	#[error("Unauthorized: {0}")]
	Unauthorized(String),

	#[error("Account locked")]
	Locked,

	/// A chain refused the request.
	#[error("Access denied by {model}")]
	AccessDenied { model: AccessModel, message: String },

	/// Refused by a rule outside the access models.
	#[error("Forbidden: {0}")]
	Forbidden(String),

	/// The database or another dependency is unreachable.
	#[error("Service unavailable: {0}")]
	ServiceUnavailable(String),

	#[error("Internal error: {0}")]
	Internal(String),
}

impl From<DbError> for ServerError {
	fn from(err: DbError) -> Self {
		match err {
			DbError::NotFound(what) => ServerError::NotFound(what),
			DbError::Conflict(what) => ServerError::Conflict(what),
			DbError::Sqlx(e) => ServerError::ServiceUnavailable(e.to_string()),
			e => ServerError::Internal(e.to_string()),
		}
	}
}

impl From<AuthError> for ServerError {
	fn from(err: AuthError) -> Self {
		match err {
			AuthError::AuthenticationFailure => {
				ServerError::Unauthorized("Invalid email or password".to_string())
			}
			AuthError::InvalidOrExpiredOtp => {
				ServerError::Unauthorized("Invalid or expired OTP".to_string())
			}
			AuthError::AccountLocked => ServerError::Locked,
			AuthError::UnknownUser => ServerError::NotFound("user".to_string()),
			AuthError::Conflict(what) => ServerError::Conflict(what),
			AuthError::Store(e) => ServerError::ServiceUnavailable(e.to_string()),
			e @ (AuthError::Hashing(_) | AuthError::Token(_)) => {
				ServerError::Internal(e.to_string())
			}
		}
	}
}

impl From<StoreError> for ServerError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::Duplicate(what) => ServerError::Conflict(what),
			e => ServerError::ServiceUnavailable(e.to_string()),
		}
	}
}

/// Chain misuse is a server bug, never the caller's fault.
impl From<AccessError> for ServerError {
	fn from(err: AccessError) -> Self {
		ServerError::Internal(err.to_string())
	}
}

impl From<JobError> for ServerError {
	fn from(err: JobError) -> Self {
		match err {
			JobError::NotFound(id) => ServerError::NotFound(format!("job {id}")),
			e => ServerError::Internal(e.to_string()),
		}
	}
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		match self {
			ServerError::NotFound(what) => {
				error_response(StatusCode::NOT_FOUND, "not_found", format!("Not found: {what}"))
			}
			ServerError::Conflict(msg) => error_response(StatusCode::CONFLICT, "conflict", msg),
			ServerError::BadRequest(msg) => error_response(StatusCode::BAD_REQUEST, "bad_request", msg),
			ServerError::Unauthorized(msg) => unauthorized(msg),
			ServerError::Locked => error_response(
				StatusCode::LOCKED,
				"account_locked",
				"Account locked. Contact an administrator.",
			),
			ServerError::AccessDenied { model, message } => access_denied(model, message),
			ServerError::Forbidden(msg) => error_response(StatusCode::FORBIDDEN, "forbidden", msg),
			ServerError::ServiceUnavailable(msg) => {
				tracing::warn!(error = %msg, "service unavailable");
				error_response(
					StatusCode::SERVICE_UNAVAILABLE,
					"service_unavailable",
					"A dependency is temporarily unavailable",
				)
			}
			ServerError::Internal(msg) => {
				tracing::error!(error = %msg, "internal error");
				error_response(
					StatusCode::INTERNAL_SERVER_ERROR,
					"internal_error",
					"An internal error occurred",
				)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn status(err: impl Into<ServerError>) -> StatusCode {
		err.into().into_response().status()
	}

	#[test]
	fn auth_errors_map_to_documented_statuses() {
		assert_eq!(status(AuthError::AuthenticationFailure), StatusCode::UNAUTHORIZED);
		assert_eq!(status(AuthError::InvalidOrExpiredOtp), StatusCode::UNAUTHORIZED);
		assert_eq!(status(AuthError::AccountLocked), StatusCode::LOCKED);
		assert_eq!(status(AuthError::UnknownUser), StatusCode::NOT_FOUND);
		assert_eq!(
			status(AuthError::Conflict("email".into())),
			StatusCode::CONFLICT
		);
		assert_eq!(
			status(AuthError::Store(StoreError::Unavailable("down".into()))),
			StatusCode::SERVICE_UNAVAILABLE
		);
	}

	#[test]
	fn db_errors_keep_their_meaning() {
		assert_eq!(status(DbError::NotFound("leave".into())), StatusCode::NOT_FOUND);
		assert_eq!(status(DbError::Conflict("decided".into())), StatusCode::CONFLICT);
		assert_eq!(
			status(DbError::Sqlx(sqlx::Error::PoolTimedOut)),
			StatusCode::SERVICE_UNAVAILABLE
		);
		assert_eq!(
			status(DbError::Internal("bad row".into())),
			StatusCode::INTERNAL_SERVER_ERROR
		);
	}

	#[test]
	fn snapshot_store_failures_are_unavailable() {
		assert_eq!(
			status(StoreError::Unavailable("pool closed".into())),
			StatusCode::SERVICE_UNAVAILABLE
		);
		assert_eq!(status(StoreError::Duplicate("x".into())), StatusCode::CONFLICT);
	}

	#[test]
	fn denial_is_forbidden() {
		let err = ServerError::AccessDenied {
			model: AccessModel::Dac,
			message: "Access denied".into(),
		};
		assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
	}

	#[test]
	fn chain_misuse_is_internal() {
		assert_eq!(
			status(AccessError::UnknownAttributePolicy("nope".into())),
			StatusCode::INTERNAL_SERVER_ERROR
		);
	}
}
