// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Response bodies shared by every handler.
//!
//! Errors are `{error, message}`. Access denials add the model that refused
//! the request so clients can tell a classification refusal from an
//! office-hours one.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use leave_server_auth::AccessModel;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

impl ErrorResponse {
	pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			error: error.into(),
			message: message.into(),
		}
	}
}

#[derive(Debug, Serialize)]
pub struct AccessDeniedResponse {
	pub error: &'static str,
	pub model: AccessModel,
	pub message: String,
}

/// A bare acknowledgement, e.g. `{"message": "Logged out"}`.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
	pub message: String,
}

pub fn message(text: impl Into<String>) -> Json<MessageResponse> {
	Json(MessageResponse {
		message: text.into(),
	})
}

pub fn error_response(
	status: StatusCode,
	error: impl Into<String>,
	message: impl Into<String>,
) -> Response {
	(status, Json(ErrorResponse::new(error, message))).into_response()
}

pub fn unauthorized(message: impl Into<String>) -> Response {
	error_response(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

pub fn access_denied(model: AccessModel, message: impl Into<String>) -> Response {
	(
		StatusCode::FORBIDDEN,
		Json(AccessDeniedResponse {
			error: "access_denied",
			model,
			message: message.into(),
		}),
	)
		.into_response()
}
