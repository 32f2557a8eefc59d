// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication error types.
//!
//! Policy denials are not errors: they are [`Decision`](crate::access::Decision)
//! values. Everything here is either a failed authentication step the caller
//! reports to the user, or an infrastructure failure the caller may retry.

use thiserror::Error;

use crate::credential::StoreError;
use crate::session_token::TokenError;

/// Errors returned by the authentication pipeline.
#[derive(Debug, Error)]
pub enum AuthError {
	// =========================================================================
	// Authentication Errors
	// =========================================================================
	/// Unknown identifier or wrong password. The two are never distinguished.
	#[error("invalid credentials")]
	AuthenticationFailure,

	/// The account is locked until an administrator unlocks it.
	#[error("account locked")]
	AccountLocked,

	/// No pending code, wrong code, or the code has expired.
	#[error("invalid or expired one-time code")]
	InvalidOrExpiredOtp,

	// =========================================================================
	// Administrative Errors
	// =========================================================================
	/// An administrative operation named a user that does not exist.
	#[error("unknown user")]
	UnknownUser,

	/// A registration collided with an existing identifier.
	#[error("conflict: {0}")]
	Conflict(String),

	// =========================================================================
	// Infrastructure Errors
	// =========================================================================
	#[error("credential store error: {0}")]
	Store(#[from] StoreError),

	#[error("password hashing failed: {0}")]
	Hashing(String),

	#[error("session token error: {0}")]
	Token(#[from] TokenError),
}

impl AuthError {
	/// True for infrastructure failures where repeating the request may
	/// succeed. Credential failures are never retryable.
	pub fn is_retryable(&self) -> bool {
		matches!(self, AuthError::Store(e) if e.is_retryable())
	}
}
