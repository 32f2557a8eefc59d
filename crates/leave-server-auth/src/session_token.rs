// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stateless signed session tokens.
//!
//! # Format
//!
//! HS256 JWT carrying [`SessionClaims`]. Expiry is checked against the
//! caller's `now` rather than the system clock, so the pipeline's injected
//! [`Clock`](crate::clock::Clock) governs session lifetime.
//!
//! Tokens are never stored server-side. Validity is the signature plus the
//! `exp` claim; there is no revocation list, so unlocking an account or
//! logging out does not invalidate tokens already handed out.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
	decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use leave_common_secret::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{Role, UserId};

/// Default session lifetime (1 hour).
pub const SESSION_TTL_SECONDS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
	pub sub: UserId,
	pub role: Role,
	/// Issued-at, seconds since the epoch.
	pub iat: i64,
	/// Expiry, seconds since the epoch.
	pub exp: i64,
	pub jti: Uuid,
}

impl SessionClaims {
	pub fn expires_at(&self) -> DateTime<Utc> {
		DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
	#[error("malformed token")]
	Malformed,

	#[error("bad signature")]
	BadSignature,

	#[error("token expired")]
	Expired,

	#[error("failed to sign token")]
	Signing,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
	fn from(err: jsonwebtoken::errors::Error) -> Self {
		match err.kind() {
			ErrorKind::InvalidSignature => TokenError::BadSignature,
			ErrorKind::ExpiredSignature => TokenError::Expired,
			_ => TokenError::Malformed,
		}
	}
}

/// Issues and verifies session tokens with one HMAC key.
#[derive(Clone)]
pub struct SessionTokenIssuer {
	key: SecretString,
	ttl: Duration,
}

impl std::fmt::Debug for SessionTokenIssuer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionTokenIssuer")
			.field("key", &self.key)
			.field("ttl", &self.ttl)
			.finish()
	}
}

impl SessionTokenIssuer {
	pub fn new(key: SecretString, ttl: Duration) -> Self {
		Self { key, ttl }
	}

	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	fn validation() -> Validation {
		let mut validation = Validation::new(Algorithm::HS256);
		// `exp` is compared with the injected clock in `verify`.
		validation.validate_exp = false;
		validation.leeway = 0;
		validation.set_required_spec_claims(&["exp", "sub"]);
		validation
	}

	/// Sign a fresh token for `sub`. Returns the token and its claims.
	pub fn issue(
		&self,
		sub: UserId,
		role: Role,
		now: DateTime<Utc>,
	) -> Result<(String, SessionClaims), TokenError> {
		let claims = SessionClaims {
			sub,
			role,
			iat: now.timestamp(),
			exp: (now + self.ttl).timestamp(),
			jti: Uuid::new_v4(),
		};
		let token = encode(
			&Header::new(Algorithm::HS256),
			&claims,
			&EncodingKey::from_secret(self.key.expose().as_bytes()),
		)
		.map_err(|_| TokenError::Signing)?;

		Ok((token, claims))
	}

	/// Check the signature and expiry of `token` at `now`.
	pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError> {
		let data = decode::<SessionClaims>(
			token,
			&DecodingKey::from_secret(self.key.expose().as_bytes()),
			&Self::validation(),
		)?;

		if now.timestamp() >= data.claims.exp {
			return Err(TokenError::Expired);
		}
		Ok(data.claims)
	}
}
