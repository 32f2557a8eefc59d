// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The login lifecycle: password, lockout, one-time code, session token.
//!
//! # State machine
//!
//! Each credential is either active or locked. The configured number of
//! consecutive password failures (5 by default) locks it, and only
//! [`AuthPipeline::unlock`] reverses that. While active, a correct password
//! stores a pending code and [`AuthPipeline::verify_otp`] exchanges a correct,
//! unexpired code for a session token exactly once.
//!
//! Wrong codes are not counted towards lockout.
//!
//! # Persistence
//!
//! Every credential mutation is saved before the call returns. Saves are
//! versioned; on a lost race the record is reloaded and the change re-applied
//! a bounded number of times.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::instrument;

use crate::clock::Clock;
use crate::credential::{CredentialRecord, CredentialStore, NewCredential, StoreError};
use crate::email::EmailTemplate;
use crate::error::AuthError;
use crate::notifier::Notifier;
use crate::otp::{issue_otp, OTP_TTL_SECONDS};
use crate::password::{dummy_verify, hash_password, verify_password};
use crate::session_token::{SessionClaims, SessionTokenIssuer};
use crate::types::{Role, UserId};

/// Versioned saves retried this many times after the first conflict.
pub const MAX_SAVE_RETRIES: u32 = 3;

pub const DEFAULT_LOCKOUT_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSettings {
	pub lockout_threshold: u32,
	pub otp_ttl: Duration,
}

impl Default for AuthSettings {
	fn default() -> Self {
		Self {
			lockout_threshold: DEFAULT_LOCKOUT_THRESHOLD,
			otp_ttl: Duration::seconds(OTP_TTL_SECONDS),
		}
	}
}

/// Where a login attempt came from. Used only for the lockout notice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginOrigin {
	pub ip: Option<String>,
	pub user_agent: Option<String>,
}

/// Returned by a successful password check. Carries no credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingVerification {
	pub user_id: UserId,
	pub identifier: String,
	pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
	pub token: String,
	pub claims: SessionClaims,
}

/// Input to [`AuthPipeline::register`].
#[derive(Debug, Clone)]
pub struct Registration {
	pub name: String,
	pub identifier: String,
	pub password: String,
	pub role: Role,
	pub department: Option<String>,
	pub location: Option<String>,
}

enum FailureOutcome {
	Counted,
	JustLocked,
}

pub struct AuthPipeline {
	store: Arc<dyn CredentialStore>,
	notifier: Arc<dyn Notifier>,
	tokens: SessionTokenIssuer,
	clock: Arc<dyn Clock>,
	settings: AuthSettings,
}

impl AuthPipeline {
	pub fn new(
		store: Arc<dyn CredentialStore>,
		notifier: Arc<dyn Notifier>,
		tokens: SessionTokenIssuer,
		clock: Arc<dyn Clock>,
		settings: AuthSettings,
	) -> Self {
		Self {
			store,
			notifier,
			tokens,
			clock,
			settings,
		}
	}

	pub fn settings(&self) -> &AuthSettings {
		&self.settings
	}

	pub fn session_ttl(&self) -> Duration {
		self.tokens.ttl()
	}

	/// Check a password and, if it matches, send a one-time code.
	pub async fn authenticate(
		&self,
		identifier: &str,
		password: &str,
	) -> Result<PendingVerification, AuthError> {
		self.authenticate_from(identifier, password, &LoginOrigin::default())
			.await
	}

	/// [`authenticate`](Self::authenticate) with request origin, which is
	/// included in the lockout notice sent to the account owner.
	#[instrument(skip(self, password, origin), fields(identifier = %identifier))]
	pub async fn authenticate_from(
		&self,
		identifier: &str,
		password: &str,
		origin: &LoginOrigin,
	) -> Result<PendingVerification, AuthError> {
		let Some(record) = self.store.get_credential_by_identifier(identifier).await? else {
			dummy_verify(password);
			tracing::debug!("login for unknown identifier");
			return Err(AuthError::AuthenticationFailure);
		};

		if record.locked {
			tracing::warn!(user_id = %record.user_id, "login attempt on locked account");
			return Err(AuthError::AccountLocked);
		}

		if !verify_password(password, &record.password_hash) {
			let threshold = self.settings.lockout_threshold;
			let outcome = self
				.update_record(record, missing_is_failure, |r| {
					if r.locked {
						return Err(AuthError::AccountLocked);
					}
					Ok(if r.register_failure(threshold) {
						FailureOutcome::JustLocked
					} else {
						FailureOutcome::Counted
					})
				})
				.await?;

			return match outcome {
				FailureOutcome::Counted => {
					tracing::debug!("password mismatch");
					Err(AuthError::AuthenticationFailure)
				}
				FailureOutcome::JustLocked => {
					tracing::warn!(threshold, "account locked after repeated failures");
					self.spawn_delivery(
						identifier.to_string(),
						EmailTemplate::SuspiciousLogin {
							ip: origin.ip.clone().unwrap_or_else(|| "unknown".into()),
							device: origin.user_agent.clone().unwrap_or_else(|| "unknown".into()),
						},
					);
					Err(AuthError::AccountLocked)
				}
			};
		}

		let now = self.clock.now();
		let (code, pending) = issue_otp(now, self.settings.otp_ttl);
		let expires_at = pending.expires_at;
		let user_id = record.user_id;

		self.update_record(record, missing_is_failure, |r| {
			if r.locked {
				return Err(AuthError::AccountLocked);
			}
			r.failed_attempts = 0;
			r.otp = Some(pending.clone());
			Ok(())
		})
		.await?;

		self.spawn_delivery(
			identifier.to_string(),
			EmailTemplate::Otp {
				code,
				expires_minutes: self.settings.otp_ttl.num_minutes(),
			},
		);
		tracing::info!(user_id = %user_id, "password accepted, one-time code issued");

		Ok(PendingVerification {
			user_id,
			identifier: identifier.to_string(),
			expires_at,
		})
	}

	/// Exchange a pending one-time code for a session token.
	#[instrument(skip(self, code), fields(identifier = %identifier))]
	pub async fn verify_otp(
		&self,
		identifier: &str,
		code: &str,
	) -> Result<IssuedSession, AuthError> {
		let record = self
			.store
			.get_credential_by_identifier(identifier)
			.await?
			.ok_or(AuthError::InvalidOrExpiredOtp)?;

		let now = self.clock.now();
		let (user_id, role) = self
			.update_record(record, missing_is_bad_otp, |r| {
				let accepted = r.otp.as_ref().is_some_and(|p| p.accepts(code, now));
				if !accepted {
					return Err(AuthError::InvalidOrExpiredOtp);
				}
				if r.locked {
					return Err(AuthError::AccountLocked);
				}
				r.otp = None;
				Ok((r.user_id, r.role))
			})
			.await?;

		let (token, claims) = self.tokens.issue(user_id, role, now)?;
		tracing::info!(user_id = %user_id, jti = %claims.jti, "session issued");
		Ok(IssuedSession { token, claims })
	}

	/// Clear the lock and failure counter. Idempotent.
	#[instrument(skip(self), fields(user_id = %user_id))]
	pub async fn unlock(&self, user_id: &UserId) -> Result<(), AuthError> {
		let record = self
			.store
			.get_credential_by_id(user_id)
			.await?
			.ok_or(AuthError::UnknownUser)?;

		self.update_record(record, missing_is_unknown_user, |r| {
			r.unlock();
			Ok(())
		})
		.await?;

		tracing::info!("account unlocked");
		Ok(())
	}

	/// Create an account with a freshly hashed password.
	#[instrument(skip(self, registration), fields(identifier = %registration.identifier))]
	pub async fn register(&self, registration: Registration) -> Result<UserId, AuthError> {
		let password_hash = hash_password(&registration.password)?;
		let new = NewCredential {
			user_id: UserId::generate(),
			name: registration.name,
			identifier: registration.identifier,
			password_hash,
			role: registration.role,
			department: registration.department,
			location: registration.location,
		};

		match self.store.create_credential(&new).await {
			Ok(()) => {
				tracing::info!(user_id = %new.user_id, "account registered");
				Ok(new.user_id)
			}
			Err(StoreError::Duplicate(what)) => Err(AuthError::Conflict(what)),
			Err(e) => Err(e.into()),
		}
	}

	/// Verify a session token against the pipeline's clock.
	pub fn verify_session(&self, token: &str) -> Result<SessionClaims, AuthError> {
		Ok(self.tokens.verify(token, self.clock.now())?)
	}

	fn spawn_delivery(&self, contact: String, message: EmailTemplate) {
		let notifier = Arc::clone(&self.notifier);
		tokio::spawn(async move {
			if let Err(e) = notifier.deliver(&contact, &message).await {
				tracing::warn!(error = %e, template = message.name(), "notification delivery failed");
			}
		});
	}

	/// Apply `mutate` and save, reloading and re-applying on version conflict.
	async fn update_record<T, F>(
		&self,
		mut record: CredentialRecord,
		missing: fn() -> AuthError,
		mut mutate: F,
	) -> Result<T, AuthError>
	where
		F: FnMut(&mut CredentialRecord) -> Result<T, AuthError> + Send,
		T: Send,
	{
		let mut retries = 0;
		loop {
			let outcome = mutate(&mut record)?;
			match self.store.save_credential(&record).await {
				Ok(version) => {
					tracing::debug!(user_id = %record.user_id, version, "credential saved");
					return Ok(outcome);
				}
				Err(StoreError::Conflict) if retries < MAX_SAVE_RETRIES => {
					retries += 1;
					tracing::debug!(user_id = %record.user_id, retries, "credential save conflicted, reloading");
					record = self
						.store
						.get_credential_by_id(&record.user_id)
						.await?
						.ok_or_else(missing)?;
				}
				Err(e) => return Err(e.into()),
			}
		}
	}
}

fn missing_is_failure() -> AuthError {
	AuthError::AuthenticationFailure
}

fn missing_is_bad_otp() -> AuthError {
	AuthError::InvalidOrExpiredOtp
}

fn missing_is_unknown_user() -> AuthError {
	AuthError::UnknownUser
}
