// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential records and the store boundary the pipeline writes through.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Role, UserId};

/// A one-time code awaiting verification. Only the hash is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOtp {
	pub code_hash: String,
	pub expires_at: DateTime<Utc>,
}

/// Per-user authentication state.
///
/// Mutated only by [`AuthPipeline`](crate::pipeline::AuthPipeline).
/// `version` is an optimistic concurrency counter owned by the store: a save
/// succeeds only if the stored version still equals the one that was loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
	pub user_id: UserId,
	pub identifier: String,
	pub role: Role,
	pub password_hash: String,
	pub failed_attempts: u32,
	pub locked: bool,
	pub otp: Option<PendingOtp>,
	pub version: i64,
}

impl CredentialRecord {
	/// Record one failed password attempt, locking at `threshold`.
	/// Returns true if this attempt caused the lock.
	pub fn register_failure(&mut self, threshold: u32) -> bool {
		self.failed_attempts = self.failed_attempts.saturating_add(1);
		if !self.locked && self.failed_attempts >= threshold {
			self.locked = true;
			return true;
		}
		false
	}

	pub fn unlock(&mut self) {
		self.locked = false;
		self.failed_attempts = 0;
	}
}

/// A new account for [`CredentialStore::create_credential`].
#[derive(Debug, Clone)]
pub struct NewCredential {
	pub user_id: UserId,
	pub name: String,
	pub identifier: String,
	pub password_hash: String,
	pub role: Role,
	pub department: Option<String>,
	pub location: Option<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
	/// The backing store could not be reached or failed mid-operation.
	#[error("store unavailable: {0}")]
	Unavailable(String),

	/// A versioned save lost a race with a concurrent writer.
	#[error("concurrent modification")]
	Conflict,

	/// A create collided with an existing identifier.
	#[error("duplicate: {0}")]
	Duplicate(String),
}

impl StoreError {
	pub fn is_retryable(&self) -> bool {
		matches!(self, StoreError::Unavailable(_))
	}
}

/// Load and persist credential records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
	async fn get_credential_by_identifier(
		&self,
		identifier: &str,
	) -> Result<Option<CredentialRecord>, StoreError>;

	async fn get_credential_by_id(
		&self,
		id: &UserId,
	) -> Result<Option<CredentialRecord>, StoreError>;

	/// Persist `record` if its `version` still matches storage, returning the
	/// new version. A mismatch is [`StoreError::Conflict`].
	async fn save_credential(&self, record: &CredentialRecord) -> Result<i64, StoreError>;

	async fn create_credential(&self, new: &NewCredential) -> Result<(), StoreError>;
}
