// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User repository for database operations.
//!
//! One `users` row carries both the profile the HTTP layer shows and the
//! authentication state the login pipeline mutates. This module provides:
//! - Profile reads and administrative updates ([`UserStore`])
//! - The [`CredentialStore`] implementation used by the auth pipeline
//!
//! Every write bumps `version`, so an administrative change racing a login
//! attempt surfaces as a [`StoreError::Conflict`] to the pipeline, which
//! reloads and retries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leave_server_auth::{
	Actor, CredentialRecord, CredentialStore, EmploymentStatus, NewCredential, PendingOtp, Role,
	StoreError, UserId,
};
use serde::Serialize;
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{parse_column, parse_timestamp, DbError};

const PROFILE_COLUMNS: &str = "id, name, email, role, department, location, employment_status, \
	is_active, is_locked, failed_attempts, created_at, updated_at";

const CREDENTIAL_COLUMNS: &str =
	"id, email, role, password_hash, failed_attempts, is_locked, otp_hash, otp_expires_at, version";

/// A user as shown to administrators and used to build request actors.
/// Never carries the password hash or a pending code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
	pub id: UserId,
	pub name: String,
	pub email: String,
	pub role: Role,
	pub department: Option<String>,
	pub location: Option<String>,
	pub employment_status: EmploymentStatus,
	pub is_active: bool,
	pub is_locked: bool,
	pub failed_attempts: u32,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl UserProfile {
	/// The access-control view of this user.
	pub fn to_actor(&self) -> Actor {
		Actor {
			id: self.id,
			role: self.role,
			department: self.department.clone(),
			location: self.location.clone(),
			employment_status: self.employment_status,
		}
	}
}

#[async_trait]
pub trait UserStore: Send + Sync {
	async fn get_user_by_id(&self, id: &UserId) -> Result<Option<UserProfile>, DbError>;
	async fn get_user_by_email(&self, email: &str) -> Result<Option<UserProfile>, DbError>;
	async fn list_users(&self) -> Result<Vec<UserProfile>, DbError>;
	async fn update_role(&self, id: &UserId, role: Role) -> Result<(), DbError>;
	async fn update_department(&self, id: &UserId, department: &str) -> Result<(), DbError>;
	async fn toggle_active(&self, id: &UserId) -> Result<bool, DbError>;
	async fn delete_user(&self, id: &UserId) -> Result<bool, DbError>;
}

/// Repository for user and credential rows.
#[derive(Clone)]
pub struct UserRepository {
	pool: SqlitePool,
}

impl UserRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	// =========================================================================
	// Profiles
	// =========================================================================

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn get_user_by_id(&self, id: &UserId) -> Result<Option<UserProfile>, DbError> {
		let row = sqlx::query(&format!("SELECT {PROFILE_COLUMNS} FROM users WHERE id = ?"))
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row.map(|r| row_to_profile(&r)).transpose()
	}

	#[tracing::instrument(skip(self, email))]
	pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserProfile>, DbError> {
		let row = sqlx::query(&format!("SELECT {PROFILE_COLUMNS} FROM users WHERE email = ?"))
			.bind(email)
			.fetch_optional(&self.pool)
			.await?;

		row.map(|r| row_to_profile(&r)).transpose()
	}

	/// All users, oldest first.
	#[tracing::instrument(skip(self))]
	pub async fn list_users(&self) -> Result<Vec<UserProfile>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {PROFILE_COLUMNS} FROM users ORDER BY created_at ASC"
		))
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_profile).collect()
	}

	/// # Errors
	/// Returns `DbError::NotFound` if no user has this id.
	#[tracing::instrument(skip(self), fields(user_id = %id, role = %role))]
	pub async fn update_role(&self, id: &UserId, role: Role) -> Result<(), DbError> {
		let result = sqlx::query(
			"UPDATE users SET role = ?, version = version + 1, updated_at = ? WHERE id = ?",
		)
		.bind(role.as_str())
		.bind(Utc::now().to_rfc3339())
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("user {id}")));
		}
		tracing::info!(user_id = %id, role = %role, "user role updated");
		Ok(())
	}

	/// # Errors
	/// Returns `DbError::NotFound` if no user has this id.
	#[tracing::instrument(skip(self, department), fields(user_id = %id))]
	pub async fn update_department(&self, id: &UserId, department: &str) -> Result<(), DbError> {
		let result = sqlx::query(
			"UPDATE users SET department = ?, version = version + 1, updated_at = ? WHERE id = ?",
		)
		.bind(department)
		.bind(Utc::now().to_rfc3339())
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("user {id}")));
		}
		Ok(())
	}

	/// Flip `is_active` and return the new value.
	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn toggle_active(&self, id: &UserId) -> Result<bool, DbError> {
		let row = sqlx::query(
			r#"
			UPDATE users
			SET is_active = 1 - is_active, version = version + 1, updated_at = ?
			WHERE id = ?
			RETURNING is_active
			"#,
		)
		.bind(Utc::now().to_rfc3339())
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(r) => {
				let active: i64 = r.get("is_active");
				Ok(active != 0)
			}
			None => Err(DbError::NotFound(format!("user {id}"))),
		}
	}

	/// Delete a user and, by cascade, their leave requests and delegations.
	/// Returns false if the user did not exist.
	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn delete_user(&self, id: &UserId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM users WHERE id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	// =========================================================================
	// Credentials
	// =========================================================================

	#[tracing::instrument(skip(self, identifier))]
	pub async fn get_credential_by_identifier(
		&self,
		identifier: &str,
	) -> Result<Option<CredentialRecord>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {CREDENTIAL_COLUMNS} FROM users WHERE email = ?"
		))
		.bind(identifier)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_credential(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn get_credential_by_id(
		&self,
		id: &UserId,
	) -> Result<Option<CredentialRecord>, DbError> {
		let row = sqlx::query(&format!("SELECT {CREDENTIAL_COLUMNS} FROM users WHERE id = ?"))
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row.map(|r| row_to_credential(&r)).transpose()
	}

	/// Versioned write of the authentication columns.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if the stored version no longer matches.
	#[tracing::instrument(skip(self, record), fields(user_id = %record.user_id, version = record.version))]
	pub async fn save_credential(&self, record: &CredentialRecord) -> Result<i64, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE users
			SET password_hash = ?, failed_attempts = ?, is_locked = ?, otp_hash = ?,
				otp_expires_at = ?, version = version + 1, updated_at = ?
			WHERE id = ? AND version = ?
			"#,
		)
		.bind(&record.password_hash)
		.bind(i64::from(record.failed_attempts))
		.bind(record.locked as i32)
		.bind(record.otp.as_ref().map(|o| o.code_hash.clone()))
		.bind(record.otp.as_ref().map(|o| o.expires_at.to_rfc3339()))
		.bind(Utc::now().to_rfc3339())
		.bind(record.user_id.to_string())
		.bind(record.version)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::Conflict(format!(
				"credential {} changed since version {}",
				record.user_id, record.version
			)));
		}
		Ok(record.version + 1)
	}

	/// # Errors
	/// Returns `DbError::Sqlx` with a unique violation if the email is taken.
	#[tracing::instrument(skip(self, new), fields(user_id = %new.user_id))]
	pub async fn create_credential(&self, new: &NewCredential) -> Result<(), DbError> {
		let now = Utc::now().to_rfc3339();
		sqlx::query(
			r#"
			INSERT INTO users (id, name, email, password_hash, role, department, location, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(new.user_id.to_string())
		.bind(&new.name)
		.bind(&new.identifier)
		.bind(&new.password_hash)
		.bind(new.role.as_str())
		.bind(&new.department)
		.bind(&new.location)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await?;

		tracing::debug!(user_id = %new.user_id, "user created");
		Ok(())
	}
}

fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<UserProfile, DbError> {
	let id: String = row.get("id");
	let role: String = row.get("role");
	let employment_status: String = row.get("employment_status");
	let is_active: i64 = row.get("is_active");
	let is_locked: i64 = row.get("is_locked");
	let failed_attempts: i64 = row.get("failed_attempts");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(UserProfile {
		id: parse_column("user id", &id)?,
		name: row.get("name"),
		email: row.get("email"),
		role: parse_column("role", &role)?,
		department: row.get("department"),
		location: row.get("location"),
		employment_status: parse_column("employment_status", &employment_status)?,
		is_active: is_active != 0,
		is_locked: is_locked != 0,
		failed_attempts: u32::try_from(failed_attempts).unwrap_or(u32::MAX),
		created_at: parse_timestamp("created_at", &created_at)?,
		updated_at: parse_timestamp("updated_at", &updated_at)?,
	})
}

fn row_to_credential(row: &sqlx::sqlite::SqliteRow) -> Result<CredentialRecord, DbError> {
	let id: String = row.get("id");
	let role: String = row.get("role");
	let failed_attempts: i64 = row.get("failed_attempts");
	let is_locked: i64 = row.get("is_locked");
	let otp_hash: Option<String> = row.get("otp_hash");
	let otp_expires_at: Option<String> = row.get("otp_expires_at");

	let otp = match (otp_hash, otp_expires_at) {
		(Some(code_hash), Some(expires_at)) => Some(PendingOtp {
			code_hash,
			expires_at: parse_timestamp("otp_expires_at", &expires_at)?,
		}),
		_ => None,
	};

	Ok(CredentialRecord {
		user_id: parse_column("user id", &id)?,
		identifier: row.get("email"),
		role: parse_column("role", &role)?,
		password_hash: row.get("password_hash"),
		failed_attempts: u32::try_from(failed_attempts).unwrap_or(u32::MAX),
		locked: is_locked != 0,
		otp,
		version: row.get("version"),
	})
}

#[async_trait]
impl UserStore for UserRepository {
	async fn get_user_by_id(&self, id: &UserId) -> Result<Option<UserProfile>, DbError> {
		self.get_user_by_id(id).await
	}

	async fn get_user_by_email(&self, email: &str) -> Result<Option<UserProfile>, DbError> {
		self.get_user_by_email(email).await
	}

	async fn list_users(&self) -> Result<Vec<UserProfile>, DbError> {
		self.list_users().await
	}

	async fn update_role(&self, id: &UserId, role: Role) -> Result<(), DbError> {
		self.update_role(id, role).await
	}

	async fn update_department(&self, id: &UserId, department: &str) -> Result<(), DbError> {
		self.update_department(id, department).await
	}

	async fn toggle_active(&self, id: &UserId) -> Result<bool, DbError> {
		self.toggle_active(id).await
	}

	async fn delete_user(&self, id: &UserId) -> Result<bool, DbError> {
		self.delete_user(id).await
	}
}

#[async_trait]
impl CredentialStore for UserRepository {
	async fn get_credential_by_identifier(
		&self,
		identifier: &str,
	) -> Result<Option<CredentialRecord>, StoreError> {
		Ok(self.get_credential_by_identifier(identifier).await?)
	}

	async fn get_credential_by_id(
		&self,
		id: &UserId,
	) -> Result<Option<CredentialRecord>, StoreError> {
		Ok(self.get_credential_by_id(id).await?)
	}

	async fn save_credential(&self, record: &CredentialRecord) -> Result<i64, StoreError> {
		Ok(self.save_credential(record).await?)
	}

	async fn create_credential(&self, new: &NewCredential) -> Result<(), StoreError> {
		self.create_credential(new).await.map_err(|e| {
			if e.is_unique_violation() {
				StoreError::Duplicate(new.identifier.clone())
			} else {
				e.into()
			}
		})
	}
}
