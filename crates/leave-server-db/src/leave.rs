// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Leave request repository.
//!
//! Leave requests are the protected resource of the access engine. Besides
//! CRUD, this module implements [`ResourceSnapshotStore`] so the engine can
//! read a request's owner, classification and delegation list without
//! depending on SQL.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use leave_server_auth::{
	Classification, LeaveRequestId, ParseEnumError, ResourceSnapshot, ResourceSnapshotStore,
	StoreError, UserId,
};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePool, Row};
use std::fmt;
use std::str::FromStr;

use crate::error::{parse_column, parse_timestamp, DbError};

const LEAVE_COLUMNS: &str = "id, employee_id, start_date, end_date, leave_type, reason, status, \
	classification, approved_by, approved_at, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveType {
	Annual,
	Sick,
	Emergency,
	Maternity,
	Unpaid,
}

impl LeaveType {
	pub fn as_str(&self) -> &'static str {
		match self {
			LeaveType::Annual => "annual",
			LeaveType::Sick => "sick",
			LeaveType::Emergency => "emergency",
			LeaveType::Maternity => "maternity",
			LeaveType::Unpaid => "unpaid",
		}
	}
}

impl fmt::Display for LeaveType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for LeaveType {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"annual" => Ok(LeaveType::Annual),
			"sick" => Ok(LeaveType::Sick),
			"emergency" => Ok(LeaveType::Emergency),
			"maternity" => Ok(LeaveType::Maternity),
			"unpaid" => Ok(LeaveType::Unpaid),
			_ => Err(ParseEnumError {
				kind: "leave type",
				value: s.to_string(),
			}),
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
	#[default]
	Pending,
	Approved,
	Rejected,
}

impl LeaveStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			LeaveStatus::Pending => "pending",
			LeaveStatus::Approved => "approved",
			LeaveStatus::Rejected => "rejected",
		}
	}
}

impl fmt::Display for LeaveStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for LeaveStatus {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"pending" => Ok(LeaveStatus::Pending),
			"approved" => Ok(LeaveStatus::Approved),
			"rejected" => Ok(LeaveStatus::Rejected),
			_ => Err(ParseEnumError {
				kind: "leave status",
				value: s.to_string(),
			}),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaveRequest {
	pub id: LeaveRequestId,
	pub employee_id: UserId,
	pub start_date: NaiveDate,
	pub end_date: NaiveDate,
	pub leave_type: LeaveType,
	pub reason: String,
	pub status: LeaveStatus,
	pub classification: Classification,
	pub approved_by: Option<UserId>,
	pub approved_at: Option<DateTime<Utc>>,
	pub delegated_access: Vec<UserId>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl LeaveRequest {
	/// Whole days between start and end, as the manager approval limit counts
	/// them. A same-day request is zero days.
	pub fn duration_days(&self) -> i64 {
		(self.end_date - self.start_date).num_days()
	}

	pub fn snapshot(&self) -> ResourceSnapshot {
		ResourceSnapshot::new(self.id, self.classification, self.employee_id)
			.with_delegates(self.delegated_access.iter().copied())
	}
}

#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
	pub employee_id: UserId,
	pub start_date: NaiveDate,
	pub end_date: NaiveDate,
	pub leave_type: LeaveType,
	pub reason: String,
}

/// A partial edit to a pending request. `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaveUpdate {
	pub start_date: Option<NaiveDate>,
	pub end_date: Option<NaiveDate>,
	pub leave_type: Option<LeaveType>,
	pub reason: Option<String>,
}

#[async_trait]
pub trait LeaveStore: Send + Sync {
	async fn create_leave(&self, new: &NewLeaveRequest) -> Result<LeaveRequest, DbError>;
	async fn get_leave(&self, id: &LeaveRequestId) -> Result<Option<LeaveRequest>, DbError>;
	async fn list_leaves_for_employee(&self, employee: &UserId)
		-> Result<Vec<LeaveRequest>, DbError>;
	async fn update_pending(
		&self,
		id: &LeaveRequestId,
		update: &LeaveUpdate,
	) -> Result<LeaveRequest, DbError>;
	async fn decide(
		&self,
		id: &LeaveRequestId,
		status: LeaveStatus,
		approver: &UserId,
	) -> Result<LeaveRequest, DbError>;
	async fn set_classification(
		&self,
		id: &LeaveRequestId,
		classification: Classification,
	) -> Result<(), DbError>;
	async fn grant_access(&self, id: &LeaveRequestId, users: &[UserId]) -> Result<(), DbError>;
	async fn revoke_access(&self, id: &LeaveRequestId, users: &[UserId]) -> Result<(), DbError>;
}

/// Repository for leave requests and their delegation lists.
#[derive(Clone)]
pub struct LeaveRepository {
	pool: SqlitePool,
}

impl LeaveRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create a pending request classified as internal.
	#[tracing::instrument(skip(self, new), fields(employee_id = %new.employee_id))]
	pub async fn create_leave(&self, new: &NewLeaveRequest) -> Result<LeaveRequest, DbError> {
		let id = LeaveRequestId::generate();
		let now = Utc::now().to_rfc3339();
		sqlx::query(
			r#"
			INSERT INTO leave_requests (id, employee_id, start_date, end_date, leave_type, reason, status, classification, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(id.to_string())
		.bind(new.employee_id.to_string())
		.bind(new.start_date.to_string())
		.bind(new.end_date.to_string())
		.bind(new.leave_type.as_str())
		.bind(&new.reason)
		.bind(LeaveStatus::Pending.as_str())
		.bind(Classification::default().as_str())
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await?;

		tracing::debug!(leave_id = %id, "leave request created");
		self.require(&id).await
	}

	#[tracing::instrument(skip(self), fields(leave_id = %id))]
	pub async fn get_leave(&self, id: &LeaveRequestId) -> Result<Option<LeaveRequest>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?"
		))
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(r) => {
				let delegates = self.delegates(id).await?;
				Ok(Some(row_to_leave(&r, delegates)?))
			}
			None => Ok(None),
		}
	}

	/// Requests filed by `employee`, newest first.
	#[tracing::instrument(skip(self), fields(employee_id = %employee))]
	pub async fn list_leaves_for_employee(
		&self,
		employee: &UserId,
	) -> Result<Vec<LeaveRequest>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE employee_id = ? ORDER BY created_at DESC, rowid DESC"
		))
		.bind(employee.to_string())
		.fetch_all(&self.pool)
		.await?;

		let mut leaves = Vec::with_capacity(rows.len());
		for row in &rows {
			let id: String = row.get("id");
			let delegates = self.delegates(&parse_column("leave id", &id)?).await?;
			leaves.push(row_to_leave(row, delegates)?);
		}
		Ok(leaves)
	}

	/// Apply `update` if the request is still pending.
	///
	/// # Errors
	/// - `DbError::NotFound` if the request does not exist
	/// - `DbError::Conflict` if it has already been decided
	#[tracing::instrument(skip(self, update), fields(leave_id = %id))]
	pub async fn update_pending(
		&self,
		id: &LeaveRequestId,
		update: &LeaveUpdate,
	) -> Result<LeaveRequest, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE leave_requests
			SET start_date = COALESCE(?, start_date),
				end_date = COALESCE(?, end_date),
				leave_type = COALESCE(?, leave_type),
				reason = COALESCE(?, reason),
				updated_at = ?
			WHERE id = ? AND status = 'pending'
			"#,
		)
		.bind(update.start_date.map(|d| d.to_string()))
		.bind(update.end_date.map(|d| d.to_string()))
		.bind(update.leave_type.map(|t| t.as_str()))
		.bind(&update.reason)
		.bind(Utc::now().to_rfc3339())
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(self.not_pending(id).await);
		}
		self.require(id).await
	}

	/// Move a pending request to `status`, recording who decided it.
	///
	/// # Errors
	/// - `DbError::NotFound` if the request does not exist
	/// - `DbError::Conflict` if it has already been decided
	/// - `DbError::Internal` if `status` is `Pending`
	#[tracing::instrument(skip(self), fields(leave_id = %id, status = %status, approver = %approver))]
	pub async fn decide(
		&self,
		id: &LeaveRequestId,
		status: LeaveStatus,
		approver: &UserId,
	) -> Result<LeaveRequest, DbError> {
		if status == LeaveStatus::Pending {
			return Err(DbError::Internal("a decision cannot be pending".into()));
		}
		let now = Utc::now().to_rfc3339();
		let result = sqlx::query(
			r#"
			UPDATE leave_requests
			SET status = ?, approved_by = ?, approved_at = ?, updated_at = ?
			WHERE id = ? AND status = 'pending'
			"#,
		)
		.bind(status.as_str())
		.bind(approver.to_string())
		.bind(&now)
		.bind(&now)
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(self.not_pending(id).await);
		}
		tracing::info!(leave_id = %id, status = %status, "leave request decided");
		self.require(id).await
	}

	#[tracing::instrument(skip(self), fields(leave_id = %id, classification = %classification))]
	pub async fn set_classification(
		&self,
		id: &LeaveRequestId,
		classification: Classification,
	) -> Result<(), DbError> {
		let result =
			sqlx::query("UPDATE leave_requests SET classification = ?, updated_at = ? WHERE id = ?")
				.bind(classification.as_str())
				.bind(Utc::now().to_rfc3339())
				.bind(id.to_string())
				.execute(&self.pool)
				.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("leave request {id}")));
		}
		Ok(())
	}

	/// Append users to the delegation list. Users already present keep their
	/// position.
	#[tracing::instrument(skip(self, users), fields(leave_id = %id, count = users.len()))]
	pub async fn grant_access(&self, id: &LeaveRequestId, users: &[UserId]) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;

		let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM leave_requests WHERE id = ?")
			.bind(id.to_string())
			.fetch_optional(&mut *tx)
			.await?;
		if exists.is_none() {
			return Err(DbError::NotFound(format!("leave request {id}")));
		}

		for user in users {
			sqlx::query(
				r#"
				INSERT OR IGNORE INTO leave_request_access (leave_request_id, user_id, position)
				VALUES (?, ?, (SELECT COALESCE(MAX(position), -1) + 1 FROM leave_request_access WHERE leave_request_id = ?))
				"#,
			)
			.bind(id.to_string())
			.bind(user.to_string())
			.bind(id.to_string())
			.execute(&mut *tx)
			.await?;
		}

		sqlx::query("UPDATE leave_requests SET updated_at = ? WHERE id = ?")
			.bind(Utc::now().to_rfc3339())
			.bind(id.to_string())
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;
		Ok(())
	}

	#[tracing::instrument(skip(self, users), fields(leave_id = %id, count = users.len()))]
	pub async fn revoke_access(
		&self,
		id: &LeaveRequestId,
		users: &[UserId],
	) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;
		for user in users {
			sqlx::query(
				"DELETE FROM leave_request_access WHERE leave_request_id = ? AND user_id = ?",
			)
			.bind(id.to_string())
			.bind(user.to_string())
			.execute(&mut *tx)
			.await?;
		}
		tx.commit().await?;
		Ok(())
	}

	async fn delegates(&self, id: &LeaveRequestId) -> Result<Vec<UserId>, DbError> {
		let rows: Vec<(String,)> = sqlx::query_as(
			"SELECT user_id FROM leave_request_access WHERE leave_request_id = ? ORDER BY position",
		)
		.bind(id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter()
			.map(|(user,)| parse_column("delegate id", user))
			.collect()
	}

	async fn require(&self, id: &LeaveRequestId) -> Result<LeaveRequest, DbError> {
		self.get_leave(id)
			.await?
			.ok_or_else(|| DbError::NotFound(format!("leave request {id}")))
	}

	/// Explain why a pending-only update touched no rows.
	async fn not_pending(&self, id: &LeaveRequestId) -> DbError {
		match self.get_leave(id).await {
			Ok(Some(leave)) => DbError::Conflict(format!("leave request {id} is {}", leave.status)),
			Ok(None) => DbError::NotFound(format!("leave request {id}")),
			Err(e) => e,
		}
	}
}

fn row_to_leave(
	row: &sqlx::sqlite::SqliteRow,
	delegated_access: Vec<UserId>,
) -> Result<LeaveRequest, DbError> {
	let id: String = row.get("id");
	let employee_id: String = row.get("employee_id");
	let start_date: String = row.get("start_date");
	let end_date: String = row.get("end_date");
	let leave_type: String = row.get("leave_type");
	let status: String = row.get("status");
	let classification: String = row.get("classification");
	let approved_by: Option<String> = row.get("approved_by");
	let approved_at: Option<String> = row.get("approved_at");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(LeaveRequest {
		id: parse_column("leave id", &id)?,
		employee_id: parse_column("employee_id", &employee_id)?,
		start_date: parse_column("start_date", &start_date)?,
		end_date: parse_column("end_date", &end_date)?,
		leave_type: parse_column("leave_type", &leave_type)?,
		reason: row.get("reason"),
		status: parse_column("status", &status)?,
		classification: parse_column("classification", &classification)?,
		approved_by: approved_by
			.map(|s| parse_column("approved_by", &s))
			.transpose()?,
		approved_at: approved_at
			.map(|s| parse_timestamp("approved_at", &s))
			.transpose()?,
		delegated_access,
		created_at: parse_timestamp("created_at", &created_at)?,
		updated_at: parse_timestamp("updated_at", &updated_at)?,
	})
}

#[async_trait]
impl LeaveStore for LeaveRepository {
	async fn create_leave(&self, new: &NewLeaveRequest) -> Result<LeaveRequest, DbError> {
		self.create_leave(new).await
	}

	async fn get_leave(&self, id: &LeaveRequestId) -> Result<Option<LeaveRequest>, DbError> {
		self.get_leave(id).await
	}

	async fn list_leaves_for_employee(
		&self,
		employee: &UserId,
	) -> Result<Vec<LeaveRequest>, DbError> {
		self.list_leaves_for_employee(employee).await
	}

	async fn update_pending(
		&self,
		id: &LeaveRequestId,
		update: &LeaveUpdate,
	) -> Result<LeaveRequest, DbError> {
		self.update_pending(id, update).await
	}

	async fn decide(
		&self,
		id: &LeaveRequestId,
		status: LeaveStatus,
		approver: &UserId,
	) -> Result<LeaveRequest, DbError> {
		self.decide(id, status, approver).await
	}

	async fn set_classification(
		&self,
		id: &LeaveRequestId,
		classification: Classification,
	) -> Result<(), DbError> {
		self.set_classification(id, classification).await
	}

	async fn grant_access(&self, id: &LeaveRequestId, users: &[UserId]) -> Result<(), DbError> {
		self.grant_access(id, users).await
	}

	async fn revoke_access(&self, id: &LeaveRequestId, users: &[UserId]) -> Result<(), DbError> {
		self.revoke_access(id, users).await
	}
}

#[async_trait]
impl ResourceSnapshotStore for LeaveRepository {
	async fn get_resource_snapshot(
		&self,
		id: &LeaveRequestId,
	) -> Result<Option<ResourceSnapshot>, StoreError> {
		Ok(self.get_leave(id).await?.map(|leave| leave.snapshot()))
	}
}
