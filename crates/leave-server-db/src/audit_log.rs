// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read side of the audit trail.
//!
//! Rows are written by the audit crate's SQLite sink. This repository serves
//! the admin log viewer: filtered, paginated, newest first, with the acting
//! user's name, email and role joined in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leave_server_audit::{AuditEventType, AuditOutcome, AuditSeverity};
use leave_server_auth::{Role, UserId};
use serde::Serialize;
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::{parse_column, parse_timestamp, DbError, Result};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
	pub actor: Option<UserId>,
	pub event_type: Option<AuditEventType>,
	pub outcome: Option<AuditOutcome>,
	pub from: Option<DateTime<Utc>>,
	pub to: Option<DateTime<Utc>>,
}

/// The acting user as it exists now. `None` on the record if the user has
/// since been deleted or the event had no actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditActor {
	pub id: UserId,
	pub name: String,
	pub email: String,
	pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditLogRecord {
	pub id: Uuid,
	pub timestamp: DateTime<Utc>,
	pub event_type: AuditEventType,
	pub outcome: AuditOutcome,
	pub severity: AuditSeverity,
	pub actor_user_id: Option<UserId>,
	pub actor: Option<AuditActor>,
	pub resource_type: Option<String>,
	pub resource_id: Option<String>,
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
	pub details: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditLogPage {
	pub total: i64,
	pub page: u32,
	pub pages: u32,
	pub logs: Vec<AuditLogRecord>,
}

#[async_trait]
pub trait AuditLogStore: Send + Sync {
	async fn query_logs(&self, filter: &AuditLogFilter, page: u32, limit: u32)
		-> Result<AuditLogPage>;
	async fn delete_all(&self) -> Result<u64>;
}

#[derive(Clone)]
pub struct AuditLogRepository {
	pool: SqlitePool,
}

impl AuditLogRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// One page of matching entries, newest first.
	///
	/// `page` is 1-based; 0 is treated as 1. `limit` is clamped to
	/// `1..=MAX_PAGE_SIZE`.
	#[tracing::instrument(skip(self, filter), fields(page, limit))]
	pub async fn query_logs(
		&self,
		filter: &AuditLogFilter,
		page: u32,
		limit: u32,
	) -> Result<AuditLogPage> {
		let page = page.max(1);
		let limit = limit.clamp(1, MAX_PAGE_SIZE);
		let offset = i64::from(page - 1) * i64::from(limit);

		let mut conditions = vec!["1=1"];
		let mut binds: Vec<String> = Vec::new();
		if let Some(actor) = filter.actor {
			conditions.push("a.actor_user_id = ?");
			binds.push(actor.to_string());
		}
		if let Some(event_type) = filter.event_type {
			conditions.push("a.event_type = ?");
			binds.push(event_type.as_str().to_string());
		}
		if let Some(outcome) = filter.outcome {
			conditions.push("a.outcome = ?");
			binds.push(outcome.as_str().to_string());
		}
		if let Some(from) = filter.from {
			conditions.push("a.timestamp >= ?");
			binds.push(from.to_rfc3339());
		}
		if let Some(to) = filter.to {
			conditions.push("a.timestamp <= ?");
			binds.push(to.to_rfc3339());
		}
		let where_clause = conditions.join(" AND ");

		let count_sql = format!("SELECT COUNT(*) as cnt FROM audit_logs a WHERE {where_clause}");
		let mut count_query = sqlx::query(&count_sql);
		for value in &binds {
			count_query = count_query.bind(value);
		}
		let total: i64 = count_query.fetch_one(&self.pool).await?.get("cnt");

		let data_sql = format!(
			"SELECT a.id, a.timestamp, a.event_type, a.outcome, a.severity, a.actor_user_id, \
			 a.resource_type, a.resource_id, a.ip_address, a.user_agent, a.details, \
			 u.name AS u_name, u.email AS u_email, u.role AS u_role \
			 FROM audit_logs a LEFT JOIN users u ON u.id = a.actor_user_id \
			 WHERE {where_clause} ORDER BY a.timestamp DESC, a.rowid DESC LIMIT ? OFFSET ?"
		);
		let mut data_query = sqlx::query(&data_sql);
		for value in &binds {
			data_query = data_query.bind(value);
		}
		let rows = data_query
			.bind(i64::from(limit))
			.bind(offset)
			.fetch_all(&self.pool)
			.await?;

		let logs = rows
			.iter()
			.map(row_to_record)
			.collect::<Result<Vec<_>>>()?;

		Ok(AuditLogPage {
			total,
			page,
			pages: page_count(total, limit),
			logs,
		})
	}

	/// Remove every entry. Returns the number deleted.
	#[tracing::instrument(skip(self))]
	pub async fn delete_all(&self) -> Result<u64> {
		let result = sqlx::query("DELETE FROM audit_logs")
			.execute(&self.pool)
			.await?;
		tracing::info!(deleted = result.rows_affected(), "audit log cleared");
		Ok(result.rows_affected())
	}
}

fn page_count(total: i64, limit: u32) -> u32 {
	let total = u64::try_from(total).unwrap_or(0);
	u32::try_from(total.div_ceil(u64::from(limit))).unwrap_or(u32::MAX)
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<AuditLogRecord> {
	let id: String = row.get("id");
	let timestamp: String = row.get("timestamp");
	let event_type: String = row.get("event_type");
	let outcome: String = row.get("outcome");
	let severity: String = row.get("severity");
	let actor_user_id: Option<String> = row.get("actor_user_id");
	let details: Option<String> = row.get("details");

	let actor_user_id: Option<UserId> = actor_user_id
		.map(|s| parse_column("actor_user_id", &s))
		.transpose()?;

	let actor = match (actor_user_id, row.get::<Option<String>, _>("u_email")) {
		(Some(id), Some(email)) => {
			let role: String = row.get("u_role");
			Some(AuditActor {
				id,
				name: row.get("u_name"),
				email,
				role: parse_column("role", &role)?,
			})
		}
		_ => None,
	};

	Ok(AuditLogRecord {
		id: Uuid::parse_str(&id).map_err(|e| DbError::Internal(format!("invalid audit id: {e}")))?,
		timestamp: parse_timestamp("timestamp", &timestamp)?,
		event_type: parse_column("event_type", &event_type)?,
		outcome: parse_column("outcome", &outcome)?,
		severity: parse_column("severity", &severity)?,
		actor_user_id,
		actor,
		resource_type: row.get("resource_type"),
		resource_id: row.get("resource_id"),
		ip_address: row.get("ip_address"),
		user_agent: row.get("user_agent"),
		details: details
			.map(|s| serde_json::from_str(&s))
			.transpose()?
			.unwrap_or(serde_json::Value::Null),
	})
}

#[async_trait]
impl AuditLogStore for AuditLogRepository {
	async fn query_logs(
		&self,
		filter: &AuditLogFilter,
		page: u32,
		limit: u32,
	) -> Result<AuditLogPage> {
		self.query_logs(filter, page, limit).await
	}

	async fn delete_all(&self) -> Result<u64> {
		self.delete_all().await
	}
}
