// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::AuditSinkError;
use crate::event::AuditLogEntry;
use crate::sink::AuditSink;

/// Writes entries to the `audit_logs` table, which the admin log viewer reads.
pub struct SqliteAuditSink {
	pool: SqlitePool,
}

impl SqliteAuditSink {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
	fn name(&self) -> &str {
		"sqlite"
	}

	async fn publish(&self, event: Arc<AuditLogEntry>) -> Result<(), AuditSinkError> {
		let details_json = serde_json::to_string(&event.details)
			.map_err(|e| AuditSinkError::Permanent(format!("failed to serialize details: {e}")))?;

		sqlx::query(
			r#"
			INSERT INTO audit_logs (
				id, timestamp, event_type, outcome, severity, actor_user_id,
				resource_type, resource_id, ip_address, user_agent, details
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(event.id.to_string())
		.bind(event.timestamp.to_rfc3339())
		.bind(event.event_type.as_str())
		.bind(event.outcome.as_str())
		.bind(event.severity.as_str())
		.bind(event.actor_user_id.map(|u| u.to_string()))
		.bind(&event.resource_type)
		.bind(&event.resource_id)
		.bind(&event.ip_address)
		.bind(&event.user_agent)
		.bind(&details_json)
		.execute(&self.pool)
		.await
		.map_err(|e| {
			if is_transient_error(&e) {
				AuditSinkError::Transient(format!("database error: {e}"))
			} else {
				AuditSinkError::Permanent(format!("database error: {e}"))
			}
		})?;

		Ok(())
	}

	async fn health_check(&self) -> Result<(), AuditSinkError> {
		sqlx::query("SELECT 1")
			.execute(&self.pool)
			.await
			.map_err(|e| AuditSinkError::Transient(format!("health check failed: {e}")))?;
		Ok(())
	}
}

fn is_transient_error(e: &sqlx::Error) -> bool {
	match e {
		sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
		sqlx::Error::Database(db_err) => {
			let msg = db_err.message().to_lowercase();
			msg.contains("busy") || msg.contains("locked")
		}
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::{AuditEventType, AuditLogBuilder};
	use leave_server_auth::{AccessModel, UserId};
	use sqlx::sqlite::SqlitePoolOptions;
	use sqlx::Row;

	async fn pool_with_table() -> SqlitePool {
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect("sqlite::memory:")
			.await
			.unwrap();
		sqlx::query(
			r#"
			CREATE TABLE audit_logs (
				id TEXT PRIMARY KEY,
				timestamp TEXT NOT NULL,
				event_type TEXT NOT NULL,
				outcome TEXT NOT NULL,
				severity TEXT NOT NULL,
				actor_user_id TEXT,
				resource_type TEXT,
				resource_id TEXT,
				ip_address TEXT,
				user_agent TEXT,
				details TEXT
			)
			"#,
		)
		.execute(&pool)
		.await
		.unwrap();
		pool
	}

	#[tokio::test]
	async fn publish_inserts_row() {
		let pool = pool_with_table().await;
		let sink = SqliteAuditSink::new(pool.clone());
		let actor = UserId::generate();

		let entry = AuditLogBuilder::new(AuditEventType::AccessDenied)
			.actor(actor)
			.resource("leave_request", "L1")
			.denied_by(AccessModel::Dac)
			.ip_address("10.0.0.1")
			.build();
		sink.publish(Arc::new(entry)).await.unwrap();

		let row = sqlx::query("SELECT event_type, outcome, actor_user_id, details FROM audit_logs")
			.fetch_one(&pool)
			.await
			.unwrap();
		assert_eq!(row.get::<String, _>("event_type"), "ACCESS_DENIED");
		assert_eq!(row.get::<String, _>("outcome"), "DENIED");
		assert_eq!(row.get::<String, _>("actor_user_id"), actor.to_string());
		assert_eq!(row.get::<String, _>("details"), r#"{"model":"dac"}"#);
	}

	#[tokio::test]
	async fn missing_table_is_permanent() {
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect("sqlite::memory:")
			.await
			.unwrap();
		let sink = SqliteAuditSink::new(pool);
		let entry = AuditLogBuilder::new(AuditEventType::Login).build();
		let err = sink.publish(Arc::new(entry)).await.unwrap_err();
		assert!(matches!(err, AuditSinkError::Permanent(_)));
		assert!(sink.health_check().await.is_ok());
	}
}
