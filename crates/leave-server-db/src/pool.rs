// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::str::FromStr;

use crate::error::DbError;

/// Create a SqlitePool with WAL mode and foreign keys enforced.
///
/// # Arguments
/// * `database_url` - SQLite connection string (e.g., "sqlite:./leave.db")
///
/// # Errors
/// Returns `DbError::Internal` if the URL is invalid, or `DbError::Sqlx` if the
/// connection fails.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, DbError> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| DbError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.foreign_keys(true)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("database pool created");
	Ok(pool)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn creates_database_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("leave.db");
		let pool = create_pool(&format!("sqlite:{}", path.display())).await.unwrap();
		sqlx::query("SELECT 1").execute(&pool).await.unwrap();
		assert!(path.exists());
	}

	#[tokio::test]
	async fn rejects_malformed_url() {
		let err = create_pool("postgres://nope").await.unwrap_err();
		assert!(matches!(err, DbError::Internal(_)));
	}
}
