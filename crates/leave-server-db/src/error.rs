// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use leave_server_auth::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl DbError {
	/// True if the underlying error is a UNIQUE constraint violation.
	pub fn is_unique_violation(&self) -> bool {
		match self {
			DbError::Sqlx(sqlx::Error::Database(e)) => e.is_unique_violation(),
			_ => false,
		}
	}
}

impl From<DbError> for StoreError {
	fn from(err: DbError) -> Self {
		match err {
			DbError::Conflict(_) => StoreError::Conflict,
			e if e.is_unique_violation() => StoreError::Duplicate(e.to_string()),
			e => StoreError::Unavailable(e.to_string()),
		}
	}
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Parse an RFC 3339 column into a UTC timestamp.
pub(crate) fn parse_timestamp(
	column: &str,
	value: &str,
) -> Result<chrono::DateTime<chrono::Utc>> {
	chrono::DateTime::parse_from_rfc3339(value)
		.map(|t| t.with_timezone(&chrono::Utc))
		.map_err(|e| DbError::Internal(format!("invalid {column} '{value}': {e}")))
}

/// Parse a text column through `FromStr`, reporting the column on failure.
pub(crate) fn parse_column<T>(column: &str, value: &str) -> Result<T>
where
	T: std::str::FromStr,
	T::Err: std::fmt::Display,
{
	value
		.parse()
		.map_err(|e| DbError::Internal(format!("invalid {column} '{value}': {e}")))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn conflict_maps_to_store_conflict() {
		let err: StoreError = DbError::Conflict("version".into()).into();
		assert!(matches!(err, StoreError::Conflict));
	}

	#[test]
	fn other_errors_are_unavailable() {
		let err: StoreError = DbError::Internal("boom".into()).into();
		assert!(matches!(err, StoreError::Unavailable(_)));
		assert!(err.is_retryable());
	}

	#[test]
	fn parse_timestamp_reports_column() {
		let err = parse_timestamp("created_at", "yesterday").unwrap_err();
		assert!(err.to_string().contains("created_at"));
		assert!(parse_timestamp("created_at", "2025-01-06T09:00:00+00:00").is_ok());
	}
}
