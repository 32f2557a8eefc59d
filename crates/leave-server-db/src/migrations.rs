// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::SqlitePool;

use crate::error::Result;

const MIGRATIONS: &[(&str, &str)] = &[(
	"001_initial",
	include_str!("../migrations/001_initial.sql"),
)];

/// Apply every migration that has not yet been recorded.
///
/// Statements are split on `;`, so migrations must not contain triggers or
/// string literals with semicolons.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS schema_migrations (name TEXT PRIMARY KEY NOT NULL, applied_at TEXT NOT NULL)",
	)
	.execute(pool)
	.await?;

	for (name, sql) in MIGRATIONS {
		let applied: Option<(String,)> =
			sqlx::query_as("SELECT name FROM schema_migrations WHERE name = ?")
				.bind(name)
				.fetch_optional(pool)
				.await?;
		if applied.is_some() {
			continue;
		}

		let mut tx = pool.begin().await?;
		for stmt in statements(sql) {
			sqlx::query(stmt).execute(&mut *tx).await?;
		}
		sqlx::query("INSERT INTO schema_migrations (name, applied_at) VALUES (?, ?)")
			.bind(name)
			.bind(chrono::Utc::now().to_rfc3339())
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;

		tracing::info!(migration = %name, "applied migration");
	}

	Ok(())
}

fn statements(sql: &str) -> impl Iterator<Item = &str> {
	sql.split(';').map(str::trim).filter(|s| {
		s.lines()
			.any(|line| !line.trim().is_empty() && !line.trim_start().starts_with("--"))
	})
}
