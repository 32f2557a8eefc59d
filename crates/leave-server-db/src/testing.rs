// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::Utc;
use leave_server_auth::{Role, UserId};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::migrations::run_migrations;

/// An in-memory database with the full schema applied.
///
/// A single connection keeps every query on the same in-memory database.
pub async fn create_test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str("sqlite::memory:")
		.unwrap()
		.foreign_keys(true);
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await
		.unwrap();
	run_migrations(&pool).await.unwrap();
	pool
}

/// Insert a user row directly and return its id.
pub async fn insert_user(
	pool: &SqlitePool,
	email: &str,
	role: Role,
	department: Option<&str>,
) -> UserId {
	let id = UserId::generate();
	let now = Utc::now().to_rfc3339();
	sqlx::query(
		r#"
		INSERT INTO users (id, name, email, password_hash, role, department, created_at, updated_at)
		VALUES (?, ?, ?, 'unused', ?, ?, ?, ?)
		"#,
	)
	.bind(id.to_string())
	.bind(email.split('@').next().unwrap_or(email))
	.bind(email)
	.bind(role.as_str())
	.bind(department)
	.bind(&now)
	.bind(&now)
	.execute(pool)
	.await
	.unwrap();
	id
}
