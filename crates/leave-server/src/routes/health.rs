// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tokio::time::Instant;

use crate::{
	api::AppState,
	health::{self, HealthComponents, HealthResponse, HealthStatus},
};

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let overall_start = Instant::now();

	let (database, smtp, jobs) = tokio::join!(
		health::check_database(&state.pool),
		health::check_smtp(state.smtp.as_ref()),
		health::check_jobs(&state.scheduler),
	);
	let components = HealthComponents {
		database,
		smtp,
		jobs,
	};

	let status = health::aggregate_status(&components);
	let response = HealthResponse {
		status,
		timestamp: chrono::Utc::now().to_rfc3339(),
		duration_ms: u64::try_from(overall_start.elapsed().as_millis()).unwrap_or(u64::MAX),
		version: env!("CARGO_PKG_VERSION"),
		components,
	};

	let http_status = match status {
		HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
		HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
	};
	(http_status, Json(response))
}
