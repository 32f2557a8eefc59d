// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit log browsing and clearing for administrators.

use axum::{
	extract::{Query, State},
	Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use leave_server_audit::{AuditEventType, AuditLogEntry, AuditOutcome};
use leave_server_auth::UserId;
use leave_server_db::{AuditLogFilter, AuditLogPage};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{
	api::AppState,
	auth_middleware::RequireAuth,
	authz::{authorize, chains},
	client_info::ClientInfo,
	error::ServerError,
	pagination::PageParams,
};

/// Query string for `GET /api/logs`. Empty values are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
	pub user: Option<String>,
	pub action: Option<String>,
	pub status: Option<String>,
	pub start_date: Option<String>,
	pub end_date: Option<String>,
	pub page: Option<u32>,
	pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ClearLogsResponse {
	pub message: String,
	pub deleted: u64,
}

#[derive(Clone, Copy)]
enum Bound {
	Start,
	End,
}

fn present(value: &Option<String>) -> Option<&str> {
	value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_field<T: FromStr>(name: &str, value: &Option<String>) -> Result<Option<T>, ServerError> {
	present(value)
		.map(|v| {
			v.parse::<T>()
				.map_err(|_| ServerError::BadRequest(format!("Invalid {name}: {v}")))
		})
		.transpose()
}

/// RFC 3339, or a bare date covering the whole day.
fn parse_bound(
	name: &str,
	value: &Option<String>,
	bound: Bound,
) -> Result<Option<DateTime<Utc>>, ServerError> {
	let Some(v) = present(value) else {
		return Ok(None);
	};
	if let Ok(ts) = DateTime::parse_from_rfc3339(v) {
		return Ok(Some(ts.with_timezone(&Utc)));
	}
	let date = NaiveDate::parse_from_str(v, "%Y-%m-%d")
		.map_err(|_| ServerError::BadRequest(format!("Invalid {name}: {v}")))?;
	let time = match bound {
		Bound::Start => NaiveTime::MIN,
		Bound::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN),
	};
	Ok(Some(date.and_time(time).and_utc()))
}

impl LogQuery {
	fn filter(&self) -> Result<AuditLogFilter, ServerError> {
		let filter = AuditLogFilter {
			actor: parse_field::<UserId>("user", &self.user)?,
			event_type: parse_field::<AuditEventType>("action", &self.action)?,
			outcome: parse_field::<AuditOutcome>("status", &self.status)?,
			from: parse_bound("start_date", &self.start_date, Bound::Start)?,
			to: parse_bound("end_date", &self.end_date, Bound::End)?,
		};
		if let (Some(from), Some(to)) = (filter.from, filter.to) {
			if to < from {
				return Err(ServerError::BadRequest(
					"end_date cannot be before start_date".to_string(),
				));
			}
		}
		Ok(filter)
	}

	fn page_params(&self) -> PageParams {
		PageParams {
			page: self.page,
			limit: self.limit,
		}
	}
}

#[tracing::instrument(skip(state, client, user, query), fields(user_id = %user.actor.id))]
pub async fn list_logs(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
	Query(query): Query<LogQuery>,
) -> Result<Json<AuditLogPage>, ServerError> {
	authorize(&state, &user, &chains::administer(), None, &client)?;

	let filter = query.filter()?;
	let params = query.page_params();
	let page = state
		.audit_logs
		.query_logs(&filter, params.page_or_default(), params.limit_clamped())
		.await?;
	Ok(Json(page))
}

#[tracing::instrument(skip(state, client, user), fields(user_id = %user.actor.id))]
pub async fn clear_logs(
	State(state): State<AppState>,
	client: ClientInfo,
	RequireAuth(user): RequireAuth,
) -> Result<Json<ClearLogsResponse>, ServerError> {
	authorize(&state, &user, &chains::administer(), None, &client)?;

	let deleted = state.audit_logs.delete_all().await?;
	// Written after the delete so the clearing itself stays on record.
	state.audit.log(
		client
			.apply(AuditLogEntry::builder(AuditEventType::ClearLogs))
			.actor(user.actor.id)
			.detail("deleted", deleted)
			.build(),
	);

	Ok(Json(ClearLogsResponse {
		message: "All logs removed".to_string(),
		deleted,
	}))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn query(pairs: &str) -> LogQuery {
		let uri: axum::http::Uri = format!("/api/logs?{pairs}").parse().unwrap();
		Query::<LogQuery>::try_from_uri(&uri).unwrap().0
	}

	#[test]
	fn empty_query_has_no_filters() {
		let filter = query("").filter().unwrap();
		assert!(filter.actor.is_none());
		assert!(filter.event_type.is_none());
		assert!(filter.outcome.is_none());
		assert!(filter.from.is_none() && filter.to.is_none());
	}

	#[test]
	fn blank_values_are_ignored() {
		let filter = query("user=&action=&status=").filter().unwrap();
		assert!(filter.actor.is_none());
		assert!(filter.event_type.is_none());
	}

	#[test]
	fn action_and_status_are_case_insensitive() {
		let filter = query("action=login_failed&status=failed").filter().unwrap();
		assert_eq!(filter.event_type, Some(AuditEventType::LoginFailed));
		assert_eq!(filter.outcome, Some(AuditOutcome::Failed));
	}

	#[test]
	fn bare_dates_cover_the_whole_day() {
		let filter = query("start_date=2025-01-06&end_date=2025-01-06")
			.filter()
			.unwrap();
		let from = filter.from.unwrap();
		let to = filter.to.unwrap();
		assert_eq!(from.to_rfc3339(), "2025-01-06T00:00:00+00:00");
		assert!(to > from);
		assert_eq!(to.date_naive(), from.date_naive());
	}

	#[test]
	fn rfc3339_timestamps_are_accepted() {
		let filter = query("start_date=2025-01-06T09%3A30%3A00Z").filter().unwrap();
		assert_eq!(filter.from.unwrap().to_rfc3339(), "2025-01-06T09:30:00+00:00");
	}

	#[test]
	fn invalid_values_are_bad_requests() {
		for q in ["user=nope", "action=TELEPORT", "status=maybe", "start_date=06/01/2025"] {
			assert!(
				matches!(query(q).filter(), Err(ServerError::BadRequest(_))),
				"{q} should be rejected"
			);
		}
	}

	#[test]
	fn reversed_range_is_rejected() {
		let result = query("start_date=2025-02-01&end_date=2025-01-01").filter();
		assert!(matches!(result, Err(ServerError::BadRequest(_))));
	}
}
