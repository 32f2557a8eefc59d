// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use leave_server_db::{JobDefinition, JobRun, JobStatus, TriggerSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobType {
	/// Every `interval`, first run one interval after start.
	Periodic { interval: Duration },
	/// Once a day at `at`, server local time.
	Daily { at: NaiveTime },
	/// Only when triggered.
	OneShot,
}

impl JobType {
	pub fn as_str(&self) -> &'static str {
		match self {
			JobType::Periodic { .. } => "periodic",
			JobType::Daily { .. } => "daily",
			JobType::OneShot => "one_shot",
		}
	}

	/// Human-readable schedule for health output.
	pub fn describe(&self) -> String {
		match self {
			JobType::Periodic { interval } => format!("every {}s", interval.as_secs()),
			JobType::Daily { at } => format!("daily at {}", at.format("%H:%M")),
			JobType::OneShot => "on demand".to_string(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutput {
	pub message: String,
	pub metadata: Option<serde_json::Value>,
}

/// A run that finished successfully, as returned by a manual trigger.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedRun {
	pub run_id: String,
	pub output: JobOutput,
}

/// Time from `now` until the next occurrence of `at`. An occurrence exactly
/// at `now` is skipped in favour of tomorrow's.
pub fn until_next_daily(now: NaiveDateTime, at: NaiveTime) -> Duration {
	let today = now.date().and_time(at);
	let next = if today > now {
		today
	} else {
		today + chrono::Duration::days(1)
	};
	(next - now).to_std().unwrap_or(Duration::ZERO)
}
