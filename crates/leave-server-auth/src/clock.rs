// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Time source for OTP expiry, token lifetimes and time-of-day rules.
//!
//! Time-window checks compare against the server's *local* wall clock, while
//! expiries are absolute instants in UTC. [`Clock`] exposes both so the
//! pipeline and the access engine read from one injectable source.

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveTime, Utc};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
	/// Current instant.
	fn now(&self) -> DateTime<Utc>;

	/// Current local wall-clock time of day.
	fn local_time(&self) -> NaiveTime;
}

/// Reads the operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}

	fn local_time(&self) -> NaiveTime {
		Local::now().time()
	}
}

/// A settable clock for tests and simulations.
///
/// Holds an instant with an explicit offset so `local_time` is deterministic
/// regardless of the host timezone.
#[derive(Debug)]
pub struct FixedClock {
	now: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
	pub fn new(now: DateTime<FixedOffset>) -> Self {
		Self {
			now: Mutex::new(now),
		}
	}

	/// A clock pinned to `hh:mm` UTC on 2025-01-06 (a Monday).
	///
	/// Returns `None` when `hour` or `minute` is out of range.
	pub fn at_hm(hour: u32, minute: u32) -> Option<Self> {
		let date = chrono::NaiveDate::from_ymd_opt(2025, 1, 6)?.and_hms_opt(hour, minute, 0)?;
		Some(Self::new(date.and_utc().fixed_offset()))
	}

	pub fn advance(&self, by: Duration) {
		let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
		*now += by;
	}

	pub fn set(&self, to: DateTime<FixedOffset>) {
		*self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
	}

	fn current(&self) -> DateTime<FixedOffset> {
		*self.now.lock().unwrap_or_else(|e| e.into_inner())
	}
}

impl Clock for FixedClock {
	fn now(&self) -> DateTime<Utc> {
		self.current().with_timezone(&Utc)
	}

	fn local_time(&self) -> NaiveTime {
		self.current().time()
	}
}
