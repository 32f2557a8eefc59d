// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Value types shared by the access checks.

use async_trait::async_trait;
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::credential::StoreError;
use crate::types::{Classification, LeaveRequestId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
	#[error("invalid time of day '{0}', expected zero-padded HH:MM")]
	InvalidTime(String),

	#[error("time window start {start} is after end {end}")]
	InvertedWindow { start: TimeOfDay, end: TimeOfDay },
}

// =============================================================================
// Time of day
// =============================================================================

/// A wall-clock time at minute resolution, stored as minute-of-day.
///
/// Ordering on this type is identical to comparing zero-padded `"HH:MM"`
/// strings, which is how working hours are written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
	pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);

	pub fn from_hm(hour: u32, minute: u32) -> Result<Self, PolicyError> {
		if hour > 23 || minute > 59 {
			return Err(PolicyError::InvalidTime(format!("{hour}:{minute}")));
		}
		Ok(Self((hour * 60 + minute) as u16))
	}

	pub fn minute_of_day(&self) -> u16 {
		self.0
	}

	pub fn hour(&self) -> u32 {
		u32::from(self.0 / 60)
	}

	pub fn minute(&self) -> u32 {
		u32::from(self.0 % 60)
	}
}

impl From<NaiveTime> for TimeOfDay {
	/// Seconds are truncated.
	fn from(t: NaiveTime) -> Self {
		Self((t.hour() * 60 + t.minute()) as u16)
	}
}

impl FromStr for TimeOfDay {
	type Err = PolicyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let invalid = || PolicyError::InvalidTime(s.to_string());
		let bytes = s.as_bytes();
		if bytes.len() != 5 || bytes[2] != b':' {
			return Err(invalid());
		}
		let (hh, mm) = (&s[..2], &s[3..]);
		if !hh.bytes().chain(mm.bytes()).all(|b| b.is_ascii_digit()) {
			return Err(invalid());
		}
		let hour: u32 = hh.parse().map_err(|_| invalid())?;
		let minute: u32 = mm.parse().map_err(|_| invalid())?;
		Self::from_hm(hour, minute).map_err(|_| invalid())
	}
}

impl fmt::Display for TimeOfDay {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:02}:{:02}", self.hour(), self.minute())
	}
}

impl Serialize for TimeOfDay {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for TimeOfDay {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

/// An inclusive same-day window. Windows that wrap midnight are not
/// representable: `start` must not be after `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
	start: TimeOfDay,
	end: TimeOfDay,
}

impl TimeWindow {
	/// 09:00 to 18:00.
	pub const OFFICE_HOURS: TimeWindow = TimeWindow {
		start: TimeOfDay(9 * 60),
		end: TimeOfDay(18 * 60),
	};

	pub fn new(start: TimeOfDay, end: TimeOfDay) -> Result<Self, PolicyError> {
		if start > end {
			return Err(PolicyError::InvertedWindow { start, end });
		}
		Ok(Self { start, end })
	}

	/// Parse from two `"HH:MM"` strings.
	pub fn parse(start: &str, end: &str) -> Result<Self, PolicyError> {
		Self::new(start.parse()?, end.parse()?)
	}

	pub fn start(&self) -> TimeOfDay {
		self.start
	}

	pub fn end(&self) -> TimeOfDay {
		self.end
	}

	/// Both bounds inclusive.
	pub fn contains(&self, t: TimeOfDay) -> bool {
		self.start <= t && t <= self.end
	}
}

impl<'de> Deserialize<'de> for TimeWindow {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		#[derive(Deserialize)]
		struct Raw {
			start: TimeOfDay,
			end: TimeOfDay,
		}
		let raw = Raw::deserialize(deserializer)?;
		TimeWindow::new(raw.start, raw.end).map_err(serde::de::Error::custom)
	}
}

impl fmt::Display for TimeWindow {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}-{}", self.start, self.end)
	}
}

// =============================================================================
// Decisions
// =============================================================================

/// The access model a denial is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessModel {
	Rbac,
	Mac,
	Dac,
	RubacTime,
	RubacLocation,
	Abac,
}

impl AccessModel {
	pub fn as_str(&self) -> &'static str {
		match self {
			AccessModel::Rbac => "rbac",
			AccessModel::Mac => "mac",
			AccessModel::Dac => "dac",
			AccessModel::RubacTime => "rubac_time",
			AccessModel::RubacLocation => "rubac_location",
			AccessModel::Abac => "abac",
		}
	}
}

impl fmt::Display for AccessModel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Outcome of a check or a whole chain. `reason` is set only on denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
	pub allow: bool,
	pub reason: Option<AccessModel>,
}

impl Decision {
	pub const ALLOW: Decision = Decision {
		allow: true,
		reason: None,
	};

	pub fn deny(model: AccessModel) -> Self {
		Self {
			allow: false,
			reason: Some(model),
		}
	}

	/// Allow if `cond`, otherwise deny attributed to `model`.
	pub fn from_bool(cond: bool, model: AccessModel) -> Self {
		if cond {
			Self::ALLOW
		} else {
			Self::deny(model)
		}
	}

	pub fn is_allowed(&self) -> bool {
		self.allow
	}
}

// =============================================================================
// Resource snapshots
// =============================================================================

/// The fields of a protected resource an access decision reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
	pub id: LeaveRequestId,
	pub classification: Classification,
	pub owner: UserId,
	delegated_access: Vec<UserId>,
}

impl ResourceSnapshot {
	pub fn new(id: LeaveRequestId, classification: Classification, owner: UserId) -> Self {
		Self {
			id,
			classification,
			owner,
			delegated_access: Vec::new(),
		}
	}

	/// Set the delegated users. Order is kept and duplicates are dropped.
	pub fn with_delegates(mut self, delegates: impl IntoIterator<Item = UserId>) -> Self {
		self.delegated_access.clear();
		for id in delegates {
			if !self.delegated_access.contains(&id) {
				self.delegated_access.push(id);
			}
		}
		self
	}

	pub fn delegated_access(&self) -> &[UserId] {
		&self.delegated_access
	}

	/// The same resource with delegation stripped, for operations reserved to
	/// the owner.
	pub fn owner_only(&self) -> Self {
		Self {
			delegated_access: Vec::new(),
			..self.clone()
		}
	}
}

/// Loads resource snapshots for access decisions.
///
/// `Ok(None)` is "not found", which callers report as a lookup failure and
/// never as a denial.
#[async_trait]
pub trait ResourceSnapshotStore: Send + Sync {
	async fn get_resource_snapshot(
		&self,
		id: &LeaveRequestId,
	) -> Result<Option<ResourceSnapshot>, StoreError>;
}
