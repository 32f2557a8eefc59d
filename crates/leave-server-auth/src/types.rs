// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for authentication and authorization.
//!
//! - **ID newtypes**: UUID wrappers for users and leave requests ([`UserId`],
//!   [`LeaveRequestId`]) so the two can never be swapped by accident
//! - **Roles**: the four workplace roles ([`Role`]) every check keys on
//! - **Classification**: the sensitivity label on a protected resource
//! - **Employment status**: an actor attribute consulted by attribute policies
//!
//! All enums serialize as snake_case strings and parse case-insensitively, so
//! both `"HR"` and `"hr"` are accepted from configuration and request bodies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}

		impl FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s).map(Self)
			}
		}
	};
}

define_id_type!(UserId, "Unique identifier for a user (and their credential record).");
define_id_type!(LeaveRequestId, "Unique identifier for a leave request.");

/// Error returned when parsing one of the string-backed enums fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
	pub kind: &'static str,
	pub value: String,
}

fn normalize(s: &str) -> String {
	s.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

// =============================================================================
// Roles
// =============================================================================

/// Workplace roles. Exactly one per actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	/// Files and edits their own leave requests.
	Employee,
	/// Approves leave within their department during working hours.
	Manager,
	/// Approves any leave and reads confidential requests.
	#[serde(alias = "HR")]
	Hr,
	/// Administers users, logs and backups.
	Admin,
}

impl Role {
	/// Returns all available roles.
	pub fn all() -> &'static [Role] {
		&[Role::Employee, Role::Manager, Role::Hr, Role::Admin]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Role::Employee => "employee",
			Role::Manager => "manager",
			Role::Hr => "hr",
			Role::Admin => "admin",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match normalize(s).as_str() {
			"employee" => Ok(Role::Employee),
			"manager" => Ok(Role::Manager),
			"hr" => Ok(Role::Hr),
			"admin" => Ok(Role::Admin),
			_ => Err(ParseEnumError {
				kind: "role",
				value: s.to_string(),
			}),
		}
	}
}

// =============================================================================
// Classification
// =============================================================================

/// Sensitivity label on a protected resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
	Public,
	Internal,
	Confidential,
}

impl Classification {
	pub fn all() -> &'static [Classification] {
		&[
			Classification::Public,
			Classification::Internal,
			Classification::Confidential,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Classification::Public => "public",
			Classification::Internal => "internal",
			Classification::Confidential => "confidential",
		}
	}
}

impl Default for Classification {
	fn default() -> Self {
		Classification::Internal
	}
}

impl fmt::Display for Classification {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Classification {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match normalize(s).as_str() {
			"public" => Ok(Classification::Public),
			"internal" => Ok(Classification::Internal),
			"confidential" => Ok(Classification::Confidential),
			_ => Err(ParseEnumError {
				kind: "classification",
				value: s.to_string(),
			}),
		}
	}
}

// =============================================================================
// Employment Status
// =============================================================================

/// Contractual status of an employee, consulted by attribute policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
	#[default]
	FullTime,
	PartTime,
	Contract,
	Intern,
}

impl EmploymentStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			EmploymentStatus::FullTime => "full_time",
			EmploymentStatus::PartTime => "part_time",
			EmploymentStatus::Contract => "contract",
			EmploymentStatus::Intern => "intern",
		}
	}
}

impl fmt::Display for EmploymentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for EmploymentStatus {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match normalize(s).as_str() {
			"full_time" | "fulltime" => Ok(EmploymentStatus::FullTime),
			"part_time" | "parttime" => Ok(EmploymentStatus::PartTime),
			"contract" => Ok(EmploymentStatus::Contract),
			"intern" => Ok(EmploymentStatus::Intern),
			_ => Err(ParseEnumError {
				kind: "employment status",
				value: s.to_string(),
			}),
		}
	}
}
