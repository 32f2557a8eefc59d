// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The authenticated principal that every access check evaluates.

use serde::{Deserialize, Serialize};

use crate::types::{EmploymentStatus, Role, UserId};

/// Attributes of the actor making a request.
///
/// Built once per request from a verified session token and the stored user
/// profile, then passed by reference through every check. Nothing in the
/// access engine mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
	pub id: UserId,
	pub role: Role,
	pub department: Option<String>,
	pub location: Option<String>,
	#[serde(default)]
	pub employment_status: EmploymentStatus,
}

impl Actor {
	/// Creates an actor with no department or location.
	pub fn new(id: UserId, role: Role) -> Self {
		Self {
			id,
			role,
			department: None,
			location: None,
			employment_status: EmploymentStatus::default(),
		}
	}

	pub fn with_department(mut self, department: impl Into<String>) -> Self {
		self.department = Some(department.into());
		self
	}

	pub fn with_location(mut self, location: impl Into<String>) -> Self {
		self.location = Some(location.into());
		self
	}

	pub fn with_employment_status(mut self, status: EmploymentStatus) -> Self {
		self.employment_status = status;
		self
	}

	pub fn has_role(&self, role: Role) -> bool {
		self.role == role
	}

	/// Returns true if the actor's role is one of `roles`.
	pub fn has_any_role(&self, roles: &[Role]) -> bool {
		roles.contains(&self.role)
	}
}
