// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Static policy configuration, loaded once at startup and shared read-only.

use std::collections::BTreeMap;

use super::types::TimeWindow;
use crate::types::{Classification, EmploymentStatus, Role};

/// Bundle consulted when a manager approves a request directly.
pub const MANAGER_APPROVE_POLICY: &str = "manager_approve";

/// A single attribute predicate.
///
/// `Any` is trivially satisfied; `Equals` requires an exact match and fails
/// when the actor lacks the attribute entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint<T> {
	Any,
	Equals(T),
}

// Manual impl: deriving would require `T: Default`.
impl<T> Default for Constraint<T> {
	fn default() -> Self {
		Constraint::Any
	}
}

impl<T> Constraint<T> {
	pub fn is_any(&self) -> bool {
		matches!(self, Constraint::Any)
	}
}

impl<T: PartialEq> Constraint<T> {
	pub fn admits(&self, value: &T) -> bool {
		match self {
			Constraint::Any => true,
			Constraint::Equals(expected) => expected == value,
		}
	}

	/// Like [`admits`](Self::admits) for an attribute the actor may not have.
	pub fn admits_opt(&self, value: Option<&T>) -> bool {
		match (self, value) {
			(Constraint::Any, _) => true,
			(Constraint::Equals(expected), Some(v)) => expected == v,
			(Constraint::Equals(_), None) => false,
		}
	}
}

impl<T> From<Option<T>> for Constraint<T> {
	fn from(value: Option<T>) -> Self {
		value.map_or(Constraint::Any, Constraint::Equals)
	}
}

/// A named bundle of attribute constraints, all of which must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePolicy {
	pub name: String,
	pub role: Constraint<Role>,
	pub department: Constraint<String>,
	pub location: Constraint<String>,
	pub employment_status: Constraint<EmploymentStatus>,
	pub time_window: Constraint<TimeWindow>,
}

impl AttributePolicy {
	/// An empty bundle. It admits every actor until constraints are added.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			role: Constraint::Any,
			department: Constraint::Any,
			location: Constraint::Any,
			employment_status: Constraint::Any,
			time_window: Constraint::Any,
		}
	}

	pub fn role(mut self, role: Role) -> Self {
		self.role = Constraint::Equals(role);
		self
	}

	pub fn department(mut self, department: impl Into<String>) -> Self {
		self.department = Constraint::Equals(department.into());
		self
	}

	pub fn location(mut self, location: impl Into<String>) -> Self {
		self.location = Constraint::Equals(location.into());
		self
	}

	pub fn employment_status(mut self, status: EmploymentStatus) -> Self {
		self.employment_status = Constraint::Equals(status);
		self
	}

	pub fn time_window(mut self, window: TimeWindow) -> Self {
		self.time_window = Constraint::Equals(window);
		self
	}
}

/// Process-wide access policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
	/// Roles allowed to view each classification. A classification with no
	/// entry admits nobody.
	pub classification_policy: BTreeMap<Classification, Vec<Role>>,
	pub working_hours: TimeWindow,
	pub attribute_policies: Vec<AttributePolicy>,
	/// Locations from which leave may be filed. Empty admits every location.
	pub allowed_locations: Vec<String>,
}

impl PolicyConfig {
	/// Roles admitted to `classification`, empty when unconfigured.
	pub fn allowed_roles(&self, classification: Classification) -> &[Role] {
		self.classification_policy
			.get(&classification)
			.map(Vec::as_slice)
			.unwrap_or(&[])
	}

	pub fn attribute_policy(&self, name: &str) -> Option<&AttributePolicy> {
		self.attribute_policies.iter().find(|p| p.name == name)
	}

	/// Add `policy`, replacing any bundle with the same name in place.
	pub fn upsert_attribute_policy(&mut self, policy: AttributePolicy) {
		match self.attribute_policies.iter_mut().find(|p| p.name == policy.name) {
			Some(existing) => *existing = policy,
			None => self.attribute_policies.push(policy),
		}
	}
}

impl Default for PolicyConfig {
	fn default() -> Self {
		let mut classification_policy = BTreeMap::new();
		classification_policy.insert(Classification::Confidential, vec![Role::Hr, Role::Admin]);
		classification_policy.insert(
			Classification::Internal,
			vec![Role::Manager, Role::Hr, Role::Admin],
		);
		classification_policy.insert(Classification::Public, Role::all().to_vec());

		Self {
			classification_policy,
			working_hours: TimeWindow::OFFICE_HOURS,
			attribute_policies: vec![
				AttributePolicy::new(MANAGER_APPROVE_POLICY)
					.role(Role::Manager)
					.time_window(TimeWindow::OFFICE_HOURS),
				AttributePolicy::new("finance_manager_approve")
					.role(Role::Manager)
					.department("Finance"),
			],
			allowed_locations: Vec::new(),
		}
	}
}
