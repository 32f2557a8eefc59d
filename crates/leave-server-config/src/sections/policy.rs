// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access policy configuration.
//!
//! The TOML form keeps every key a plain string so operators can write role
//! and classification names the way they appear in the UI:
//!
//! ```toml
//! [policy.working_hours]
//! start = "09:00"
//! end = "18:00"
//!
//! [policy.classification_policy]
//! Confidential = ["HR", "Admin"]
//!
//! [[policy.attribute_policies]]
//! name = "manager_approve"
//! role = "Manager"
//! time_window = { start = "08:00", end = "20:00" }
//!
//! [policy]
//! allowed_locations = ["Lagos", "Accra"]
//! ```
//!
//! Configured attribute bundles are laid over the shipped ones by name, so
//! redefining `manager_approve` changes who may approve directly without
//! dropping the other defaults.
//!
//! Names are resolved into typed values by [`PolicyConfigLayer::finalize`],
//! which rejects unknown roles, classifications and malformed times.

use std::collections::BTreeMap;

use leave_server_auth::{
	AttributePolicy, Classification, Constraint, EmploymentStatus, PolicyConfig, Role, TimeWindow,
};
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct WorkingHoursLayer {
	pub start: String,
	pub end: String,
}

/// One attribute bundle as written in TOML. Absent fields are unconstrained.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct AttributePolicyLayer {
	pub name: String,
	#[serde(default)]
	pub role: Option<String>,
	#[serde(default)]
	pub department: Option<String>,
	#[serde(default)]
	pub location: Option<String>,
	#[serde(default)]
	pub employment_status: Option<String>,
	#[serde(default)]
	pub time_window: Option<WorkingHoursLayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyConfigLayer {
	#[serde(default)]
	pub working_hours: Option<WorkingHoursLayer>,
	#[serde(default)]
	pub classification_policy: Option<BTreeMap<String, Vec<String>>>,
	#[serde(default)]
	pub attribute_policies: Option<Vec<AttributePolicyLayer>>,
	#[serde(default)]
	pub allowed_locations: Option<Vec<String>>,
}

impl PolicyConfigLayer {
	/// Each field is replaced wholesale between layers; the classification
	/// map and the attribute bundles are not merged entry by entry.
	pub fn merge(&mut self, other: PolicyConfigLayer) {
		if other.working_hours.is_some() {
			self.working_hours = other.working_hours;
		}
		if other.classification_policy.is_some() {
			self.classification_policy = other.classification_policy;
		}
		if other.attribute_policies.is_some() {
			self.attribute_policies = other.attribute_policies;
		}
		if other.allowed_locations.is_some() {
			self.allowed_locations = other.allowed_locations;
		}
	}

	pub fn finalize(self) -> Result<PolicyConfig, ConfigError> {
		let defaults = PolicyConfig::default();

		let working_hours = match self.working_hours {
			Some(w) => parse_window("policy.working_hours", &w)?,
			None => defaults.working_hours,
		};

		let classification_policy = match self.classification_policy {
			Some(map) => {
				let mut resolved = BTreeMap::new();
				for (label, roles) in map {
					let key = format!("policy.classification_policy.{label}");
					let classification: Classification =
						label.parse().map_err(|e| ConfigError::invalid(&key, e))?;
					let roles = roles
						.iter()
						.map(|r| r.parse::<Role>().map_err(|e| ConfigError::invalid(&key, e)))
						.collect::<Result<Vec<_>, _>>()?;
					resolved.insert(classification, roles);
				}
				resolved
			}
			None => defaults.classification_policy,
		};

		let mut policy = PolicyConfig {
			classification_policy,
			working_hours,
			attribute_policies: defaults.attribute_policies,
			allowed_locations: defaults.allowed_locations,
		};
		for layer in self.attribute_policies.unwrap_or_default() {
			policy.upsert_attribute_policy(resolve_attribute_policy(layer)?);
		}
		if let Some(locations) = self.allowed_locations {
			policy.allowed_locations = locations
				.into_iter()
				.map(|l| l.trim().to_string())
				.filter(|l| !l.is_empty())
				.collect();
		}
		Ok(policy)
	}
}

fn parse_window(key: &str, layer: &WorkingHoursLayer) -> Result<TimeWindow, ConfigError> {
	TimeWindow::parse(&layer.start, &layer.end).map_err(|e| ConfigError::invalid(key, e))
}

fn resolve_attribute_policy(layer: AttributePolicyLayer) -> Result<AttributePolicy, ConfigError> {
	let key = format!("policy.attribute_policies.{}", layer.name);
	if layer.name.trim().is_empty() {
		return Err(ConfigError::invalid(
			"policy.attribute_policies",
			"bundle name must not be empty",
		));
	}

	let role = layer
		.role
		.map(|r| r.parse::<Role>())
		.transpose()
		.map_err(|e| ConfigError::invalid(&key, e))?;
	let employment_status = layer
		.employment_status
		.map(|s| s.parse::<EmploymentStatus>())
		.transpose()
		.map_err(|e| ConfigError::invalid(&key, e))?;
	let time_window = layer
		.time_window
		.as_ref()
		.map(|w| parse_window(&key, w))
		.transpose()?;

	let mut policy = AttributePolicy::new(layer.name);
	policy.role = Constraint::from(role);
	policy.department = Constraint::from(layer.department);
	policy.location = Constraint::from(layer.location);
	policy.employment_status = Constraint::from(employment_status);
	policy.time_window = Constraint::from(time_window);
	Ok(policy)
}
