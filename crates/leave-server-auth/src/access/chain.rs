// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ordered, fail-closed composition of access checks.
//!
//! Every protected operation declares its checks up front:
//!
//! ```
//! use leave_server_auth::access::AccessChain;
//!
//! let chain = AccessChain::new("leave.read").mac().dac();
//! assert_eq!(chain.len(), 2);
//! ```
//!
//! Checks run left to right and the first denial wins. There is no
//! disjunction: a route that lets some roles bypass a check branches before
//! it builds the chain.

use thiserror::Error;
use tracing::instrument;

use super::checks;
use super::policy::{AttributePolicy, PolicyConfig};
use super::types::{AccessModel, Decision, ResourceSnapshot, TimeOfDay, TimeWindow};
use crate::actor::Actor;
use crate::types::{Classification, Role};

/// A caller-side misuse of the chain. Never a policy outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
	#[error("{model} check requires a resource snapshot")]
	MissingResource { model: AccessModel },

	#[error("unknown attribute policy '{0}'")]
	UnknownAttributePolicy(String),
}

/// One step of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
	Rbac(Vec<Role>),
	Mac { expected: Option<Classification> },
	Dac,
	/// `window: None` means the configured working hours.
	RubacTime {
		window: Option<TimeWindow>,
		exempt: Vec<Role>,
	},
	/// `None` means the configured allowed locations.
	RubacLocation(Option<Vec<String>>),
	/// A bundle looked up by name in [`PolicyConfig::attribute_policies`].
	AbacNamed(String),
	AbacInline(AttributePolicy),
}

impl Check {
	pub fn model(&self) -> AccessModel {
		match self {
			Check::Rbac(_) => AccessModel::Rbac,
			Check::Mac { .. } => AccessModel::Mac,
			Check::Dac => AccessModel::Dac,
			Check::RubacTime { .. } => AccessModel::RubacTime,
			Check::RubacLocation(_) => AccessModel::RubacLocation,
			Check::AbacNamed(_) | Check::AbacInline(_) => AccessModel::Abac,
		}
	}

	fn evaluate(&self, ctx: &AccessContext<'_>) -> Result<Decision, AccessError> {
		let actor = ctx.actor;
		let decision = match self {
			Check::Rbac(roles) => checks::rbac(actor, roles),
			Check::Mac { expected } => {
				let resource = ctx.require_resource(AccessModel::Mac)?;
				match expected {
					Some(expected) => {
						checks::mac_expecting(actor, resource.classification, *expected, ctx.policy)
					}
					None => checks::mac(actor, resource.classification, ctx.policy),
				}
			}
			Check::Dac => checks::dac(actor, ctx.require_resource(AccessModel::Dac)?),
			Check::RubacTime { window, exempt } => {
				let window = window.as_ref().unwrap_or(&ctx.policy.working_hours);
				checks::rubac_time(actor, window, exempt, ctx.now)
			}
			Check::RubacLocation(allowed) => {
				let allowed = allowed.as_ref().unwrap_or(&ctx.policy.allowed_locations);
				checks::rubac_location(actor, allowed)
			}
			Check::AbacNamed(name) => {
				let bundle = ctx
					.policy
					.attribute_policy(name)
					.ok_or_else(|| AccessError::UnknownAttributePolicy(name.clone()))?;
				checks::abac(actor, bundle, ctx.now)
			}
			Check::AbacInline(bundle) => checks::abac(actor, bundle, ctx.now),
		};
		Ok(decision)
	}
}

/// Everything a chain reads. Borrowed for the duration of one decision.
#[derive(Debug, Clone, Copy)]
pub struct AccessContext<'a> {
	pub actor: &'a Actor,
	pub resource: Option<&'a ResourceSnapshot>,
	pub policy: &'a PolicyConfig,
	pub now: TimeOfDay,
}

impl<'a> AccessContext<'a> {
	pub fn new(actor: &'a Actor, policy: &'a PolicyConfig, now: TimeOfDay) -> Self {
		Self {
			actor,
			resource: None,
			policy,
			now,
		}
	}

	pub fn with_resource(mut self, resource: &'a ResourceSnapshot) -> Self {
		self.resource = Some(resource);
		self
	}

	fn require_resource(&self, model: AccessModel) -> Result<&'a ResourceSnapshot, AccessError> {
		self.resource.ok_or(AccessError::MissingResource { model })
	}
}

/// An operation name plus its ordered checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessChain {
	operation: &'static str,
	checks: Vec<Check>,
}

impl AccessChain {
	pub fn new(operation: &'static str) -> Self {
		Self {
			operation,
			checks: Vec::new(),
		}
	}

	pub fn operation(&self) -> &'static str {
		self.operation
	}

	pub fn checks(&self) -> &[Check] {
		&self.checks
	}

	pub fn len(&self) -> usize {
		self.checks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.checks.is_empty()
	}

	pub fn then(mut self, check: Check) -> Self {
		self.checks.push(check);
		self
	}

	pub fn rbac(self, roles: &[Role]) -> Self {
		self.then(Check::Rbac(roles.to_vec()))
	}

	pub fn mac(self) -> Self {
		self.then(Check::Mac { expected: None })
	}

	pub fn mac_expecting(self, expected: Classification) -> Self {
		self.then(Check::Mac {
			expected: Some(expected),
		})
	}

	pub fn dac(self) -> Self {
		self.then(Check::Dac)
	}

	/// RuBAC-Time against the configured working hours.
	pub fn working_hours(self, exempt: &[Role]) -> Self {
		self.then(Check::RubacTime {
			window: None,
			exempt: exempt.to_vec(),
		})
	}

	pub fn rubac_time(self, window: TimeWindow, exempt: &[Role]) -> Self {
		self.then(Check::RubacTime {
			window: Some(window),
			exempt: exempt.to_vec(),
		})
	}

	pub fn rubac_location<S: AsRef<str>>(self, allowed: &[S]) -> Self {
		self.then(Check::RubacLocation(Some(
			allowed.iter().map(|s| s.as_ref().to_string()).collect(),
		)))
	}

	/// RuBAC-Location against the configured allowed locations.
	pub fn configured_locations(self) -> Self {
		self.then(Check::RubacLocation(None))
	}

	pub fn abac(self, bundle_name: impl Into<String>) -> Self {
		self.then(Check::AbacNamed(bundle_name.into()))
	}

	pub fn abac_with(self, bundle: AttributePolicy) -> Self {
		self.then(Check::AbacInline(bundle))
	}

	/// Run the checks in order, returning the first denial or allow.
	///
	/// An empty chain allows.
	#[instrument(
		level = "debug",
		skip(self, ctx),
		fields(
			operation = self.operation,
			actor_id = %ctx.actor.id,
			role = %ctx.actor.role,
			resource_id = ctx.resource.map(|r| r.id.to_string()),
		)
	)]
	pub fn evaluate(&self, ctx: &AccessContext<'_>) -> Result<Decision, AccessError> {
		for check in &self.checks {
			let decision = check.evaluate(ctx)?;
			if !decision.allow {
				tracing::debug!(model = %check.model(), "access denied");
				return Ok(decision);
			}
		}
		tracing::debug!("access allowed");
		Ok(Decision::ALLOW)
	}
}
