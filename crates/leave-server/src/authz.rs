// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Handler-level authorization.
//!
//! Handlers build an [`AccessChain`] for their operation and call
//! [`authorize`]. A denial is logged, written to the audit trail as
//! `ACCESS_DENIED` with the refusing model, and returned as a 403.

use leave_server_audit::{AuditEventType, AuditLogEntry, AuditOutcome};
use leave_server_auth::{
	AccessChain, AccessContext, AccessModel, ResourceSnapshot, Role, TimeOfDay,
	MANAGER_APPROVE_POLICY,
};

use crate::{
	api::AppState, auth_middleware::CurrentUser, client_info::ClientInfo, error::ServerError,
};

/// Longest request, in days, a manager may approve on their own.
pub const MANAGER_APPROVAL_MAX_DAYS: i64 = 10;

/// Named chains for each protected operation.
pub mod chains {
	use super::*;

	pub fn create_leave() -> AccessChain {
		AccessChain::new("leave.create")
			.working_hours(&[Role::Admin])
			.configured_locations()
	}

	pub fn read_leave() -> AccessChain {
		AccessChain::new("leave.read").mac().dac()
	}

	/// Delegates may read a request but only the owner edits it; callers pass
	/// [`ResourceSnapshot::owner_only`].
	pub fn edit_leave() -> AccessChain {
		AccessChain::new("leave.update").dac()
	}

	pub fn share_leave() -> AccessChain {
		AccessChain::new("leave.access").dac()
	}

	pub fn approve_leave() -> AccessChain {
		AccessChain::new("leave.approve").rbac(&[Role::Hr, Role::Admin])
	}

	pub fn reject_leave() -> AccessChain {
		AccessChain::new("leave.reject").rbac(&[Role::Manager, Role::Hr, Role::Admin])
	}

	/// Resolves the `manager_approve` attribute bundle from the policy
	/// configuration when evaluated.
	pub fn manager_approve_leave() -> AccessChain {
		AccessChain::new("leave.manager_approve").abac(MANAGER_APPROVE_POLICY)
	}

	pub fn classify_leave() -> AccessChain {
		AccessChain::new("leave.classify").rbac(&[Role::Hr, Role::Admin])
	}

	pub fn administer() -> AccessChain {
		AccessChain::new("admin").rbac(&[Role::Admin])
	}
}

/// HR and administrators read every request without the MAC/DAC chain.
pub fn bypasses_read_checks(user: &CurrentUser) -> bool {
	user.actor.has_any_role(&[Role::Hr, Role::Admin])
}

/// Evaluate `chain` for `user` at the current local time.
#[tracing::instrument(
	skip(state, user, chain, resource, client),
	fields(operation = chain.operation(), user_id = %user.actor.id)
)]
pub fn authorize(
	state: &AppState,
	user: &CurrentUser,
	chain: &AccessChain,
	resource: Option<&ResourceSnapshot>,
	client: &ClientInfo,
) -> Result<(), ServerError> {
	let now = TimeOfDay::from(state.clock.local_time());
	let mut ctx = AccessContext::new(&user.actor, &state.policy, now);
	if let Some(resource) = resource {
		ctx = ctx.with_resource(resource);
	}

	let decision = chain.evaluate(&ctx)?;
	if decision.allow {
		return Ok(());
	}

	let model = decision.reason.unwrap_or(AccessModel::Rbac);
	Err(deny(
		state,
		user,
		chain.operation(),
		model,
		"Access denied",
		resource,
		client,
	))
}

/// Record a refusal and build the 403 for it.
pub fn deny(
	state: &AppState,
	user: &CurrentUser,
	operation: &str,
	model: AccessModel,
	message: &str,
	resource: Option<&ResourceSnapshot>,
	client: &ClientInfo,
) -> ServerError {
	tracing::warn!(
		operation,
		model = %model,
		user_id = %user.actor.id,
		role = %user.actor.role,
		"access denied"
	);

	let mut entry = AuditLogEntry::builder(AuditEventType::AccessDenied)
		.denied_by(model)
		.actor(user.actor.id)
		.detail("operation", operation)
		.detail("role", user.actor.role.as_str());
	if let Some(resource) = resource {
		entry = entry.resource("leave_request", resource.id.to_string());
	}
	state.audit.log(client.apply(entry).build());

	ServerError::AccessDenied {
		model,
		message: message.to_string(),
	}
}

/// Record a refusal by a business rule that is not one of the access models.
pub fn deny_rule(
	state: &AppState,
	user: &CurrentUser,
	operation: &str,
	rule: &str,
	message: &str,
	resource: &ResourceSnapshot,
	client: &ClientInfo,
) -> ServerError {
	tracing::warn!(operation, rule, user_id = %user.actor.id, "request refused by rule");

	let entry = AuditLogEntry::builder(AuditEventType::AccessDenied)
		.outcome(AuditOutcome::Denied)
		.actor(user.actor.id)
		.resource("leave_request", resource.id.to_string())
		.detail("operation", operation)
		.detail("rule", rule);
	state.audit.log(client.apply(entry).build());

	ServerError::Forbidden(message.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn chains_are_ordered_as_declared() {
		let read = chains::read_leave();
		let models: Vec<_> = read.checks().iter().map(|c| c.model()).collect();
		assert_eq!(models, vec![AccessModel::Mac, AccessModel::Dac]);
	}

	#[test]
	fn manager_approval_uses_the_configured_bundle() {
		use leave_server_auth::{
			access::Check, Actor, AttributePolicy, PolicyConfig, TimeWindow, UserId,
		};

		let chain = chains::manager_approve_leave();
		assert_eq!(
			chain.checks(),
			&[Check::AbacNamed(MANAGER_APPROVE_POLICY.to_string())]
		);

		let manager = Actor::new(UserId::generate(), Role::Manager);
		let evening = TimeOfDay::from_hm(19, 0).unwrap();
		let mut policy = PolicyConfig::default();
		let decide = |policy: &PolicyConfig| {
			chain
				.evaluate(&AccessContext::new(&manager, policy, evening))
				.unwrap()
				.allow
		};
		assert!(!decide(&policy));

		policy.upsert_attribute_policy(
			AttributePolicy::new(MANAGER_APPROVE_POLICY)
				.role(Role::Manager)
				.time_window(TimeWindow::parse("12:00", "20:00").unwrap()),
		);
		assert!(decide(&policy));
	}

	#[test]
	fn leave_creation_honours_configured_locations() {
		use leave_server_auth::{Actor, PolicyConfig, UserId};

		let mut policy = PolicyConfig::default();
		policy.allowed_locations = vec!["Lagos".to_string()];
		let ten = TimeOfDay::from_hm(10, 0).unwrap();

		let mut remote = Actor::new(UserId::generate(), Role::Employee);
		remote.location = Some("Accra".to_string());
		let decision = chains::create_leave()
			.evaluate(&AccessContext::new(&remote, &policy, ten))
			.unwrap();
		assert_eq!(decision.reason, Some(AccessModel::RubacLocation));

		policy.allowed_locations.clear();
		let decision = chains::create_leave()
			.evaluate(&AccessContext::new(&remote, &policy, ten))
			.unwrap();
		assert!(decision.allow);
	}

	#[test]
	fn every_chain_names_its_operation() {
		for chain in [
			chains::create_leave(),
			chains::read_leave(),
			chains::edit_leave(),
			chains::share_leave(),
			chains::approve_leave(),
			chains::reject_leave(),
			chains::manager_approve_leave(),
			chains::classify_leave(),
			chains::administer(),
		] {
			assert!(!chain.is_empty());
			assert!(!chain.operation().is_empty());
		}
	}
}
