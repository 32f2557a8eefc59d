// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The six access checks.
//!
//! Each check is a pure function of its inputs and returns a [`Decision`].
//! None of them touch storage, the clock or the logger; callers supply the
//! current time and resource snapshot. Composition lives in
//! [`AccessChain`](super::AccessChain).

use super::policy::{AttributePolicy, Constraint, PolicyConfig};
use super::types::{AccessModel, Decision, ResourceSnapshot, TimeOfDay, TimeWindow};
use crate::actor::Actor;
use crate::types::{Classification, Role};

/// Role membership. An empty `allowed_roles` admits everyone.
pub fn rbac(actor: &Actor, allowed_roles: &[Role]) -> Decision {
	Decision::from_bool(
		allowed_roles.is_empty() || actor.has_any_role(allowed_roles),
		AccessModel::Rbac,
	)
}

/// Classification clearance: the actor's role must be listed for the
/// resource's classification. Unlisted classifications deny every role.
pub fn mac(actor: &Actor, classification: Classification, policy: &PolicyConfig) -> Decision {
	Decision::from_bool(
		actor.has_any_role(policy.allowed_roles(classification)),
		AccessModel::Mac,
	)
}

/// [`mac`], but first deny if the resource is not classified `expected`.
pub fn mac_expecting(
	actor: &Actor,
	classification: Classification,
	expected: Classification,
	policy: &PolicyConfig,
) -> Decision {
	if classification != expected {
		return Decision::deny(AccessModel::Mac);
	}
	mac(actor, classification, policy)
}

/// Ownership or explicit delegation.
pub fn dac(actor: &Actor, resource: &ResourceSnapshot) -> Decision {
	Decision::from_bool(
		actor.id == resource.owner || resource.delegated_access().contains(&actor.id),
		AccessModel::Dac,
	)
}

/// Time-of-day rule. Exempt roles always pass.
pub fn rubac_time(
	actor: &Actor,
	window: &TimeWindow,
	exempt_roles: &[Role],
	now: TimeOfDay,
) -> Decision {
	Decision::from_bool(
		actor.has_any_role(exempt_roles) || window.contains(now),
		AccessModel::RubacTime,
	)
}

/// Location rule. An empty list admits everyone; otherwise an actor with no
/// recorded location is denied.
pub fn rubac_location(actor: &Actor, allowed_locations: &[String]) -> Decision {
	let allowed = allowed_locations.is_empty()
		|| actor
			.location
			.as_ref()
			.is_some_and(|loc| allowed_locations.contains(loc));
	Decision::from_bool(allowed, AccessModel::RubacLocation)
}

/// Attribute bundle: every `Equals` constraint must hold.
pub fn abac(actor: &Actor, bundle: &AttributePolicy, now: TimeOfDay) -> Decision {
	let time_ok = match &bundle.time_window {
		Constraint::Any => true,
		Constraint::Equals(window) => window.contains(now),
	};
	let allowed = bundle.role.admits(&actor.role)
		&& bundle.department.admits_opt(actor.department.as_ref())
		&& bundle.location.admits_opt(actor.location.as_ref())
		&& bundle.employment_status.admits(&actor.employment_status)
		&& time_ok;
	Decision::from_bool(allowed, AccessModel::Abac)
}
