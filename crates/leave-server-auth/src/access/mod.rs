// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access decision engine.
//!
//! - [`checks`]: the six pure predicates (RBAC, MAC, DAC, RuBAC-Time,
//!   RuBAC-Location, ABAC)
//! - [`chain`]: per-operation ordered composition
//! - [`policy`]: the read-only policy configuration
//! - [`types`]: decisions, time windows and resource snapshots
//!
//! The engine holds no state and performs no I/O. Share one
//! `Arc<PolicyConfig>` across request handlers.

pub mod chain;
pub mod checks;
pub mod policy;
pub mod types;

pub use chain::{AccessChain, AccessContext, AccessError, Check};
pub use checks::{abac, dac, mac, mac_expecting, rbac, rubac_location, rubac_time};
pub use policy::{AttributePolicy, Constraint, PolicyConfig, MANAGER_APPROVE_POLICY};
pub use types::{
	AccessModel, Decision, PolicyError, ResourceSnapshot, ResourceSnapshotStore, TimeOfDay,
	TimeWindow,
};
