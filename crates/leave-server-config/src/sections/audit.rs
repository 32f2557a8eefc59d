// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit pipeline configuration.

use serde::Deserialize;

fn default_queue_capacity() -> usize {
	10_000
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfigLayer {
	#[serde(default)]
	pub enabled: Option<bool>,
	#[serde(default)]
	pub queue_capacity: Option<usize>,
	/// Mirror every audit event to the tracing log as well as the database.
	#[serde(default)]
	pub log_to_tracing: Option<bool>,
}

impl AuditConfigLayer {
	pub fn merge(&mut self, other: AuditConfigLayer) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.queue_capacity.is_some() {
			self.queue_capacity = other.queue_capacity;
		}
		if other.log_to_tracing.is_some() {
			self.log_to_tracing = other.log_to_tracing;
		}
	}

	pub fn finalize(self) -> AuditConfig {
		AuditConfig {
			enabled: self.enabled.unwrap_or(true),
			queue_capacity: self.queue_capacity.unwrap_or_else(default_queue_capacity),
			log_to_tracing: self.log_to_tracing.unwrap_or(true),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
	pub enabled: bool,
	pub queue_capacity: usize,
	pub log_to_tracing: bool,
}

impl Default for AuditConfig {
	fn default() -> Self {
		AuditConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = AuditConfig::default();
		assert!(config.enabled);
		assert_eq!(config.queue_capacity, 10_000);
		assert!(config.log_to_tracing);
	}
}
