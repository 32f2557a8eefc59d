// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Level;

use super::{AuditSink, AuditSinkError};
use crate::event::{AuditLogEntry, AuditSeverity};

/// Mirrors audit entries into the application log under the `leave_audit`
/// target.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
	pub fn new() -> Self {
		Self
	}
}

pub fn severity_to_level(severity: AuditSeverity) -> Level {
	match severity {
		AuditSeverity::Info | AuditSeverity::Notice => Level::INFO,
		AuditSeverity::Warning => Level::WARN,
		AuditSeverity::Error => Level::ERROR,
	}
}

macro_rules! emit {
	($level:ident, $event:expr) => {{
		let e = $event;
		let details = (!e.details.is_null()).then(|| e.details.to_string());
		tracing::$level!(
			target: "leave_audit",
			id = %e.id,
			event_type = %e.event_type,
			outcome = %e.outcome,
			actor_user_id = e.actor_user_id.map(|u| u.to_string()),
			resource_type = e.resource_type.as_deref(),
			resource_id = e.resource_id.as_deref(),
			ip_address = e.ip_address.as_deref(),
			details,
			"audit event"
		);
	}};
}

#[async_trait]
impl AuditSink for TracingAuditSink {
	fn name(&self) -> &str {
		"tracing"
	}

	async fn publish(&self, event: Arc<AuditLogEntry>) -> Result<(), AuditSinkError> {
		match severity_to_level(event.severity) {
			Level::WARN => emit!(warn, &*event),
			Level::ERROR => emit!(error, &*event),
			_ => emit!(info, &*event),
		}
		Ok(())
	}
}
