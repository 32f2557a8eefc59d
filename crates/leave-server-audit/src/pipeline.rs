// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use leave_common_secret::REDACTED;
use tokio::sync::mpsc::{self, error::SendError};
use tracing::{instrument, warn};

use crate::event::AuditLogEntry;
use crate::sink::AuditSink;

/// Detail keys whose values never reach a sink.
const SECRET_KEYS: &[&str] = &["password", "otp", "code", "token", "secret"];

/// Replaces the value of any secret-looking key, at any depth.
fn redact_details(value: &mut serde_json::Value) {
	match value {
		serde_json::Value::Object(map) => {
			for (key, v) in map.iter_mut() {
				let lower = key.to_ascii_lowercase();
				if SECRET_KEYS.iter().any(|s| lower.contains(s)) {
					*v = serde_json::Value::String(REDACTED.to_string());
				} else {
					redact_details(v);
				}
			}
		}
		serde_json::Value::Array(items) => items.iter_mut().for_each(redact_details),
		_ => {}
	}
}

/// Fire-and-forget audit queue.
///
/// `log` never waits: entries go onto a bounded channel and a background task
/// publishes each one to every sink. A full queue drops the entry.
pub struct AuditService {
	tx: mpsc::Sender<AuditLogEntry>,
}

impl AuditService {
	/// Must be called from within a tokio runtime.
	pub fn new(queue_capacity: usize, sinks: Vec<Arc<dyn AuditSink>>) -> Self {
		let (tx, rx) = mpsc::channel(queue_capacity.max(1));

		tokio::spawn(Self::background_task(rx, sinks));

		Self { tx }
	}

	/// A service with no sinks. Entries are accepted and discarded.
	pub fn disabled() -> Self {
		Self::new(1, Vec::new())
	}

	async fn background_task(
		mut rx: mpsc::Receiver<AuditLogEntry>,
		sinks: Vec<Arc<dyn AuditSink>>,
	) {
		while let Some(mut entry) = rx.recv().await {
			redact_details(&mut entry.details);

			let event = Arc::new(entry);

			for sink in &sinks {
				let sink = Arc::clone(sink);
				let event = Arc::clone(&event);

				tokio::spawn(async move {
					if let Err(e) = sink.publish(event).await {
						warn!(sink = sink.name(), error = %e, "audit sink publish failed");
					}
				});
			}
		}
	}

	/// Queue an audit entry.
	///
	/// Returns `true` if the entry was queued, `false` if it was dropped
	/// because the queue is full or the background task has stopped.
	#[instrument(skip(self, entry), fields(event_type = %entry.event_type, outcome = %entry.outcome))]
	pub fn log(&self, entry: AuditLogEntry) -> bool {
		match self.tx.try_send(entry) {
			Ok(()) => true,
			Err(e) => {
				warn!(error = %e, "audit entry dropped");
				false
			}
		}
	}

	/// Queue an entry, waiting for capacity.
	pub async fn log_blocking(&self, entry: AuditLogEntry) -> Result<(), SendError<AuditLogEntry>> {
		self.tx.send(entry).await
	}
}
