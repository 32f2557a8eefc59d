// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Out-of-band delivery of one-time codes.

use async_trait::async_trait;
use thiserror::Error;

use crate::email::EmailTemplate;

#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Delivers a rendered message to a contact address.
///
/// Best effort. The pipeline spawns delivery and never waits for it.
#[async_trait]
pub trait Notifier: Send + Sync {
	async fn deliver(&self, contact: &str, message: &EmailTemplate) -> Result<(), NotifyError>;
}

/// Used when no mail transport is configured. Logs and drops the message.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
	async fn deliver(&self, contact: &str, message: &EmailTemplate) -> Result<(), NotifyError> {
		tracing::warn!(
			to = %contact,
			template = message.name(),
			"no mail transport configured, delivery skipped"
		);
		Ok(())
	}
}
