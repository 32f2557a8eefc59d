// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Email dispatch for the leave server.
//!
//! [`EmailService`] renders an [`EmailTemplate`] and hands the result to a
//! [`MailTransport`], normally the SMTP client. It implements the auth
//! crate's [`Notifier`], so the login pipeline and the leave handlers share
//! one delivery path.

use std::sync::Arc;

use async_trait::async_trait;
use leave_server_auth::{render_email, EmailTemplate, Notifier, NotifyError};
use leave_server_smtp::{SmtpClient, SmtpError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmailError {
	#[error(transparent)]
	Smtp(#[from] SmtpError),

	#[error("no recipients")]
	NoRecipients,
}

/// Something that can put a rendered message on the wire.
#[async_trait]
pub trait MailTransport: Send + Sync {
	async fn send(&self, to: &str, subject: &str, html: &str, text: &str) -> Result<(), SmtpError>;
}

#[async_trait]
impl MailTransport for SmtpClient {
	async fn send(&self, to: &str, subject: &str, html: &str, text: &str) -> Result<(), SmtpError> {
		self.send_email(to, subject, html, text).await
	}
}

#[derive(Clone)]
pub struct EmailService {
	transport: Arc<dyn MailTransport>,
}

impl EmailService {
	pub fn new(transport: Arc<dyn MailTransport>) -> Self {
		Self { transport }
	}

	pub fn from_smtp(client: SmtpClient) -> Self {
		Self::new(Arc::new(client))
	}

	#[tracing::instrument(skip(self, template), fields(template = template.name()))]
	pub async fn send(&self, to: &str, template: &EmailTemplate) -> Result<(), EmailError> {
		let rendered = render_email(template);
		self
			.transport
			.send(to, &rendered.subject, &rendered.html, &rendered.text)
			.await?;
		Ok(())
	}
}

#[async_trait]
impl Notifier for EmailService {
	async fn deliver(&self, contact: &str, message: &EmailTemplate) -> Result<(), NotifyError> {
		self
			.send(contact, message)
			.await
			.map_err(|e| NotifyError(e.to_string()))
	}
}

/// Deliver `template` to every address in `recipients`.
///
/// A failure for one recipient does not stop the rest. Returns the number
/// delivered, or [`EmailError::NoRecipients`] when the list is empty.
#[tracing::instrument(skip(notifier, recipients, template), fields(template = template.name(), recipients = recipients.len()))]
pub async fn deliver_to_all(
	notifier: &dyn Notifier,
	recipients: &[String],
	template: &EmailTemplate,
) -> Result<usize, EmailError> {
	if recipients.is_empty() {
		return Err(EmailError::NoRecipients);
	}

	let mut delivered = 0;
	for to in recipients {
		match notifier.deliver(to, template).await {
			Ok(()) => delivered += 1,
			Err(e) => tracing::warn!(to = %to, error = %e, "notification not delivered"),
		}
	}
	Ok(delivered)
}
