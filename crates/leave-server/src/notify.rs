// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Notification wiring.
//!
//! The login pipeline delivers codes in a detached task and only logs a
//! failure. [`AuditingNotifier`] wraps the real notifier so a lost one-time
//! code also leaves an `OTP_DELIVERY_FAILED` entry in the audit trail.

use async_trait::async_trait;
use leave_server_audit::{AuditEventType, AuditLogEntry, AuditService};
use leave_server_auth::{EmailTemplate, LogNotifier, Notifier, NotifyError};
use leave_server_config::{SmtpConfig, TlsMode};
use leave_server_email::EmailService;
use leave_server_smtp::{SmtpClient, SmtpError, SmtpSecurity};
use std::sync::Arc;

pub struct AuditingNotifier {
	inner: Arc<dyn Notifier>,
	audit: Arc<AuditService>,
}

impl AuditingNotifier {
	pub fn new(inner: Arc<dyn Notifier>, audit: Arc<AuditService>) -> Self {
		Self { inner, audit }
	}
}

#[async_trait]
impl Notifier for AuditingNotifier {
	async fn deliver(&self, contact: &str, message: &EmailTemplate) -> Result<(), NotifyError> {
		let result = self.inner.deliver(contact, message).await;
		if let Err(e) = &result {
			if matches!(message, EmailTemplate::Otp { .. }) {
				self.audit.log(
					AuditLogEntry::builder(AuditEventType::OtpDeliveryFailed)
						.failed()
						.detail("email", contact)
						.detail("error", e.to_string())
						.build(),
				);
			}
		}
		result
	}
}

/// Build the SMTP client from the server's `[smtp]` section.
pub fn initialize_smtp_client(config: &SmtpConfig) -> Result<SmtpClient, SmtpError> {
	let security = match config.tls_mode {
		TlsMode::None => SmtpSecurity::None,
		TlsMode::StartTls => SmtpSecurity::StartTls,
		TlsMode::Tls => SmtpSecurity::Tls,
	};
	SmtpClient::new(leave_server_smtp::SmtpConfig {
		host: config.host.clone(),
		port: config.port,
		username: config.username.clone(),
		password: config.password.clone(),
		from_address: config.from_address.clone(),
		from_name: config.from_name.clone(),
		security,
	})
}

/// The notifier for outgoing mail: SMTP when configured and valid, otherwise
/// one that only logs.
pub fn build_notifier(smtp: Option<&SmtpConfig>) -> (Arc<dyn Notifier>, Option<Arc<SmtpClient>>) {
	let Some(config) = smtp else {
		tracing::info!("SMTP not configured, notifications will be logged only");
		return (Arc::new(LogNotifier), None);
	};

	match initialize_smtp_client(config) {
		Ok(client) => {
			let client = Arc::new(client);
			let service = EmailService::new(client.clone());
			tracing::info!(host = %config.host, port = config.port, "SMTP client initialized");
			(Arc::new(service), Some(client))
		}
		Err(e) => {
			tracing::error!(error = %e, "failed to initialize SMTP client, notifications will be logged only");
			(Arc::new(LogNotifier), None)
		}
	}
}
