// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Async SMTP client for the leave server.
//!
//! Sends multipart (plain text + HTML) mail through a relay using [`lettre`]
//! on the tokio executor. The transport connects lazily, so building a client
//! never touches the network.
//!
//! ```no_run
//! use leave_server_smtp::{SmtpClient, SmtpConfig, SmtpSecurity};
//!
//! # async fn example() -> Result<(), leave_server_smtp::SmtpError> {
//! let client = SmtpClient::new(SmtpConfig {
//!     host: "smtp.example.com".to_string(),
//!     port: 465,
//!     username: None,
//!     password: None,
//!     from_address: "leave@example.com".to_string(),
//!     from_name: "Leave System".to_string(),
//!     security: SmtpSecurity::Tls,
//! })?;
//! client
//!     .send_email("hr@example.com", "Hello", "<p>Hello</p>", "Hello")
//!     .await?;
//! # Ok(())
//! # }
//! ```

use leave_common_secret::SecretString;
use lettre::{
	message::{header::ContentType, Mailbox, MultiPart, SinglePart},
	transport::smtp::authentication::Credentials,
	AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmtpError {
	#[error("SMTP connection failed: {0}")]
	Connection(String),

	#[error("failed to send email: {0}")]
	Send(String),

	#[error("invalid email address: {0}")]
	Address(String),
}

/// How the connection to the relay is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
	/// Plaintext. Only for local relays such as a test catcher.
	None,
	StartTls,
	/// Implicit TLS (SMTPS).
	#[default]
	Tls,
}

/// Connection and sender settings.
///
/// `password` is a [`SecretString`] so `Debug` output of the config never
/// carries the credential.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
	pub host: String,
	pub port: u16,
	pub username: Option<String>,
	pub password: Option<SecretString>,
	pub from_address: String,
	pub from_name: String,
	#[serde(default)]
	pub security: SmtpSecurity,
}

pub struct SmtpClient {
	transport: AsyncSmtpTransport<Tokio1Executor>,
	from_mailbox: Mailbox,
}

impl SmtpClient {
	/// Validate the sender and build the transport.
	///
	/// # Errors
	///
	/// [`SmtpError::Address`] if the sender does not parse as a mailbox,
	/// [`SmtpError::Connection`] if the TLS parameters for `host` cannot be
	/// built.
	#[tracing::instrument(
		name = "smtp_client_new",
		skip(config),
		fields(host = %config.host, port = config.port, security = ?config.security)
	)]
	pub fn new(config: SmtpConfig) -> Result<Self, SmtpError> {
		let from_mailbox = sender_mailbox(&config.from_name, &config.from_address)?;

		let builder = match config.security {
			SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
				.map_err(|e| SmtpError::Connection(e.to_string()))?,
			SmtpSecurity::StartTls => {
				AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
					.map_err(|e| SmtpError::Connection(e.to_string()))?
			}
			SmtpSecurity::None => {
				AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
			}
		};
		let mut builder = builder.port(config.port);

		if let (Some(username), Some(password)) = (config.username, config.password.as_ref()) {
			builder = builder.credentials(Credentials::new(username, password.expose().clone()));
		}

		tracing::debug!("SMTP client initialized");

		Ok(Self {
			transport: builder.build(),
			from_mailbox,
		})
	}

	/// Open a connection and issue NOOP. Used by the health endpoint.
	#[tracing::instrument(name = "smtp_check_health", skip(self))]
	pub async fn check_health(&self) -> Result<(), SmtpError> {
		let ok = self
			.transport
			.test_connection()
			.await
			.map_err(|e| SmtpError::Connection(e.to_string()))?;
		if ok {
			Ok(())
		} else {
			Err(SmtpError::Connection("relay did not accept NOOP".to_string()))
		}
	}

	/// Send one multipart message.
	#[tracing::instrument(
		name = "smtp_send_email",
		skip(self, body_html, body_text),
		fields(to = %to, subject = %subject)
	)]
	pub async fn send_email(
		&self,
		to: &str,
		subject: &str,
		body_html: &str,
		body_text: &str,
	) -> Result<(), SmtpError> {
		let message = build_message(&self.from_mailbox, to, subject, body_html, body_text)?;

		self
			.transport
			.send(message)
			.await
			.map_err(|e| SmtpError::Send(e.to_string()))?;

		tracing::info!("email sent");
		Ok(())
	}
}

fn sender_mailbox(name: &str, address: &str) -> Result<Mailbox, SmtpError> {
	let address = address
		.parse()
		.map_err(|e| SmtpError::Address(format!("{address}: {e}")))?;
	let name = Some(name.trim().to_string()).filter(|n| !n.is_empty());
	Ok(Mailbox::new(name, address))
}

fn build_message(
	from: &Mailbox,
	to: &str,
	subject: &str,
	body_html: &str,
	body_text: &str,
) -> Result<Message, SmtpError> {
	let to_mailbox: Mailbox = to
		.parse()
		.map_err(|e| SmtpError::Address(format!("{to}: {e}")))?;

	Message::builder()
		.from(from.clone())
		.to(to_mailbox)
		.subject(subject)
		.multipart(
			MultiPart::alternative()
				.singlepart(
					SinglePart::builder()
						.header(ContentType::TEXT_PLAIN)
						.body(body_text.to_string()),
				)
				.singlepart(
					SinglePart::builder()
						.header(ContentType::TEXT_HTML)
						.body(body_html.to_string()),
				),
		)
		.map_err(|e| SmtpError::Send(format!("failed to build message: {e}")))
}

/// True if `email` parses as a mailbox, with or without a display name.
pub fn is_valid_email(email: &str) -> bool {
	email.parse::<Mailbox>().is_ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn config(security: SmtpSecurity) -> SmtpConfig {
		SmtpConfig {
			host: "smtp.example.com".to_string(),
			port: 2525,
			username: Some("mailer".to_string()),
			password: Some(SecretString::new("relay-password".to_string())),
			from_address: "leave@example.com".to_string(),
			from_name: "Leave System".to_string(),
			security,
		}
	}

	mod client {
		use super::*;

		#[test]
		fn builds_plaintext_client_without_connecting() {
			assert!(SmtpClient::new(config(SmtpSecurity::None)).is_ok());
		}

		#[test]
		fn rejects_bad_sender() {
			let mut cfg = config(SmtpSecurity::None);
			cfg.from_address = "not-an-address".to_string();
			assert!(matches!(SmtpClient::new(cfg), Err(SmtpError::Address(_))));
		}

		#[test]
		fn debug_hides_password() {
			let debug = format!("{:?}", config(SmtpSecurity::Tls));
			assert!(!debug.contains("relay-password"));
			assert!(debug.contains("[REDACTED]"));
		}

		#[test]
		fn config_deserializes_with_default_security() {
			let cfg: SmtpConfig = serde_json::from_value(serde_json::json!({
				"host": "localhost",
				"port": 1025,
				"username": null,
				"password": null,
				"from_address": "leave@example.com",
				"from_name": "Leave System"
			}))
			.unwrap();
			assert_eq!(cfg.security, SmtpSecurity::Tls);

			let mode: SmtpSecurity = serde_json::from_str("\"starttls\"").unwrap();
			assert_eq!(mode, SmtpSecurity::StartTls);
		}
	}

	mod message {
		use super::*;

		#[test]
		fn multipart_carries_both_bodies() {
			let from = sender_mailbox("Leave System", "leave@example.com").unwrap();
			let message = build_message(
				&from,
				"hr@example.com",
				"New Leave Request from Ana",
				"<p>html body</p>",
				"text body",
			)
			.unwrap();
			let raw = String::from_utf8(message.formatted()).unwrap();

			assert!(raw.contains("Subject: New Leave Request from Ana"));
			assert!(raw.contains("To: hr@example.com"));
			assert!(raw.contains("Leave System"));
			assert!(raw.contains("multipart/alternative"));
			assert!(raw.contains("text body"));
			assert!(raw.contains("<p>html body</p>"));
		}

		#[test]
		fn bad_recipient_is_address_error() {
			let from = sender_mailbox("", "leave@example.com").unwrap();
			let result = build_message(&from, "nobody", "s", "h", "t");
			assert!(matches!(result, Err(SmtpError::Address(_))));
		}

		#[test]
		fn blank_display_name_is_dropped() {
			let from = sender_mailbox("  ", "leave@example.com").unwrap();
			assert!(from.name.is_none());
		}
	}

	mod property_tests {
		use super::*;
		use proptest::prelude::*;

		proptest! {
			#[test]
			fn simple_addresses_are_valid(
				local in "[a-z][a-z0-9]{0,20}",
				domain in "[a-z][a-z0-9]{0,15}",
				tld in "(com|org|net|io)"
			) {
				let email = format!("{local}@{domain}.{tld}");
				prop_assert!(is_valid_email(&email));
			}

			#[test]
			fn missing_at_is_invalid(s in "[a-zA-Z0-9._-]{1,40}") {
				prop_assert!(!is_valid_email(&s));
			}
		}
	}
}
