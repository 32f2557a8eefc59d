// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SMTP configuration section.

use leave_common_secret::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_PORT: u16 = 587;
const DEFAULT_FROM_NAME: &str = "Leave System";

/// Transport security for the SMTP connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
	/// Plaintext. Local relays and tests only.
	None,
	/// Upgrade a plaintext connection with STARTTLS.
	StartTls,
	/// Implicit TLS from the first byte.
	#[default]
	Tls,
}

impl TlsMode {
	pub fn from_str_value(value: &str) -> Option<Self> {
		match value.to_ascii_lowercase().as_str() {
			"none" | "plain" => Some(TlsMode::None),
			"starttls" => Some(TlsMode::StartTls),
			"tls" => Some(TlsMode::Tls),
			_ => None,
		}
	}
}

/// Resolved SMTP configuration. Present only when a relay is configured.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
	pub host: String,
	pub port: u16,
	pub username: Option<String>,
	pub password: Option<SecretString>,
	pub from_address: String,
	pub from_name: String,
	pub tls_mode: TlsMode,
	/// Recipients of "new leave request" notifications.
	pub approver_addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmtpConfigLayer {
	#[serde(default)]
	pub host: Option<String>,
	#[serde(default)]
	pub port: Option<u16>,
	#[serde(default)]
	pub username: Option<String>,
	#[serde(default)]
	pub password: Option<SecretString>,
	#[serde(default)]
	pub from_address: Option<String>,
	#[serde(default)]
	pub from_name: Option<String>,
	#[serde(default)]
	pub tls_mode: Option<TlsMode>,
	#[serde(default)]
	pub approver_addresses: Option<Vec<String>>,
}

impl SmtpConfigLayer {
	pub fn merge(&mut self, other: SmtpConfigLayer) {
		if other.host.is_some() {
			self.host = other.host;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
		if other.username.is_some() {
			self.username = other.username;
		}
		if other.password.is_some() {
			self.password = other.password;
		}
		if other.from_address.is_some() {
			self.from_address = other.from_address;
		}
		if other.from_name.is_some() {
			self.from_name = other.from_name;
		}
		if other.tls_mode.is_some() {
			self.tls_mode = other.tls_mode;
		}
		if other.approver_addresses.is_some() {
			self.approver_addresses = other.approver_addresses;
		}
	}

	/// Returns `None` when no host is set. A host without a sender address is
	/// an error.
	pub fn build(self) -> Result<Option<SmtpConfig>, ConfigError> {
		let Some(host) = self.host.filter(|h| !h.is_empty()) else {
			return Ok(None);
		};
		let from_address = self
			.from_address
			.filter(|a| !a.is_empty())
			.ok_or_else(|| {
				ConfigError::Validation("smtp.from_address is required when smtp.host is set".to_string())
			})?;

		Ok(Some(SmtpConfig {
			host,
			port: self.port.unwrap_or(DEFAULT_PORT),
			username: self.username,
			password: self.password,
			from_address,
			from_name: self
				.from_name
				.unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
			tls_mode: self.tls_mode.unwrap_or_default(),
			approver_addresses: self.approver_addresses.unwrap_or_default(),
		}))
	}
}
