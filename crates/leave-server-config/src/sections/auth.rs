// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication configuration.

use leave_common_secret::SecretString;
use serde::Deserialize;

/// Signing key used when none is configured in development.
pub const DEV_TOKEN_SECRET: &str = "leave-server-development-signing-key-do-not-deploy";

/// Authentication configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct AuthConfig {
	pub environment: String,
	pub token_secret: Option<SecretString>,
	pub session_ttl_secs: u64,
	pub otp_ttl_secs: u64,
	pub lockout_threshold: u32,
	pub cookie_name: String,
	pub cookie_secure: bool,
	pub signups_disabled: bool,
}

impl AuthConfig {
	pub fn is_development(&self) -> bool {
		self.environment == "development"
	}

	/// The configured signing key, or the fixed development key when running
	/// in development without one. `None` only outside development, which
	/// validation rejects.
	pub fn signing_key(&self) -> Option<SecretString> {
		match &self.token_secret {
			Some(secret) => Some(secret.clone()),
			None if self.is_development() => Some(SecretString::new(DEV_TOKEN_SECRET.to_string())),
			None => None,
		}
	}
}

impl Default for AuthConfig {
	fn default() -> Self {
		AuthConfigLayer::default().finalize()
	}
}

/// Authentication configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfigLayer {
	#[serde(default)]
	pub environment: Option<String>,
	#[serde(default)]
	pub token_secret: Option<SecretString>,
	#[serde(default)]
	pub session_ttl_secs: Option<u64>,
	#[serde(default)]
	pub otp_ttl_secs: Option<u64>,
	#[serde(default)]
	pub lockout_threshold: Option<u32>,
	#[serde(default)]
	pub cookie_name: Option<String>,
	#[serde(default)]
	pub cookie_secure: Option<bool>,
	#[serde(default)]
	pub signups_disabled: Option<bool>,
}

impl AuthConfigLayer {
	pub fn merge(&mut self, other: AuthConfigLayer) {
		if other.environment.is_some() {
			self.environment = other.environment;
		}
		if other.token_secret.is_some() {
			self.token_secret = other.token_secret;
		}
		if other.session_ttl_secs.is_some() {
			self.session_ttl_secs = other.session_ttl_secs;
		}
		if other.otp_ttl_secs.is_some() {
			self.otp_ttl_secs = other.otp_ttl_secs;
		}
		if other.lockout_threshold.is_some() {
			self.lockout_threshold = other.lockout_threshold;
		}
		if other.cookie_name.is_some() {
			self.cookie_name = other.cookie_name;
		}
		if other.cookie_secure.is_some() {
			self.cookie_secure = other.cookie_secure;
		}
		if other.signups_disabled.is_some() {
			self.signups_disabled = other.signups_disabled;
		}
	}

	pub fn finalize(self) -> AuthConfig {
		let environment = self
			.environment
			.unwrap_or_else(|| "development".to_string());
		let cookie_secure = self.cookie_secure.unwrap_or(environment == "production");
		AuthConfig {
			environment,
			token_secret: self.token_secret,
			session_ttl_secs: self.session_ttl_secs.unwrap_or(3600),
			otp_ttl_secs: self.otp_ttl_secs.unwrap_or(180),
			lockout_threshold: self.lockout_threshold.unwrap_or(5),
			cookie_name: self.cookie_name.unwrap_or_else(|| "token".to_string()),
			cookie_secure,
			signups_disabled: self.signups_disabled.unwrap_or(false),
		}
	}
}
