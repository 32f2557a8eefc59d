// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the leave server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation, including the access policy
//! - Consistent environment variable naming (`LEAVE_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use leave_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Server listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{
	load_secret_env, ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource,
};

use leave_server_auth::PolicyConfig;
use tracing::{debug, info, warn};

/// Minimum signing key length outside development.
pub const MIN_TOKEN_SECRET_BYTES: usize = 32;

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub auth: AuthConfig,
	pub policy: PolicyConfig,
	pub smtp: Option<SmtpConfig>,
	pub backup: BackupConfig,
	pub logging: LoggingConfig,
	pub audit: AuditConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`LEAVE_SERVER_*`)
/// 2. Config file (`/etc/leave/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	let mut merged = ServerConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let auth = layer.auth.unwrap_or_default().finalize();
	let policy = layer.policy.unwrap_or_default().finalize()?;
	let backup = layer.backup.unwrap_or_default().finalize()?;
	let logging = layer.logging.unwrap_or_default().finalize();
	let audit = layer.audit.unwrap_or_default().finalize();

	let smtp = match layer.smtp {
		Some(l) => l.build()?,
		None => None,
	};

	validate_config(&auth)?;

	if auth.token_secret.is_none() {
		warn!("no token secret configured, using the development signing key");
	}

	info!(
		host = %http.host,
		port = http.port,
		database = %database.url,
		environment = %auth.environment,
		working_hours = %policy.working_hours,
		attribute_policies = policy.attribute_policies.len(),
		smtp_configured = smtp.is_some(),
		backup_enabled = backup.enabled,
		audit_enabled = audit.enabled,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		http,
		database,
		auth,
		policy,
		smtp,
		backup,
		logging,
		audit,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(auth: &AuthConfig) -> Result<(), ConfigError> {
	if auth.lockout_threshold == 0 {
		return Err(ConfigError::Validation(
			"lockout_threshold must be at least 1".to_string(),
		));
	}
	if auth.session_ttl_secs == 0 || auth.otp_ttl_secs == 0 {
		return Err(ConfigError::Validation(
			"session_ttl_secs and otp_ttl_secs must be positive".to_string(),
		));
	}

	if auth.is_development() {
		return Ok(());
	}

	match &auth.token_secret {
		None => Err(ConfigError::Validation(format!(
			"LEAVE_SERVER_TOKEN_SECRET is required when LEAVE_SERVER_ENV={}",
			auth.environment
		))),
		Some(secret) if secret.len() < MIN_TOKEN_SECRET_BYTES => Err(ConfigError::Validation(
			format!(
				"LEAVE_SERVER_TOKEN_SECRET must be at least {MIN_TOKEN_SECRET_BYTES} bytes outside development"
			),
		)),
		Some(_) => Ok(()),
	}
}
