// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use leave_common_secret::SecretString;
use leave_server_auth::TimeWindow;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	AuditConfigLayer, AuthConfigLayer, BackupConfigLayer, DatabaseConfigLayer, HttpConfigLayer,
	LogFormat, LoggingConfigLayer, PolicyConfigLayer, SmtpConfigLayer, TlsMode, WorkingHoursLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/leave/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: LEAVE_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			http: Some(load_http_from_env()?),
			database: Some(load_database_from_env()?),
			auth: Some(load_auth_from_env()?),
			policy: Some(load_policy_from_env()),
			smtp: Some(load_smtp_from_env()?),
			backup: Some(load_backup_from_env()),
			logging: Some(load_logging_from_env()?),
			audit: Some(load_audit_from_env()?),
		})
	}
}

/// Read a secret from `NAME`, or from the file named by `NAME_FILE`.
///
/// The file form is preferred when both are set, so mounted secrets win over
/// a stale variable. Trailing newlines in the file are trimmed.
pub fn load_secret_env(name: &str) -> Result<Option<SecretString>, ConfigError> {
	let file_var = format!("{name}_FILE");
	if let Some(path) = env_var(&file_var) {
		let content = std::fs::read_to_string(&path)
			.map_err(|e| ConfigError::Secret(format!("{file_var}={path}: {e}")))?;
		let value = content.trim_end_matches(['\r', '\n']).to_string();
		if value.is_empty() {
			return Err(ConfigError::Secret(format!("{file_var}={path}: file is empty")));
		}
		return Ok(Some(SecretString::new(value)));
	}
	Ok(env_var(name).map(SecretString::new))
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Comma-separated list; blank entries are dropped.
fn env_list(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|v| {
		v.split(',')
			.map(str::trim)
			.filter(|s| !s.is_empty())
			.map(String::from)
			.collect()
	})
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_u16(name: &str) -> Result<Option<u16>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u16 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u32 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid usize value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_http_from_env() -> Result<HttpConfigLayer, ConfigError> {
	Ok(HttpConfigLayer {
		host: env_var("LEAVE_SERVER_HOST"),
		port: env_u16("LEAVE_SERVER_PORT")?,
		base_url: env_var("LEAVE_SERVER_BASE_URL"),
		cors_origin: env_var("LEAVE_SERVER_CORS_ORIGIN"),
	})
}

fn load_database_from_env() -> Result<DatabaseConfigLayer, ConfigError> {
	Ok(DatabaseConfigLayer {
		url: env_var("LEAVE_SERVER_DATABASE_URL"),
	})
}

fn load_auth_from_env() -> Result<AuthConfigLayer, ConfigError> {
	Ok(AuthConfigLayer {
		environment: env_var("LEAVE_SERVER_ENV"),
		token_secret: load_secret_env("LEAVE_SERVER_TOKEN_SECRET")?,
		session_ttl_secs: env_u64("LEAVE_SERVER_SESSION_TTL_SECS")?,
		otp_ttl_secs: env_u64("LEAVE_SERVER_OTP_TTL_SECS")?,
		lockout_threshold: env_u32("LEAVE_SERVER_LOCKOUT_THRESHOLD")?,
		cookie_name: env_var("LEAVE_SERVER_COOKIE_NAME"),
		cookie_secure: env_bool("LEAVE_SERVER_COOKIE_SECURE"),
		signups_disabled: env_bool("LEAVE_SERVER_SIGNUPS_DISABLED"),
	})
}

/// Working hours and allowed locations are settable from the environment;
/// the role tables and attribute bundles live in the config file.
fn load_policy_from_env() -> PolicyConfigLayer {
	let start = env_var("LEAVE_SERVER_WORK_START");
	let end = env_var("LEAVE_SERVER_WORK_END");
	let working_hours = if start.is_some() || end.is_some() {
		let office = TimeWindow::OFFICE_HOURS;
		Some(WorkingHoursLayer {
			start: start.unwrap_or_else(|| office.start().to_string()),
			end: end.unwrap_or_else(|| office.end().to_string()),
		})
	} else {
		None
	};

	PolicyConfigLayer {
		working_hours,
		allowed_locations: env_list("LEAVE_SERVER_ALLOWED_LOCATIONS"),
		..Default::default()
	}
}

fn load_smtp_from_env() -> Result<SmtpConfigLayer, ConfigError> {
	let tls_mode = match env_var("LEAVE_SERVER_SMTP_TLS_MODE") {
		Some(v) => Some(TlsMode::from_str_value(&v).ok_or_else(|| ConfigError::InvalidValue {
			key: "LEAVE_SERVER_SMTP_TLS_MODE".to_string(),
			message: format!("expected none, starttls or tls, got '{v}'"),
		})?),
		None => None,
	};

	let approver_addresses = env_list("LEAVE_SERVER_SMTP_APPROVERS");

	Ok(SmtpConfigLayer {
		host: env_var("LEAVE_SERVER_SMTP_HOST"),
		port: env_u16("LEAVE_SERVER_SMTP_PORT")?,
		username: env_var("LEAVE_SERVER_SMTP_USERNAME"),
		password: load_secret_env("LEAVE_SERVER_SMTP_PASSWORD")?,
		from_address: env_var("LEAVE_SERVER_SMTP_FROM"),
		from_name: env_var("LEAVE_SERVER_SMTP_FROM_NAME"),
		tls_mode,
		approver_addresses,
	})
}

fn load_backup_from_env() -> BackupConfigLayer {
	BackupConfigLayer {
		enabled: env_bool("LEAVE_SERVER_BACKUP_ENABLED"),
		directory: env_var("LEAVE_SERVER_BACKUP_DIR").map(PathBuf::from),
		daily_at: env_var("LEAVE_SERVER_BACKUP_AT"),
	}
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var("LEAVE_SERVER_LOG_FORMAT") {
		Some(v) => Some(LogFormat::from_str_value(&v).ok_or_else(|| ConfigError::InvalidValue {
			key: "LEAVE_SERVER_LOG_FORMAT".to_string(),
			message: format!("expected pretty or json, got '{v}'"),
		})?),
		None => None,
	};
	Ok(LoggingConfigLayer {
		level: env_var("LEAVE_SERVER_LOG_LEVEL"),
		format,
	})
}

fn load_audit_from_env() -> Result<AuditConfigLayer, ConfigError> {
	Ok(AuditConfigLayer {
		enabled: env_bool("LEAVE_SERVER_AUDIT_ENABLED"),
		queue_capacity: env_usize("LEAVE_SERVER_AUDIT_QUEUE_CAPACITY")?,
		log_to_tracing: env_bool("LEAVE_SERVER_AUDIT_LOG_TO_TRACING"),
	})
}
