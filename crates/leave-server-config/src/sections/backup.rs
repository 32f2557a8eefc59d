// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database backup configuration.

use std::path::PathBuf;

use leave_server_auth::TimeOfDay;
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfig {
	pub enabled: bool,
	pub directory: PathBuf,
	/// Local time of day at which the automatic backup runs.
	pub daily_at: TimeOfDay,
}

impl Default for BackupConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			directory: PathBuf::from("./backups"),
			daily_at: TimeOfDay::MIDNIGHT,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackupConfigLayer {
	#[serde(default)]
	pub enabled: Option<bool>,
	#[serde(default)]
	pub directory: Option<PathBuf>,
	#[serde(default)]
	pub daily_at: Option<String>,
}

impl BackupConfigLayer {
	pub fn merge(&mut self, other: BackupConfigLayer) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.directory.is_some() {
			self.directory = other.directory;
		}
		if other.daily_at.is_some() {
			self.daily_at = other.daily_at;
		}
	}

	pub fn finalize(self) -> Result<BackupConfig, ConfigError> {
		let defaults = BackupConfig::default();
		let daily_at = match self.daily_at {
			Some(raw) => raw
				.parse::<TimeOfDay>()
				.map_err(|e| ConfigError::invalid("backup.daily_at", e))?,
			None => defaults.daily_at,
		};
		Ok(BackupConfig {
			enabled: self.enabled.unwrap_or(defaults.enabled),
			directory: self.directory.unwrap_or(defaults.directory),
			daily_at,
		})
	}
}
