// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core event types for audit logging.
//!
//! - [`AuditEventType`]: every auditable action, stored under its
//!   upper-case action name (`LOGIN`, `APPROVE_LEAVE`, ...)
//! - [`AuditOutcome`]: `SUCCESS`, `FAILED` or `DENIED`
//! - [`AuditSeverity`]: derived from the outcome unless set explicitly
//! - [`AuditLogEntry`] / [`AuditLogBuilder`]: the record and its fluent builder

use chrono::{DateTime, Utc};
use leave_server_auth::{AccessModel, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AuditError;

/// Types of events that can be recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
	// Authentication events
	Register,
	Login,
	LoginFailed,
	AccountLocked,
	OtpVerified,
	OtpFailed,
	OtpDeliveryFailed,
	Logout,

	// Leave request events
	CreateLeave,
	UpdateLeave,
	ApproveLeave,
	RejectLeave,
	ManagerApproveLeave,
	ClassifyLeave,
	UpdateLeaveAccess,

	// Access control events
	AccessDenied,

	// User administration events
	UpdateUserRole,
	UpdateUserDepartment,
	ToggleUserActive,
	UnlockAccount,
	DeleteUser,

	// Maintenance events
	ClearLogs,
	ManualBackup,
	AutoBackup,
}

impl AuditEventType {
	pub fn all() -> &'static [AuditEventType] {
		use AuditEventType::*;
		&[
			Register,
			Login,
			LoginFailed,
			AccountLocked,
			OtpVerified,
			OtpFailed,
			OtpDeliveryFailed,
			Logout,
			CreateLeave,
			UpdateLeave,
			ApproveLeave,
			RejectLeave,
			ManagerApproveLeave,
			ClassifyLeave,
			UpdateLeaveAccess,
			AccessDenied,
			UpdateUserRole,
			UpdateUserDepartment,
			ToggleUserActive,
			UnlockAccount,
			DeleteUser,
			ClearLogs,
			ManualBackup,
			AutoBackup,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			AuditEventType::Register => "REGISTER",
			AuditEventType::Login => "LOGIN",
			AuditEventType::LoginFailed => "LOGIN_FAILED",
			AuditEventType::AccountLocked => "ACCOUNT_LOCKED",
			AuditEventType::OtpVerified => "OTP_VERIFIED",
			AuditEventType::OtpFailed => "OTP_FAILED",
			AuditEventType::OtpDeliveryFailed => "OTP_DELIVERY_FAILED",
			AuditEventType::Logout => "LOGOUT",

			AuditEventType::CreateLeave => "CREATE_LEAVE",
			AuditEventType::UpdateLeave => "UPDATE_LEAVE",
			AuditEventType::ApproveLeave => "APPROVE_LEAVE",
			AuditEventType::RejectLeave => "REJECT_LEAVE",
			AuditEventType::ManagerApproveLeave => "MANAGER_APPROVE_LEAVE",
			AuditEventType::ClassifyLeave => "CLASSIFY_LEAVE",
			AuditEventType::UpdateLeaveAccess => "UPDATE_LEAVE_ACCESS",

			AuditEventType::AccessDenied => "ACCESS_DENIED",

			AuditEventType::UpdateUserRole => "UPDATE_USER_ROLE",
			AuditEventType::UpdateUserDepartment => "UPDATE_USER_DEPARTMENT",
			AuditEventType::ToggleUserActive => "TOGGLE_USER_ACTIVE",
			AuditEventType::UnlockAccount => "UNLOCK_ACCOUNT",
			AuditEventType::DeleteUser => "DELETE_USER",

			AuditEventType::ClearLogs => "CLEAR_LOGS",
			AuditEventType::ManualBackup => "MANUAL_BACKUP",
			AuditEventType::AutoBackup => "AUTO_BACKUP",
		}
	}
}

impl fmt::Display for AuditEventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AuditEventType {
	type Err = AuditError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let wanted = s.trim().to_ascii_uppercase();
		AuditEventType::all()
			.iter()
			.copied()
			.find(|e| e.as_str() == wanted)
			.ok_or_else(|| AuditError::UnknownValue {
				kind: "event type",
				value: s.to_string(),
			})
	}
}

/// Result of the audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
	#[default]
	Success,
	/// The action was attempted and failed (bad credentials, I/O error).
	Failed,
	/// An access check refused the action.
	Denied,
}

impl AuditOutcome {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuditOutcome::Success => "SUCCESS",
			AuditOutcome::Failed => "FAILED",
			AuditOutcome::Denied => "DENIED",
		}
	}
}

impl fmt::Display for AuditOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AuditOutcome {
	type Err = AuditError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_uppercase().as_str() {
			"SUCCESS" => Ok(AuditOutcome::Success),
			"FAILED" => Ok(AuditOutcome::Failed),
			"DENIED" => Ok(AuditOutcome::Denied),
			_ => Err(AuditError::UnknownValue {
				kind: "outcome",
				value: s.to_string(),
			}),
		}
	}
}

/// Severity levels, ordered from least to most severe.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
	#[default]
	Info,
	Notice,
	Warning,
	Error,
}

impl AuditSeverity {
	/// Severity used when the builder is not given one.
	pub fn for_event(event_type: AuditEventType, outcome: AuditOutcome) -> Self {
		match (event_type, outcome) {
			(AuditEventType::AccountLocked, _) => AuditSeverity::Warning,
			(AuditEventType::ManualBackup | AuditEventType::AutoBackup, AuditOutcome::Failed) => {
				AuditSeverity::Error
			}
			(_, AuditOutcome::Denied | AuditOutcome::Failed) => AuditSeverity::Warning,
			(
				AuditEventType::UpdateUserRole
				| AuditEventType::DeleteUser
				| AuditEventType::UnlockAccount
				| AuditEventType::ToggleUserActive
				| AuditEventType::ClearLogs,
				AuditOutcome::Success,
			) => AuditSeverity::Notice,
			_ => AuditSeverity::Info,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			AuditSeverity::Info => "info",
			AuditSeverity::Notice => "notice",
			AuditSeverity::Warning => "warning",
			AuditSeverity::Error => "error",
		}
	}
}

impl fmt::Display for AuditSeverity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AuditSeverity {
	type Err = AuditError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"info" => Ok(AuditSeverity::Info),
			"notice" => Ok(AuditSeverity::Notice),
			"warning" => Ok(AuditSeverity::Warning),
			"error" => Ok(AuditSeverity::Error),
			_ => Err(AuditError::UnknownValue {
				kind: "severity",
				value: s.to_string(),
			}),
		}
	}
}

/// An entry in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
	pub id: Uuid,
	pub timestamp: DateTime<Utc>,
	pub event_type: AuditEventType,
	pub outcome: AuditOutcome,
	pub severity: AuditSeverity,

	/// The user who performed the action, when known. Failed logins for an
	/// unknown email and the scheduled backup have no actor.
	pub actor_user_id: Option<UserId>,

	/// The kind of resource affected (`leave_request`, `user`, `backup`).
	pub resource_type: Option<String>,
	pub resource_id: Option<String>,

	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
	/// Event-specific details. Secret-looking keys are redacted before any
	/// sink sees them.
	pub details: serde_json::Value,
}

impl AuditLogEntry {
	pub fn builder(event_type: AuditEventType) -> AuditLogBuilder {
		AuditLogBuilder::new(event_type)
	}
}

/// Builder for constructing audit log entries with a fluent API.
#[derive(Debug, Clone)]
pub struct AuditLogBuilder {
	event_type: AuditEventType,
	outcome: AuditOutcome,
	severity: Option<AuditSeverity>,
	actor_user_id: Option<UserId>,
	resource_type: Option<String>,
	resource_id: Option<String>,
	ip_address: Option<String>,
	user_agent: Option<String>,
	details: serde_json::Value,
}

impl AuditLogBuilder {
	pub fn new(event_type: AuditEventType) -> Self {
		Self {
			event_type,
			outcome: AuditOutcome::Success,
			severity: None,
			actor_user_id: None,
			resource_type: None,
			resource_id: None,
			ip_address: None,
			user_agent: None,
			details: serde_json::Value::Null,
		}
	}

	pub fn outcome(mut self, outcome: AuditOutcome) -> Self {
		self.outcome = outcome;
		self
	}

	pub fn failed(self) -> Self {
		self.outcome(AuditOutcome::Failed)
	}

	/// Mark the entry as refused by `model`, recording the model in details.
	pub fn denied_by(mut self, model: AccessModel) -> Self {
		self.outcome = AuditOutcome::Denied;
		self.insert_detail("model", serde_json::Value::String(model.as_str().to_string()));
		self
	}

	/// Set the severity level. Defaults to [`AuditSeverity::for_event`].
	pub fn severity(mut self, severity: AuditSeverity) -> Self {
		self.severity = Some(severity);
		self
	}

	pub fn actor(mut self, user_id: UserId) -> Self {
		self.actor_user_id = Some(user_id);
		self
	}

	pub fn actor_opt(mut self, user_id: Option<UserId>) -> Self {
		self.actor_user_id = user_id;
		self
	}

	pub fn resource(
		mut self,
		resource_type: impl Into<String>,
		resource_id: impl Into<String>,
	) -> Self {
		self.resource_type = Some(resource_type.into());
		self.resource_id = Some(resource_id.into());
		self
	}

	pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
		self.ip_address = Some(ip.into());
		self
	}

	pub fn ip_address_opt(mut self, ip: Option<String>) -> Self {
		self.ip_address = ip;
		self
	}

	pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
		self.user_agent = Some(ua.into());
		self
	}

	/// Replace the details object.
	pub fn details(mut self, details: serde_json::Value) -> Self {
		self.details = details;
		self
	}

	/// Add one key to the details object, creating it if needed.
	pub fn detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
		self.insert_detail(key, value.into());
		self
	}

	fn insert_detail(&mut self, key: &str, value: serde_json::Value) {
		if !self.details.is_object() {
			self.details = serde_json::Value::Object(serde_json::Map::new());
		}
		if let Some(map) = self.details.as_object_mut() {
			map.insert(key.to_string(), value);
		}
	}

	pub fn build(self) -> AuditLogEntry {
		AuditLogEntry {
			id: Uuid::new_v4(),
			timestamp: Utc::now(),
			event_type: self.event_type,
			outcome: self.outcome,
			severity: self
				.severity
				.unwrap_or_else(|| AuditSeverity::for_event(self.event_type, self.outcome)),
			actor_user_id: self.actor_user_id,
			resource_type: self.resource_type,
			resource_id: self.resource_id,
			ip_address: self.ip_address,
			user_agent: self.user_agent,
			details: self.details,
		}
	}
}
