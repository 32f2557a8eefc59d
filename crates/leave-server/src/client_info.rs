// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client address and user agent, for audit entries and lockout notices.

use axum::{
	extract::FromRequestParts,
	http::{request::Parts, HeaderMap},
};
use leave_server_audit::AuditLogBuilder;
use leave_server_auth::LoginOrigin;
use std::convert::Infallible;

#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
}

impl ClientInfo {
	pub fn from_headers(headers: &HeaderMap) -> Self {
		Self {
			ip_address: extract_client_ip(headers),
			user_agent: header_value(headers, "user-agent"),
		}
	}

	pub fn login_origin(&self) -> LoginOrigin {
		LoginOrigin {
			ip: self.ip_address.clone(),
			user_agent: self.user_agent.clone(),
		}
	}

	/// Stamp the request origin onto an audit entry.
	pub fn apply(&self, builder: AuditLogBuilder) -> AuditLogBuilder {
		let builder = builder.ip_address_opt(self.ip_address.clone());
		match &self.user_agent {
			Some(ua) => builder.user_agent(ua.clone()),
			None => builder,
		}
	}
}

impl<S> FromRequestParts<S> for ClientInfo
where
	S: Send + Sync,
{
	type Rejection = Infallible;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		Ok(Self::from_headers(&parts.headers))
	}
}

/// First hop of `X-Forwarded-For`, then `X-Real-IP`.
fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
	if let Some(xff) = header_value(headers, "x-forwarded-for") {
		if let Some(first) = xff.split(',').next().map(str::trim) {
			if !first.is_empty() {
				return Some(first.to_string());
			}
		}
	}
	header_value(headers, "x-real-ip")
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
	headers
		.get(name)
		.and_then(|v| v.to_str().ok())
		.map(str::trim)
		.filter(|v| !v.is_empty())
		.map(str::to_string)
}
