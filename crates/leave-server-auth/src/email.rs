// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Email templates for authentication and leave notifications.
//!
//! Rendering is pure and lives here so both the OTP notifier and the leave
//! handlers produce identical mail regardless of transport.

use serde::{Deserialize, Serialize};

/// Email templates with their variable data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum EmailTemplate {
	/// Login second factor.
	Otp { code: String, expires_minutes: i64 },
	/// Sent to approvers when an employee files a request.
	LeaveRequest {
		employee: String,
		kind: String,
		start: String,
		end: String,
	},
	LeaveApproved { name: String, kind: String },
	LeaveRejected { name: String, kind: String },
	/// Sent to the account owner when repeated failures lock the account.
	SuspiciousLogin { ip: String, device: String },
}

impl EmailTemplate {
	/// Stable template name, used in logs and audit details.
	pub fn name(&self) -> &'static str {
		match self {
			EmailTemplate::Otp { .. } => "otp",
			EmailTemplate::LeaveRequest { .. } => "leave_request",
			EmailTemplate::LeaveApproved { .. } => "leave_approved",
			EmailTemplate::LeaveRejected { .. } => "leave_rejected",
			EmailTemplate::SuspiciousLogin { .. } => "suspicious_login",
		}
	}
}

/// A rendered message ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
	pub subject: String,
	pub html: String,
	pub text: String,
}

/// Render a template to subject, HTML body and plain-text body.
///
/// Every interpolated value is HTML-escaped in the HTML body.
pub fn render_email(template: &EmailTemplate) -> RenderedEmail {
	match template {
		EmailTemplate::Otp {
			code,
			expires_minutes,
		} => RenderedEmail {
			subject: "Your OTP Code".to_string(),
			html: format!(
				"<h2>Your OTP Code</h2>\n<p>Your OTP is <strong>{}</strong>.</p>\n<p>It expires in {} minutes.</p>",
				escape_html(code),
				expires_minutes
			),
			text: format!("Your OTP is {code}\n\nIt expires in {expires_minutes} minutes."),
		},
		EmailTemplate::LeaveRequest {
			employee,
			kind,
			start,
			end,
		} => RenderedEmail {
			subject: format!("New Leave Request from {employee}"),
			html: format!(
				"<h2>New Leave Request</h2>\n<p><strong>{}</strong> has requested <strong>{}</strong> leave.</p>\n<p>From: {}</p>\n<p>To: {}</p>",
				escape_html(employee),
				escape_html(kind),
				escape_html(start),
				escape_html(end)
			),
			text: format!("{employee} has requested {kind} leave.\n\nFrom: {start}\nTo: {end}"),
		},
		EmailTemplate::LeaveApproved { name, kind } => RenderedEmail {
			subject: "Leave Approved".to_string(),
			html: format!(
				"<h2>Leave Approved</h2>\n<p>Hi {}, your <strong>{}</strong> leave request has been <strong>APPROVED</strong>.</p>",
				escape_html(name),
				escape_html(kind)
			),
			text: format!("Hi {name}, your {kind} leave request has been APPROVED."),
		},
		EmailTemplate::LeaveRejected { name, kind } => RenderedEmail {
			subject: "Leave Rejected".to_string(),
			html: format!(
				"<h2>Leave Rejected</h2>\n<p>Hi {}, unfortunately your <strong>{}</strong> leave request has been <strong>REJECTED</strong>.</p>",
				escape_html(name),
				escape_html(kind)
			),
			text: format!("Hi {name}, unfortunately your {kind} leave request has been REJECTED."),
		},
		EmailTemplate::SuspiciousLogin { ip, device } => RenderedEmail {
			subject: "Suspicious Login Attempt".to_string(),
			html: format!(
				"<h2>Suspicious Login Attempt</h2>\n<p>A login attempt was detected:</p>\n<p>IP: {}</p>\n<p>Device: {}</p>",
				escape_html(ip),
				escape_html(device)
			),
			text: format!("A login attempt was detected.\n\nIP: {ip}\nDevice: {device}"),
		},
	}
}

fn escape_html(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	for c in s.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#39;"),
			_ => out.push(c),
		}
	}
	out
}
