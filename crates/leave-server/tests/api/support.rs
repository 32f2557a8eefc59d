// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use axum::{
	body::Body,
	http::{header, Method, Request, StatusCode},
	response::Response,
	Router,
};
use leave_server::{create_app_state, create_router, AppServices, AppState, ServerConfig};
use leave_server_auth::{
	EmailTemplate, FixedClock, Notifier, NotifyError, ResourceSnapshotStore, Role, UserId,
};
use leave_server_db::{AuditLogFilter, AuditLogRecord};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse battery";

/// Records every message instead of sending it.
#[derive(Default)]
pub struct CapturingNotifier {
	sent: Mutex<Vec<(String, EmailTemplate)>>,
}

impl CapturingNotifier {
	pub fn sent(&self) -> Vec<(String, EmailTemplate)> {
		self.sent.lock().unwrap().clone()
	}

	pub fn latest_otp(&self, to: &str) -> Option<String> {
		self.sent()
			.into_iter()
			.rev()
			.find_map(|(contact, template)| match template {
				EmailTemplate::Otp { code, .. } if contact == to => Some(code),
				_ => None,
			})
	}
}

#[async_trait]
impl Notifier for CapturingNotifier {
	async fn deliver(&self, contact: &str, message: &EmailTemplate) -> Result<(), NotifyError> {
		self.sent
			.lock()
			.unwrap()
			.push((contact.to_string(), message.clone()));
		Ok(())
	}
}

pub struct TestApp {
	pub router: Router,
	pub state: AppState,
	pub mail: Arc<CapturingNotifier>,
	pub clock: Arc<FixedClock>,
	_dir: TempDir,
}

/// App backed by a fresh database, pinned to 10:00 on a Monday.
pub async fn setup() -> TestApp {
	setup_with(|_| {}).await
}

pub async fn setup_with(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
	let dir = tempfile::tempdir().unwrap();
	let db_url = format!("sqlite:{}", dir.path().join("leave.db").display());
	let pool = leave_server_db::create_pool(&db_url).await.unwrap();
	leave_server_db::run_migrations(&pool).await.unwrap();

	let mut config = ServerConfig::default();
	config.backup.directory = dir.path().join("backups");
	configure(&mut config);

	let mail = Arc::new(CapturingNotifier::default());
	let clock = Arc::new(FixedClock::at_hm(10, 0).unwrap());
	let services = AppServices {
		notifier: mail.clone(),
		smtp: None,
		clock: clock.clone(),
	};
	let state = create_app_state(pool, &config, services).await.unwrap();

	TestApp {
		router: create_router(state.clone()),
		state,
		mail,
		clock,
		_dir: dir,
	}
}

impl TestApp {
	/// Route access decisions through `store` instead of the leave table.
	pub fn with_resource_store(mut self, store: Arc<dyn ResourceSnapshotStore>) -> Self {
		self.state.resources = store;
		self.router = create_router(self.state.clone());
		self
	}

	pub async fn request(
		&self,
		method: Method,
		uri: &str,
		token: Option<&str>,
		body: Option<Value>,
	) -> Response {
		let mut builder = Request::builder().method(method).uri(uri);
		if let Some(token) = token {
			builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
		}
		let body = match body {
			Some(json) => {
				builder = builder.header(header::CONTENT_TYPE, "application/json");
				Body::from(json.to_string())
			}
			None => Body::empty(),
		};
		self.router
			.clone()
			.oneshot(builder.body(body).unwrap())
			.await
			.unwrap()
	}

	pub async fn call(
		&self,
		method: Method,
		uri: &str,
		token: Option<&str>,
		body: Option<Value>,
	) -> (StatusCode, Value) {
		let response = self.request(method, uri, token, body).await;
		let status = response.status();
		(status, json_body(response).await)
	}

	pub async fn register(&self, name: &str, email: &str, department: Option<&str>) -> UserId {
		let (status, body) = self
			.call(
				Method::POST,
				"/api/auth/register",
				None,
				Some(serde_json::json!({
					"name": name,
					"email": email,
					"password": PASSWORD,
					"department": department,
				})),
			)
			.await;
		assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
		body["id"].as_str().unwrap().parse().unwrap()
	}

	/// Register, optionally promote, and complete both login steps.
	pub async fn user(&self, name: &str, role: Role, department: Option<&str>) -> (UserId, String) {
		let email = format!("{}@example.com", name.to_ascii_lowercase());
		let id = self.register(name, &email, department).await;
		if role != Role::Employee {
			self.state.users.update_role(&id, role).await.unwrap();
		}
		let token = self.login(&email).await;
		(id, token)
	}

	pub async fn login(&self, email: &str) -> String {
		let (status, body) = self
			.call(
				Method::POST,
				"/api/auth/login",
				None,
				Some(serde_json::json!({ "email": email, "password": PASSWORD })),
			)
			.await;
		assert_eq!(status, StatusCode::OK, "login failed: {body}");

		let otp = self.wait_for_otp(email).await;
		let (status, body) = self
			.call(
				Method::POST,
				"/api/auth/verify-otp",
				None,
				Some(serde_json::json!({ "email": email, "otp": otp })),
			)
			.await;
		assert_eq!(status, StatusCode::OK, "verify failed: {body}");
		body["token"].as_str().unwrap().to_string()
	}

	/// OTP delivery runs in a spawned task.
	pub async fn wait_for_otp(&self, email: &str) -> String {
		for _ in 0..100 {
			if let Some(code) = self.mail.latest_otp(email) {
				return code;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		panic!("no OTP delivered to {email}");
	}

	/// Audit writes are asynchronous; poll until `predicate` holds.
	pub async fn wait_for_audit(
		&self,
		filter: AuditLogFilter,
		predicate: impl Fn(&[AuditLogRecord]) -> bool,
	) -> Vec<AuditLogRecord> {
		let mut logs = Vec::new();
		for _ in 0..100 {
			logs = self
				.state
				.audit_logs
				.query_logs(&filter, 1, 100)
				.await
				.unwrap()
				.logs;
			if predicate(&logs) {
				return logs;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		panic!("audit condition not met; last saw {} entries", logs.len());
	}

	pub async fn wait_for_mail(&self, predicate: impl Fn(&(String, EmailTemplate)) -> bool) {
		for _ in 0..100 {
			if self.mail.sent().iter().any(&predicate) {
				return;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		panic!("expected mail was not sent");
	}
}

pub async fn json_body(response: Response) -> Value {
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap();
	if bytes.is_empty() {
		return Value::Null;
	}
	serde_json::from_slice(&bytes).unwrap()
}
