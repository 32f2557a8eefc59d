// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication middleware for Axum.
//!
//! [`auth_layer`] reads the session token from the configured cookie or an
//! `Authorization: Bearer` header, verifies it, reloads the user and stores an
//! [`AuthContext`] in the request extensions. Handlers take [`RequireAuth`].
//!
//! # Security Properties
//!
//! - The user is reloaded on every request, so role changes and deactivation
//!   take effect before the token expires
//! - Deactivated users are treated as unauthenticated
//! - Tokens are never logged

use axum::{
	body::Body,
	extract::{FromRequestParts, State},
	http::{header, request::Parts, HeaderMap, Request},
	middleware::Next,
	response::{IntoResponse, Response},
};
use leave_server_auth::{Actor, SessionClaims};
use leave_server_db::UserProfile;
use tracing::instrument;

use crate::{api::AppState, api_response::unauthorized, error::ServerError};

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser {
	pub profile: UserProfile,
	pub actor: Actor,
	pub claims: SessionClaims,
}

#[derive(Debug, Clone, Default)]
pub struct AuthContext {
	pub current_user: Option<CurrentUser>,
}

impl AuthContext {
	pub fn authenticated(user: CurrentUser) -> Self {
		Self {
			current_user: Some(user),
		}
	}

	pub fn unauthenticated() -> Self {
		Self::default()
	}
}

#[instrument(
	name = "auth_layer",
	skip(state, request, next),
	fields(user_id = tracing::field::Empty)
)]
pub async fn auth_layer(
	State(state): State<AppState>,
	mut request: Request<Body>,
	next: Next,
) -> Response {
	let ctx = match extract_token(request.headers(), &state.config.auth.cookie_name) {
		Some(token) => match authenticate(&state, &token).await {
			Ok(ctx) => ctx,
			Err(e) => return e.into_response(),
		},
		None => AuthContext::unauthenticated(),
	};

	if let Some(user) = &ctx.current_user {
		tracing::Span::current().record("user_id", tracing::field::display(&user.profile.id));
	}
	request.extensions_mut().insert(ctx);
	next.run(request).await
}

/// Resolve a token to a user. An invalid token or an unusable account is an
/// unauthenticated context; only a store failure is an error.
async fn authenticate(state: &AppState, token: &str) -> Result<AuthContext, ServerError> {
	let claims = match state.auth.verify_session(token) {
		Ok(claims) => claims,
		Err(e) => {
			tracing::debug!(error = %e, "session token rejected");
			return Ok(AuthContext::unauthenticated());
		}
	};

	let Some(profile) = state.users.get_user_by_id(&claims.sub).await? else {
		tracing::debug!(user_id = %claims.sub, "session for deleted user");
		return Ok(AuthContext::unauthenticated());
	};
	if !profile.is_active {
		tracing::debug!(user_id = %profile.id, "session for deactivated user");
		return Ok(AuthContext::unauthenticated());
	}

	let actor = profile.to_actor();
	Ok(AuthContext::authenticated(CurrentUser {
		profile,
		actor,
		claims,
	}))
}

/// Cookie first, then bearer.
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
	extract_cookie(headers, cookie_name).or_else(|| extract_bearer_token(headers))
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
	headers
		.get_all(header::COOKIE)
		.iter()
		.filter_map(|v| v.to_str().ok())
		.flat_map(|v| v.split(';'))
		.filter_map(|pair| pair.trim().split_once('='))
		.find(|(k, _)| *k == name)
		.map(|(_, v)| v.trim().to_string())
		.filter(|v| !v.is_empty())
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
	headers
		.get(header::AUTHORIZATION)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.strip_prefix("Bearer "))
		.map(|t| t.trim().to_string())
		.filter(|t| !t.is_empty())
}

/// Extractor that requires authentication. Rejects with 401.
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
	S: Send + Sync,
{
	type Rejection = Response;

	#[instrument(name = "RequireAuth::from_request_parts", skip_all)]
	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		let ctx = parts
			.extensions
			.get::<AuthContext>()
			.cloned()
			.unwrap_or_else(AuthContext::unauthenticated);

		match ctx.current_user {
			Some(user) => Ok(RequireAuth(user)),
			None => {
				tracing::debug!("authentication required: no valid session");
				Err(unauthorized("Authentication required"))
			}
		}
	}
}

/// Extractor for routes that work with or without a session.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
	S: Send + Sync,
{
	type Rejection = std::convert::Infallible;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		let ctx = parts.extensions.get::<AuthContext>().cloned().unwrap_or_default();
		Ok(OptionalAuth(ctx.current_user))
	}
}
