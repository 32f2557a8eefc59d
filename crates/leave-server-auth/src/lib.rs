// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication and layered access control for the leave server.
//!
//! This crate provides:
//! - The login pipeline: argon2 password check, lockout, one-time code,
//!   signed session token ([`pipeline`])
//! - The access decision engine: six pure checks and per-operation ordered
//!   chains ([`access`])
//! - Domain types shared with the storage and HTTP layers
//! - Email templates for codes and leave notifications
//!
//! Storage and delivery are reached only through traits defined here
//! ([`CredentialStore`], [`ResourceSnapshotStore`], [`Notifier`]), so the
//! crate has no database or network dependency.
//!
//! # Security Considerations
//!
//! - Passwords are stored as Argon2id PHC strings
//! - One-time codes are stored as SHA-256 digests and expire after 3 minutes
//! - The token signing key is a [`leave_common_secret::SecretString`]
//! - Every access check fails closed

pub mod access;
pub mod actor;
mod argon2_config;
pub mod clock;
pub mod credential;
pub mod email;
pub mod error;
pub mod notifier;
pub mod otp;
pub mod password;
pub mod pipeline;
pub mod session_token;
pub mod types;

pub use access::{
	AccessChain, AccessContext, AccessError, AccessModel, AttributePolicy, Constraint, Decision,
	PolicyConfig, PolicyError, ResourceSnapshot, ResourceSnapshotStore, TimeOfDay, TimeWindow,
	MANAGER_APPROVE_POLICY,
};
pub use actor::Actor;
pub use clock::{Clock, FixedClock, SystemClock};
pub use credential::{CredentialRecord, CredentialStore, NewCredential, PendingOtp, StoreError};
pub use email::{render_email, EmailTemplate, RenderedEmail};
pub use error::AuthError;
pub use notifier::{LogNotifier, Notifier, NotifyError};
pub use password::{hash_password, verify_password};
pub use pipeline::{
	AuthPipeline, AuthSettings, IssuedSession, LoginOrigin, PendingVerification, Registration,
};
pub use session_token::{SessionClaims, SessionTokenIssuer, TokenError, SESSION_TTL_SECONDS};
pub use types::{Classification, EmploymentStatus, LeaveRequestId, ParseEnumError, Role, UserId};
