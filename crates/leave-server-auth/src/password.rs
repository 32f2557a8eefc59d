// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Password hashing and verification (Argon2id, PHC string format).

use argon2::password_hash::{
	rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use std::sync::OnceLock;

use crate::argon2_config::argon2_instance;
use crate::error::AuthError;

/// Hash a plaintext password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
	let salt = SaltString::generate(&mut OsRng);
	argon2_instance()
		.hash_password(password.as_bytes(), &salt)
		.map(|hash| hash.to_string())
		.map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Verify a plaintext password against a stored PHC string.
///
/// A malformed stored hash verifies as `false`; it never matches anything.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
	match PasswordHash::new(stored_hash) {
		Ok(parsed) => argon2_instance()
			.verify_password(password.as_bytes(), &parsed)
			.is_ok(),
		Err(e) => {
			tracing::warn!(error = %e, "stored password hash is malformed");
			false
		}
	}
}

/// Burn roughly one verification's worth of work.
///
/// Called on the unknown-identifier path so a missing account costs the same
/// as a wrong password and response timing does not reveal which it was.
pub(crate) fn dummy_verify(password: &str) {
	static DUMMY: OnceLock<Option<String>> = OnceLock::new();
	let hash = DUMMY.get_or_init(|| hash_password("leave-server-dummy-password").ok());
	if let Some(hash) = hash {
		let _ = verify_password(password, hash);
	}
}
