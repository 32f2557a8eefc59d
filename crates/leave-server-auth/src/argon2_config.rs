// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Argon2 configuration for password hashing.
//!
//! Release builds use `Argon2::default()` (Argon2id, 19 MiB, 2 iterations,
//! 1 lane). Test builds use a deliberately weak parameter set so the lockout
//! and OTP suites, which hash on every attempt, stay fast.
//!
//! Test parameters MUST NOT be used in production.

use argon2::Argon2;
#[cfg(test)]
use argon2::{Algorithm, Params, Version};

/// Returns the Argon2 instance for the current build context.
#[inline]
pub(crate) fn argon2_instance() -> Argon2<'static> {
	#[cfg(test)]
	{
		// 1 MiB, 1 iteration, 1 lane
		let params = Params::new(1024, 1, 1, None).expect("valid Argon2 params for tests");
		Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
	}

	#[cfg(not(test))]
	{
		Argon2::default()
	}
}
