// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Six-digit one-time codes for the login second factor.
//!
//! Codes are single-use and short-lived. Only the SHA-256 hash is persisted;
//! the plaintext exists just long enough to hand it to the notifier.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::credential::PendingOtp;

/// Default lifetime of a code (3 minutes).
pub const OTP_TTL_SECONDS: i64 = 180;

pub const OTP_MIN: u32 = 100_000;
pub const OTP_MAX: u32 = 999_999;

/// Generate a fresh code and its pending record.
///
/// Returns `(plaintext_code, pending)`.
pub fn issue_otp(now: DateTime<Utc>, ttl: Duration) -> (String, PendingOtp) {
	let code = rand::thread_rng().gen_range(OTP_MIN..=OTP_MAX).to_string();
	let pending = PendingOtp {
		code_hash: hash_otp(&code),
		expires_at: now + ttl,
	};
	(code, pending)
}

pub fn hash_otp(code: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(code.trim().as_bytes());
	hex::encode(hasher.finalize())
}

impl PendingOtp {
	/// Expired strictly after `expires_at`; the instant itself still verifies.
	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		now > self.expires_at
	}

	/// Correct and not yet expired.
	pub fn accepts(&self, code: &str, now: DateTime<Utc>) -> bool {
		!self.is_expired(now) && hash_otp(code) == self.code_hash
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn code_is_six_digits() {
		for _ in 0..200 {
			let (code, _) = issue_otp(Utc::now(), Duration::seconds(OTP_TTL_SECONDS));
			assert_eq!(code.len(), 6);
			assert!(code.chars().all(|c| c.is_ascii_digit()));
			assert_ne!(code.as_bytes()[0], b'0');
		}
	}

	#[test]
	fn accepts_until_expiry_inclusive() {
		let now = Utc::now();
		let (code, pending) = issue_otp(now, Duration::seconds(OTP_TTL_SECONDS));
		assert!(pending.accepts(&code, now));
		assert!(pending.accepts(&code, pending.expires_at));
		assert!(!pending.accepts(&code, pending.expires_at + Duration::seconds(1)));
	}

	#[test]
	fn only_hash_is_stored() {
		let (code, pending) = issue_otp(Utc::now(), Duration::seconds(60));
		assert_ne!(pending.code_hash, code);
		assert_eq!(pending.code_hash.len(), 64);
	}

	proptest! {
		#[test]
		fn wrong_code_never_accepted(guess in OTP_MIN..=OTP_MAX) {
			let now = Utc::now();
			let (code, pending) = issue_otp(now, Duration::seconds(60));
			prop_assume!(guess.to_string() != code);
			prop_assert!(!pending.accepts(&guess.to_string(), now));
		}
	}
}
