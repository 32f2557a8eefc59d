// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Redacting wrapper for sensitive configuration values.
//!
//! The leave server carries a handful of values that must never reach a log
//! line or an API response: the session-token signing key, the SMTP password,
//! and plaintext passwords while they are in flight to the hasher.
//! [`Secret<T>`] wraps them so that:
//!
//! - `Debug`, `Display` and `Serialize` all print [`REDACTED`]
//! - the inner value is zeroized when the wrapper is dropped
//! - reading the value requires an explicit [`Secret::expose`] call
//!
//! ```
//! use leave_common_secret::SecretString;
//!
//! let key = SecretString::new("session-signing-key".to_string());
//! assert_eq!(format!("{key}"), "[REDACTED]");
//! assert_eq!(key.expose(), "session-signing-key");
//! ```

use std::fmt;
use zeroize::Zeroize;

/// Placeholder printed in place of any secret value.
pub const REDACTED: &str = "[REDACTED]";

/// A value that refuses to print itself.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T: Zeroize> {
	inner: T,
}

/// Secret string, the common case for keys and passwords.
pub type SecretString = Secret<String>;

impl<T: Zeroize> Secret<T> {
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Borrow the wrapped value. Every call site is a place where the secret
	/// leaves its wrapper, so keep them few.
	pub fn expose(&self) -> &T {
		&self.inner
	}
}

impl SecretString {
	/// Length of the wrapped string in bytes, for validation without exposure.
	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
	fn clone(&self) -> Self {
		Self::new(self.inner.clone())
	}
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T: Zeroize> fmt::Display for Secret<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T: Zeroize + PartialEq> PartialEq for Secret<T> {
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T: Zeroize + Eq> Eq for Secret<T> {}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T: Zeroize> Serialize for Secret<T> {
		fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
			serializer.serialize_str(REDACTED)
		}
	}

	impl<'de, T> Deserialize<'de> for Secret<T>
	where
		T: Deserialize<'de> + Zeroize,
	{
		fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
			T::deserialize(deserializer).map(Secret::new)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn debug_and_display_hide_value() {
		let secret = SecretString::new("smtp-password".to_string());
		assert_eq!(format!("{secret}"), REDACTED);
		assert!(!format!("{secret:?}").contains("smtp-password"));
	}

	#[test]
	fn optional_secret_is_redacted() {
		let secret = Some(SecretString::new("token-key".to_string()));
		let rendered = format!("{secret:?}");
		assert!(rendered.contains(REDACTED));
		assert!(!rendered.contains("token-key"));
	}

	#[test]
	fn expose_and_len_see_the_value() {
		let secret = SecretString::from("0123456789".to_string());
		assert_eq!(secret.expose(), "0123456789");
		assert_eq!(secret.len(), 10);
		assert!(!secret.is_empty());
	}

	#[test]
	fn serialize_redacts_and_deserialize_wraps() {
		let secret = SecretString::new("signing-key".to_string());
		let json = serde_json::to_string(&secret).unwrap();
		assert_eq!(json, format!("\"{REDACTED}\""));

		let parsed: SecretString = serde_json::from_str("\"signing-key\"").unwrap();
		assert_eq!(parsed, secret);
	}

	proptest! {
		#[test]
		fn formatting_never_leaks(inner in "[a-z0-9]{4,40}") {
			prop_assume!(!"redacted secret".contains(inner.as_str()));
			let secret = SecretString::new(inner.clone());
			let displayed = format!("{secret}");
			let debugged = format!("{secret:?}");
			prop_assert!(!displayed.contains(&inner));
			prop_assert!(!debugged.contains(&inner));
		}
	}
}
