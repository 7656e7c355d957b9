//! Validated identifiers: provider accounts, OAuth clients, and provider descriptors.
//!
//! Account ids are interpolated into data API paths (`1/user/{id}/...`), so on top of the shared
//! rules they may not contain URL delimiters.

// std
use std::ops::Deref;
// crates.io
use serde_json::Value;
// self
use crate::_prelude::*;

const MAX_LEN: usize = 128;

macro_rules! identifier {
	($(#[$meta:meta])* $name:ident, $label:literal, $extra:expr) => {
		$(#[$meta])*
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validates and wraps `value`.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				let value = value.into();

				check($label, &value, $extra)?;

				Ok(Self(value))
			}

			/// Borrows the raw identifier.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl From<$name> for String {
			fn from(id: $name) -> Self {
				id.0
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({})", $label, self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

identifier! {
	/// Provider user id that data API paths are scoped to (Fitbit `user_id`, Withings `userid`).
	AccountId, "Account", |c: char| matches!(c, '/' | '?' | '#' | '%')
}
identifier! {
	/// OAuth 2.0 client id registered with a provider.
	ClientId, "Client", |_: char| false
}
identifier! {
	/// Label of a provider descriptor; also names its cache and lock files.
	ProviderId, "Provider", |c: char| matches!(c, '/' | '\\')
}

impl AccountId {
	/// Reads an account id from a token payload, where it arrives as a string or an integer.
	///
	/// Surrounding whitespace is trimmed; anything else that fails validation yields `None`.
	pub fn from_json(value: &Value) -> Option<Self> {
		match value {
			Value::String(s) => Self::new(s.trim()).ok(),
			Value::Number(n) if n.is_u64() || n.is_i64() => Self::new(n.to_string()).ok(),
			_ => None,
		}
	}
}

/// Why a value was refused as an identifier.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// The value was empty.
	#[error("{kind} id is empty.")]
	Empty {
		/// Identifier label.
		kind: &'static str,
	},
	/// The value contains whitespace, a control character, or a character the kind forbids.
	#[error("{kind} id contains the forbidden character {found:?}.")]
	ForbiddenChar {
		/// Identifier label.
		kind: &'static str,
		/// First offending character.
		found: char,
	},
	/// The value is longer than the allowed byte length.
	#[error("{kind} id is longer than {max} bytes.")]
	TooLong {
		/// Identifier label.
		kind: &'static str,
		/// Maximum permitted length.
		max: usize,
	},
}

fn check(
	kind: &'static str,
	value: &str,
	forbidden: impl Fn(char) -> bool,
) -> Result<(), IdentifierError> {
	if value.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if value.len() > MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: MAX_LEN });
	}
	if let Some(found) =
		value.chars().find(|c| c.is_whitespace() || c.is_control() || forbidden(*c))
	{
		return Err(IdentifierError::ForbiddenChar { kind, found });
	}

	Ok(())
}
