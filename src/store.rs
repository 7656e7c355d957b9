//! Durable token cache, atomic file replacement, and the cross-process token lock.

pub mod atomic;
pub mod file;
pub mod lock;

pub use atomic::write_atomic;
pub use file::FileCache;
pub use lock::{FileLock, LockGuard};

// self
use crate::{_prelude::*, auth::TokenState};

/// Storage contract for the single token state document of one provider.
///
/// Implementations are called only while the caller holds the provider's [`FileLock`].
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Reads the current state; `Ok(None)` means nothing has been seeded yet.
	fn load(&self) -> Result<Option<TokenState>>;

	/// Replaces the current state; readers never observe a partial document.
	fn save(&self, state: &TokenState) -> Result<()>;

	/// Human-readable location for logs and diagnostics.
	fn location(&self) -> &Path;
}

/// Error type produced by storage backends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
