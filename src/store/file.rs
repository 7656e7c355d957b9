//! JSON token cache backed by a single file.

// std
use std::{fs, io::ErrorKind};
// self
use crate::{
	_prelude::*,
	auth::TokenState,
	store::{StoreError, TokenStore, atomic},
};

/// Persists the token state as a pretty-printed JSON document.
#[derive(Clone, Debug)]
pub struct FileCache {
	path: PathBuf,
}
impl FileCache {
	/// Creates a cache handle; nothing is touched on disk until the first save.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Cache file path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn corrupt(&self, message: impl Into<String>) -> Error {
		Error::CacheCorrupt { path: self.path.clone(), message: message.into() }
	}
}
impl TokenStore for FileCache {
	fn load(&self) -> Result<Option<TokenState>> {
		let bytes = match fs::read(&self.path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(self.corrupt(e.to_string())),
		};

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Err(self.corrupt("file is empty"));
		}

		let de = &mut serde_json::Deserializer::from_slice(&bytes);
		let state = serde_path_to_error::deserialize(de).map_err(|e| self.corrupt(e.to_string()))?;

		Ok(Some(state))
	}

	fn save(&self, state: &TokenState) -> Result<()> {
		let mut bytes = serde_json::to_vec_pretty(state).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize token state: {e}"),
		})?;

		bytes.push(b'\n');
		atomic::write_atomic(&self.path, &bytes)?;

		Ok(())
	}

	fn location(&self) -> &Path {
		&self.path
	}
}
