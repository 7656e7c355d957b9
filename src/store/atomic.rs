//! Write-to-temp, fsync, rename replacement shared by the token cache, data sinks, and the env
//! file.

// std
use std::{
	ffi::OsString,
	fs::{self, File},
	io::Write,
	process,
	sync::atomic::{AtomicU64, Ordering},
};
// self
use crate::{_prelude::*, store::StoreError};

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Atomically replaces `path` with `bytes`.
///
/// The payload is written to a temp file next to the target, synced, then renamed over the
/// target. Temp names are unique per process and call, so concurrent writers never share one.
/// A failure at any step removes the temp file and leaves the previous target untouched.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
	ensure_parent_exists(path)?;

	let tmp_path = tmp_path_for(path);
	let replaced = write_synced(&tmp_path, bytes).and_then(|()| {
		fs::rename(&tmp_path, path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", path.display()),
		})
	});

	if replaced.is_err() {
		let _ = fs::remove_file(&tmp_path);
	}

	replaced
}

fn write_synced(tmp_path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
	let mut file = File::create(tmp_path).map_err(|e| StoreError::Backend {
		message: format!("Failed to create {}: {e}", tmp_path.display()),
	})?;

	file.write_all(bytes).map_err(|e| StoreError::Backend {
		message: format!("Failed to write {}: {e}", tmp_path.display()),
	})?;
	file.sync_all().map_err(|e| StoreError::Backend {
		message: format!("Failed to sync {}: {e}", tmp_path.display()),
	})
}

/// Creates the parent directory of `path` when it does not exist yet.
pub(crate) fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
			message: format!("Failed to create directory {}: {e}", parent.display()),
		})?;
	}

	Ok(())
}

/// Returns a fresh sibling temp path for `path` (`name.json` -> `name.json.<pid>.<seq>.tmp`).
pub(crate) fn tmp_path_for(path: &Path) -> PathBuf {
	let mut name = path.file_name().map(OsString::from).unwrap_or_default();

	name.push(format!(".{}.{}.tmp", process::id(), TMP_SEQ.fetch_add(1, Ordering::Relaxed)));

	path.with_file_name(name)
}
