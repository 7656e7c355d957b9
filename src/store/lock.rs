//! Cross-process advisory lock built on exclusive creation of a marker file.

// std
use std::{
	fs::{self, OpenOptions},
	io::{ErrorKind, Write},
	process,
	time::{Duration as StdDuration, Instant},
};
// self
use crate::{
	_prelude::*,
	store::{StoreError, atomic},
};

/// Advisory lock guarding every read-modify-write of a token cache or data table.
///
/// Holding the lock means the marker file exists and was created by this handle. Waiters poll
/// at a fixed interval and give up with [`Error::LockTimeout`].
#[derive(Clone, Debug)]
pub struct FileLock {
	path: PathBuf,
	timeout: StdDuration,
	poll_interval: StdDuration,
}
impl FileLock {
	/// Default time to wait for the marker before failing.
	pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(60);
	/// Default delay between creation attempts.
	pub const DEFAULT_POLL_INTERVAL: StdDuration = StdDuration::from_millis(200);

	/// Creates a lock handle for the marker at `path`.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			timeout: Self::DEFAULT_TIMEOUT,
			poll_interval: Self::DEFAULT_POLL_INTERVAL,
		}
	}

	/// Overrides the acquisition timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the polling interval.
	pub fn with_poll_interval(mut self, poll_interval: StdDuration) -> Self {
		self.poll_interval = poll_interval;

		self
	}

	/// Marker file path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Configured acquisition timeout.
	pub fn timeout(&self) -> StdDuration {
		self.timeout
	}

	/// Makes a single attempt; `Ok(None)` means another holder owns the marker.
	pub fn try_acquire(&self) -> Result<Option<LockGuard>, StoreError> {
		atomic::ensure_parent_exists(&self.path)?;

		match OpenOptions::new().write(true).create_new(true).open(&self.path) {
			Ok(mut file) => {
				// Informational only.
				let _ = write!(file, "{}", process::id());

				Ok(Some(LockGuard { path: self.path.clone(), held: true }))
			},
			Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
			Err(e) => Err(StoreError::Backend {
				message: format!("Failed to create lock {}: {e}", self.path.display()),
			}),
		}
	}

	/// Waits for the marker, polling until the timeout elapses.
	pub async fn acquire(&self) -> Result<LockGuard> {
		let started = Instant::now();
		let mut announced = false;

		loop {
			if let Some(guard) = self.try_acquire()? {
				if announced {
					tracing::debug!(
						lock = %self.path.display(),
						waited_ms = started.elapsed().as_millis() as u64,
						"lock acquired after waiting"
					);
				}

				return Ok(guard);
			}

			let waited = started.elapsed();

			if waited >= self.timeout {
				tracing::warn!(lock = %self.path.display(), ?waited, "lock wait timed out");

				return Err(Error::LockTimeout { path: self.path.clone(), waited });
			}
			if !announced {
				tracing::debug!(lock = %self.path.display(), "lock busy, waiting");

				announced = true;
			}

			tokio::time::sleep(self.poll_interval.min(self.timeout - waited)).await;
		}
	}
}

/// Scoped ownership of a [`FileLock`]; the marker is removed on drop.
#[derive(Debug)]
pub struct LockGuard {
	path: PathBuf,
	held: bool,
}
impl LockGuard {
	/// Releases the lock now instead of at end of scope.
	pub fn release(mut self) {
		self.remove_marker();
	}

	fn remove_marker(&mut self) {
		if std::mem::take(&mut self.held) {
			// Best effort; a missing marker already means released.
			let _ = fs::remove_file(&self.path);
		}
	}
}
impl Drop for LockGuard {
	fn drop(&mut self) {
		self.remove_marker();
	}
}
