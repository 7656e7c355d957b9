//! Process configuration: the environment merged with a `.env` file.
//!
//! Values from the `.env` file take precedence over the process environment. The process
//! environment itself is never modified; everything is read through [`Settings`].

// std
use std::{env, fs, io::ErrorKind, time::Duration as StdDuration};
// self
use crate::{
	_prelude::*,
	auth::{AccountId, ClientId, Credential},
	error::ConfigError,
	flows::{BootstrapSeed, SeedPolicy, TokenManager},
	provider::ProviderKind,
	store::{FileLock, StoreError, write_atomic},
};

/// Data directory key.
pub const DATA_DIR_KEY: &str = "LIFEOPS_DATA_DIR";
/// Lock timeout key, in whole seconds.
pub const LOCK_TIMEOUT_KEY: &str = "LIFEOPS_LOCK_TIMEOUT_SECS";
/// Seed policy key.
pub const SEED_POLICY_KEY: &str = "LIFEOPS_SEED_POLICY";
/// Data directory used when [`DATA_DIR_KEY`] is unset.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Flat key/value view over the process environment and the `.env` file.
#[derive(Clone, Debug, Default)]
pub struct Settings {
	vars: BTreeMap<String, String>,
}
impl Settings {
	/// Reads the process environment, then overlays `env_file` when it exists.
	pub fn load(env_file: &Path) -> Result<Self, ConfigError> {
		let mut settings = Self::from_vars(
			env::vars_os().filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
		);

		settings.overlay_env_file(env_file)?;

		Ok(settings)
	}

	/// Builds settings from explicit pairs.
	pub fn from_vars<I, K, V>(vars: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self { vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
	}

	/// Overlays the pairs found in `path`; a missing file is not an error.
	pub fn overlay_env_file(&mut self, path: &Path) -> Result<(), ConfigError> {
		let read_error = |source| ConfigError::DotenvRead { path: path.to_path_buf(), source };
		let iter = match dotenvy::from_path_iter(path) {
			Ok(iter) => iter,
			Err(e) if e.not_found() => {
				tracing::debug!(path = %path.display(), "no env file; using process environment");

				return Ok(());
			},
			Err(e) => return Err(read_error(e)),
		};

		for item in iter {
			let (key, value) = item.map_err(read_error)?;

			self.vars.insert(key, value);
		}

		Ok(())
	}

	/// Sets one value, replacing any previous one.
	pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.vars.insert(key.into(), value.into());
	}

	/// Returns the trimmed value of `key`; blank values count as unset.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
	}

	/// Returns the value of `key` or [`ConfigError::MissingKey`].
	pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
		self.get(key).ok_or_else(|| ConfigError::MissingKey { key: key.into() })
	}

	/// Directory holding token caches, lock markers, and data tables.
	pub fn data_dir(&self) -> PathBuf {
		PathBuf::from(self.get(DATA_DIR_KEY).unwrap_or(DEFAULT_DATA_DIR))
	}

	/// How long to wait for a provider's token lock.
	pub fn lock_timeout(&self) -> Result<StdDuration, ConfigError> {
		let Some(raw) = self.get(LOCK_TIMEOUT_KEY) else {
			return Ok(FileLock::DEFAULT_TIMEOUT);
		};
		let secs = raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
			key: LOCK_TIMEOUT_KEY.into(),
			reason: e.to_string(),
		})?;

		Ok(StdDuration::from_secs(secs))
	}

	/// Reaction to a changed bootstrap refresh token.
	pub fn seed_policy(&self) -> Result<SeedPolicy, ConfigError> {
		self.get(SEED_POLICY_KEY)
			.map(str::parse::<SeedPolicy>)
			.transpose()
			.map(Option::unwrap_or_default)
	}

	/// Resolves the client credential and bootstrap secret of one provider.
	pub fn provider(&self, kind: ProviderKind) -> Result<ProviderConfig, ConfigError> {
		let keys = ProviderKeys::new(kind);
		let client_id = ClientId::new(self.require(&keys.client_id)?).map_err(|e| {
			ConfigError::InvalidValue { key: keys.client_id.clone(), reason: e.to_string() }
		})?;
		let credential = Credential::new(client_id, self.require(&keys.client_secret)?);
		let mut bootstrap = BootstrapSeed::new(&keys.refresh_token);

		if let Some(token) = self.get(&keys.refresh_token) {
			bootstrap = bootstrap.with_refresh_token(token);
		}
		if let Some(user) = self.get(&keys.user_id) {
			let account = AccountId::new(user).map_err(|e| ConfigError::InvalidValue {
				key: keys.user_id.clone(),
				reason: e.to_string(),
			})?;

			bootstrap = bootstrap.with_account_id(account);
		}

		let redirect_uri = self
			.get(&keys.redirect_uri)
			.map(|raw| {
				Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { value: raw.into(), source })
			})
			.transpose()?;

		Ok(ProviderConfig { kind, keys, credential, bootstrap, redirect_uri })
	}

	/// Builds the token manager of one provider with its files under `data_dir`.
	pub fn manager(&self, kind: ProviderKind, data_dir: &Path) -> Result<TokenManager, ConfigError> {
		let provider = self.provider(kind)?;
		let manager = TokenManager::for_provider(kind, provider.credential, data_dir)?
			.with_bootstrap(provider.bootstrap)
			.with_seed_policy(self.seed_policy()?)
			.with_lock_timeout(self.lock_timeout()?);

		Ok(manager)
	}
}

/// Configuration key names of one provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderKeys {
	/// `<P>_CLIENT_ID`.
	pub client_id: String,
	/// `<P>_CLIENT_SECRET`.
	pub client_secret: String,
	/// `<P>_REFRESH_TOKEN`.
	pub refresh_token: String,
	/// `<P>_USER_ID`.
	pub user_id: String,
	/// `<P>_REDIRECT_URI`.
	pub redirect_uri: String,
}
impl ProviderKeys {
	/// Derives the key names from the provider's prefix.
	pub fn new(kind: ProviderKind) -> Self {
		let prefix = kind.env_prefix();

		Self {
			client_id: format!("{prefix}_CLIENT_ID"),
			client_secret: format!("{prefix}_CLIENT_SECRET"),
			refresh_token: format!("{prefix}_REFRESH_TOKEN"),
			user_id: format!("{prefix}_USER_ID"),
			redirect_uri: format!("{prefix}_REDIRECT_URI"),
		}
	}
}

/// Resolved configuration of one provider.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
	/// Provider the values belong to.
	pub kind: ProviderKind,
	/// Key names the values were read from.
	pub keys: ProviderKeys,
	/// Client credential.
	pub credential: Credential,
	/// Bootstrap refresh token and account id, when configured.
	pub bootstrap: BootstrapSeed,
	/// Redirect URI registered with the provider, when configured.
	pub redirect_uri: Option<Url>,
}

/// Sets `key=value` in the env file at `path`, keeping every other line intact.
///
/// The first line assigning `key` is replaced; otherwise the pair is appended. The file is
/// created when missing and replaced atomically.
pub fn update_env_file(path: &Path, key: &str, value: &str) -> Result<()> {
	let existing = match fs::read_to_string(path) {
		Ok(contents) => contents,
		Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
		Err(e) => {
			return Err(StoreError::Backend {
				message: format!("Failed to read {}: {e}", path.display()),
			}
			.into());
		},
	};
	let assignment = format!("{key}={value}");
	let prefix = format!("{key}=");
	let mut found = false;
	let mut lines = Vec::new();

	for line in existing.lines() {
		if !found && line.trim_start().starts_with(&prefix) {
			lines.push(assignment.clone());

			found = true;
		} else {
			lines.push(line.to_owned());
		}
	}

	if !found {
		lines.push(assignment);
	}

	let mut contents = lines.join("\n");

	contents.push('\n');

	write_atomic(path, contents.as_bytes())?;

	tracing::debug!(path = %path.display(), key, "env file updated");

	Ok(())
}
