//! Token lifecycle orchestration for one provider.

pub mod bootstrap;
pub mod refresh;
pub mod seed;

pub use bootstrap::*;
pub use refresh::*;
pub use seed::*;

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	auth::{AccountId, Credential, TokenSecret},
	error::ConfigError,
	http::ReqwestHttpClient,
	oauth::TokenEndpoint,
	provider::{ProviderDescriptor, ProviderKind, ProviderStrategy},
	store::{FileCache, FileLock, TokenStore},
};

/// How a loaded cache reacts to a bootstrap refresh token that differs from the one it was
/// seeded from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SeedPolicy {
	/// Seed only when no cache exists; later bootstrap changes are ignored.
	Once,
	/// Reseed and force a refresh when the configured bootstrap token changes.
	#[default]
	ReseedOnChange,
}
impl SeedPolicy {
	/// Returns the configuration spelling of the policy.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Once => "once",
			Self::ReseedOnChange => "reseed-on-change",
		}
	}
}
impl FromStr for SeedPolicy {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
			"once" => Ok(Self::Once),
			"reseed-on-change" => Ok(Self::ReseedOnChange),
			other => Err(ConfigError::InvalidValue {
				key: "LIFEOPS_SEED_POLICY".into(),
				reason: format!("expected `once` or `reseed-on-change`, got `{other}`"),
			}),
		}
	}
}
impl Display for SeedPolicy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Tunables for the lifecycle manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManagerOptions {
	/// An access token expiring within this window is refreshed before use.
	pub safety_margin: Duration,
	/// Reaction to a changed bootstrap token.
	pub seed_policy: SeedPolicy,
}
impl ManagerOptions {
	/// Default refresh safety margin.
	pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::minutes(2);
}
impl Default for ManagerOptions {
	fn default() -> Self {
		Self { safety_margin: Self::DEFAULT_SAFETY_MARGIN, seed_policy: SeedPolicy::default() }
	}
}

/// Externally configured secret the cache is seeded from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BootstrapSeed {
	/// Configuration key the refresh token is read from, for error messages.
	pub key: String,
	/// Bootstrap refresh token, when configured.
	pub refresh_token: Option<TokenSecret>,
	/// Bootstrap account id, when configured.
	pub account_id: Option<AccountId>,
}
impl BootstrapSeed {
	/// Creates an empty seed that reports `key` when the token is needed.
	pub fn new(key: impl Into<String>) -> Self {
		Self { key: key.into(), refresh_token: None, account_id: None }
	}

	/// Sets the bootstrap refresh token; blank values count as unset.
	pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = TokenSecret::non_blank(token);

		self
	}

	/// Sets the bootstrap account id.
	pub fn with_account_id(mut self, account_id: AccountId) -> Self {
		self.account_id = Some(account_id);

		self
	}
}

/// The single authority answering "give me a currently valid access token and account id".
///
/// The manager owns the provider descriptor, strategy, credential, token store, and the
/// cross-process lock. Every operation that reads or writes the token cache runs inside an
/// in-process single-flight guard (shared by clones) and then inside the file lock, so
/// concurrent tasks queue in memory and concurrent processes queue on the marker file.
#[derive(Clone)]
pub struct TokenManager {
	/// Provider descriptor that defines OAuth endpoints and quirks.
	pub descriptor: ProviderDescriptor,
	/// Strategy responsible for provider-specific token request adjustments.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// Client credential presented to the token endpoint.
	pub credential: Credential,
	/// Bootstrap secret used when the cache is missing or reseeded.
	pub bootstrap: BootstrapSeed,
	/// Durable token state.
	pub store: Arc<dyn TokenStore>,
	/// Cross-process lock guarding `store`.
	pub lock: FileLock,
	/// Tunables.
	pub options: ManagerOptions,
	/// HTTP client used for token endpoint calls.
	pub http_client: ReqwestHttpClient,
	/// Shared counters for lifecycle outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	guard: Arc<AsyncMutex<()>>,
}
impl TokenManager {
	/// Creates a manager that reuses the caller-provided HTTP client.
	pub fn with_http_client(
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		credential: Credential,
		store: Arc<dyn TokenStore>,
		lock: FileLock,
		http_client: ReqwestHttpClient,
	) -> Self {
		let bootstrap =
			BootstrapSeed::new(format!("{}_REFRESH_TOKEN", descriptor.id.to_ascii_uppercase()));

		Self {
			descriptor,
			strategy,
			credential,
			bootstrap,
			store,
			lock,
			options: ManagerOptions::default(),
			http_client,
			refresh_metrics: Default::default(),
			guard: Arc::new(AsyncMutex::new(())),
		}
	}

	/// Creates a manager for a built-in provider with its cache and lock under `data_dir`.
	pub fn for_provider(
		kind: ProviderKind,
		credential: Credential,
		data_dir: &Path,
	) -> Result<Self, ConfigError> {
		let store = Arc::new(FileCache::new(data_dir.join(kind.cache_file_name())));
		let lock = FileLock::new(data_dir.join(kind.lock_file_name()));

		Ok(Self::with_http_client(
			kind.descriptor()?,
			kind.strategy(),
			credential,
			store,
			lock,
			ReqwestHttpClient::new()?,
		))
	}

	/// Sets the bootstrap secret.
	pub fn with_bootstrap(mut self, bootstrap: BootstrapSeed) -> Self {
		self.bootstrap = bootstrap;

		self
	}

	/// Replaces all tunables.
	pub fn with_options(mut self, options: ManagerOptions) -> Self {
		self.options = options;

		self
	}

	/// Overrides the refresh safety margin (negative values clamp to zero).
	pub fn with_safety_margin(mut self, margin: Duration) -> Self {
		self.options.safety_margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}

	/// Overrides the seed policy.
	pub fn with_seed_policy(mut self, policy: SeedPolicy) -> Self {
		self.options.seed_policy = policy;

		self
	}

	/// Overrides how long to wait for the token lock.
	pub fn with_lock_timeout(mut self, timeout: StdDuration) -> Self {
		self.lock = self.lock.with_timeout(timeout);

		self
	}

	pub(crate) fn token_endpoint(&self) -> TokenEndpoint<'_> {
		TokenEndpoint::new(
			&self.descriptor,
			self.strategy.as_ref(),
			&self.credential,
			&self.http_client,
		)
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("descriptor", &self.descriptor.id)
			.field("client_id", &self.credential.client_id)
			.field("cache", &self.store.location())
			.field("lock", &self.lock.path())
			.field("options", &self.options)
			.field("bootstrap_configured", &self.bootstrap.refresh_token.is_some())
			.finish()
	}
}
