//! Built-in providers and their fixed endpoints, scopes, and file names.

// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	error::ConfigError,
	provider::{
		ClientAuthMethod, DefaultProviderStrategy, ProviderDescriptor, ProviderQuirks,
		ProviderStrategy, WithingsStrategy,
	},
};

const FITBIT_AUTHORIZE_URL: &str = "https://www.fitbit.com/oauth2/authorize";
const FITBIT_TOKEN_URL: &str = "https://api.fitbit.com/oauth2/token";
const FITBIT_API_BASE: &str = "https://api.fitbit.com/";
const FITBIT_SCOPES: [&str; 5] = ["activity", "heartrate", "profile", "sleep", "weight"];
const WITHINGS_AUTHORIZE_URL: &str = "https://account.withings.com/oauth2_user/authorize2";
const WITHINGS_TOKEN_URL: &str = "https://wbsapi.withings.net/v2/oauth2";
const WITHINGS_API_BASE: &str = "https://wbsapi.withings.net/";
const WITHINGS_SCOPES: [&str; 2] = ["user.metrics", "user.activity"];

/// Providers this crate knows how to authenticate against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
	/// Fitbit Web API.
	Fitbit,
	/// Withings Public API.
	Withings,
}
impl ProviderKind {
	/// Every built-in provider.
	pub const ALL: [ProviderKind; 2] = [ProviderKind::Fitbit, ProviderKind::Withings];

	/// Lowercase label used in file names and logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Fitbit => "fitbit",
			Self::Withings => "withings",
		}
	}

	/// Prefix of this provider's configuration keys (`FITBIT_CLIENT_ID`, ...).
	pub const fn env_prefix(self) -> &'static str {
		match self {
			Self::Fitbit => "FITBIT",
			Self::Withings => "WITHINGS",
		}
	}

	/// Token cache file name inside the data directory.
	pub fn cache_file_name(self) -> String {
		format!("{}_token.json", self.as_str())
	}

	/// Lock marker file name inside the data directory.
	pub fn lock_file_name(self) -> String {
		format!(".{}_token.lock", self.as_str())
	}

	/// Builds the production descriptor for this provider.
	pub fn descriptor(self) -> Result<ProviderDescriptor, ConfigError> {
		let (authorize, token, api, scopes, auth_method, delimiter) =
			match self {
				Self::Fitbit => (
					FITBIT_AUTHORIZE_URL,
					FITBIT_TOKEN_URL,
					FITBIT_API_BASE,
					&FITBIT_SCOPES[..],
					ClientAuthMethod::ClientSecretBasic,
					' ',
				),
				Self::Withings => (
					WITHINGS_AUTHORIZE_URL,
					WITHINGS_TOKEN_URL,
					WITHINGS_API_BASE,
					&WITHINGS_SCOPES[..],
					ClientAuthMethod::ClientSecretPost,
					',',
				),
			};
		let id = ProviderId::new(self.as_str()).map_err(|e| ConfigError::InvalidValue {
			key: "provider".into(),
			reason: e.to_string(),
		})?;
		let descriptor = ProviderDescriptor::builder(id)
			.authorization_endpoint(parse_url(authorize)?)
			.token_endpoint(parse_url(token)?)
			.api_base(parse_url(api)?)
			.scopes(scopes.iter().copied())
			.preferred_client_auth_method(auth_method)
			.quirks(ProviderQuirks { scope_delimiter: delimiter, ..Default::default() })
			.build()?;

		Ok(descriptor)
	}

	/// Returns the strategy that knows this provider's token endpoint dialect.
	pub fn strategy(self) -> Arc<dyn ProviderStrategy> {
		match self {
			Self::Fitbit => Arc::new(DefaultProviderStrategy),
			Self::Withings => Arc::new(WithingsStrategy),
		}
	}
}
impl Display for ProviderKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { value: raw.into(), source })
}
