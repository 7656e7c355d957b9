//! Provider descriptor data structures and helpers shared by all flows.

/// Builder API for assembling provider descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, auth::ProviderId};

/// Grants this crate sends to provider token endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Exchanges the code returned by the one-off authorization bootstrap.
	AuthorizationCode,
	/// Redeems the single-use refresh token; sent on every rotation.
	RefreshToken,
}
impl GrantType {
	/// Value of the `grant_type` form field.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AuthorizationCode => "authorization_code",
			Self::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Per-provider deviations from plain OAuth 2.0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderQuirks {
	/// Send an S256 PKCE challenge with the authorization request.
	pub pkce: bool,
	/// Joins scopes in the `scope` parameter (Fitbit: space, Withings: comma).
	pub scope_delimiter: char,
}
impl Default for ProviderQuirks {
	fn default() -> Self {
		Self { pkce: false, scope_delimiter: ' ' }
	}
}

/// Preferred client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderEndpoints {
	/// Authorization endpoint used by the bootstrap flow.
	pub authorization: Url,
	/// Token endpoint used for code exchanges and refreshes.
	pub token: Url,
	/// Base URL of the provider's data API.
	pub api: Url,
}

/// Immutable provider descriptor consumed by flows and API clients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderDescriptor {
	/// Descriptor identifier.
	pub id: ProviderId,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Preferred client authentication mechanism.
	pub preferred_client_auth_method: ClientAuthMethod,
	/// Scopes requested during authorization.
	pub scopes: Vec<String>,
	/// Provider-specific quirks.
	pub quirks: ProviderQuirks,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id)
	}

	/// Joins the requested scopes with the provider's delimiter.
	pub fn scope_param(&self) -> Option<String> {
		if self.scopes.is_empty() {
			return None;
		}

		let mut buf = String::new();

		for (idx, scope) in self.scopes.iter().enumerate() {
			if idx > 0 {
				buf.push(self.quirks.scope_delimiter);
			}

			buf.push_str(scope);
		}

		Some(buf)
	}

	/// Resolves `path` against the data API base URL.
	pub fn api_url(&self, path: &str) -> Result<Url, crate::error::ConfigError> {
		self.endpoints.api.join(path).map_err(|source| crate::error::ConfigError::InvalidUrl {
			value: format!("{}{path}", self.endpoints.api),
			source,
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn descriptor(delimiter: char) -> ProviderDescriptor {
		ProviderDescriptor::builder(
			ProviderId::new("demo").expect("Provider id fixture should be valid."),
		)
		.authorization_endpoint(
			Url::parse("https://example.com/authorize").expect("Fixture URL should parse."),
		)
		.token_endpoint(Url::parse("https://example.com/token").expect("Fixture URL should parse."))
		.api_base(Url::parse("https://api.example.com/").expect("Fixture URL should parse."))
		.scopes(["user.metrics", "user.activity"])
		.quirks(ProviderQuirks { scope_delimiter: delimiter, ..Default::default() })
		.build()
		.expect("Descriptor fixture should build.")
	}

	#[test]
	fn scope_param_uses_delimiter() {
		assert_eq!(descriptor(',').scope_param(), Some("user.metrics,user.activity".into()));
		assert_eq!(descriptor(' ').scope_param(), Some("user.metrics user.activity".into()));
	}

	#[test]
	fn api_url_joins_relative_paths() {
		let url = descriptor(' ')
			.api_url("1/user/U1/activities/heart/date/2025-03-01/2025-03-02.json")
			.expect("Path should join.");

		assert_eq!(
			url.as_str(),
			"https://api.example.com/1/user/U1/activities/heart/date/2025-03-01/2025-03-02.json"
		);
	}
}
