//! Fixed client identity used against a provider's token endpoint.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, TokenSecret},
};

/// Client identifier and secret loaded once per process from configuration.
///
/// The credential is never persisted by the token cache.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
	/// OAuth 2.0 client identifier.
	pub client_id: ClientId,
	/// Confidential client secret.
	pub client_secret: TokenSecret,
}
impl Credential {
	/// Builds a credential from its raw parts.
	pub fn new(client_id: ClientId, client_secret: impl Into<String>) -> Self {
		Self { client_id, client_secret: TokenSecret::new(client_secret) }
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.finish()
	}
}
