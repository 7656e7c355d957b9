//! Token endpoint client: refresh and authorization-code exchanges.
//!
//! Requests are plain form POSTs so the raw status and body are always available for
//! classification. Provider dialects (extra form fields, response envelopes) are delegated to
//! [`ProviderStrategy`].

// crates.io
use reqwest::header::ACCEPT;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	api::lenient_i64,
	auth::{AccountId, Credential, TokenGrant, TokenSecret},
	error::TransportError,
	http::ReqwestHttpClient,
	provider::{
		ClientAuthMethod, GrantType, ProviderDescriptor, ProviderErrorContext, ProviderStrategy,
	},
};

const ENDPOINT: &str = "token endpoint";

/// Token endpoint reply after the provider dialect has been decoded.
#[derive(Clone, Debug)]
pub enum TokenReply {
	/// The provider issued tokens; fields still need validation.
	Issued(RawTokenResponse),
	/// The provider refused the request.
	Rejected {
		/// HTTP status, or the provider envelope status.
		status: u16,
		/// Raw response body.
		body: String,
	},
}

/// Loosely typed token payload as providers actually send it.
///
/// `expires_in` and the account id arrive as numbers or strings depending on the provider, so
/// both are kept as JSON values until [`RawTokenResponse::into_grant`].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawTokenResponse {
	/// Issued access token.
	#[serde(default)]
	pub access_token: Option<String>,
	/// Rotated refresh token.
	#[serde(default)]
	pub refresh_token: Option<String>,
	/// Lifetime of the access token in seconds.
	#[serde(default)]
	pub expires_in: Option<Value>,
	/// Provider user id (`user_id` for Fitbit, `userid` for Withings).
	#[serde(default, alias = "userid")]
	pub user_id: Option<Value>,
	/// Granted scopes.
	#[serde(default)]
	pub scope: Option<String>,
	/// Token type, usually `Bearer`.
	#[serde(default)]
	pub token_type: Option<String>,
}
impl RawTokenResponse {
	/// Validates the payload; both secrets must be present and non-blank.
	pub fn into_grant(self) -> Result<TokenGrant> {
		let access_token = self
			.access_token
			.and_then(TokenSecret::non_blank)
			.ok_or(Error::IncompleteRefreshResponse { field: "access_token" })?;
		let refresh_token = self
			.refresh_token
			.and_then(TokenSecret::non_blank)
			.ok_or(Error::IncompleteRefreshResponse { field: "refresh_token" })?;
		let expires_in = self.expires_in.as_ref().and_then(lenient_i64).and_then(|secs| {
			if secs > 0 { Some(Duration::seconds(secs)) } else { None }
		});
		let account_id = self.user_id.as_ref().and_then(AccountId::from_json);

		Ok(TokenGrant { access_token, refresh_token, expires_in, account_id, scope: self.scope })
	}
}

/// Borrowed view of everything needed to call one provider's token endpoint.
#[derive(Clone, Copy)]
pub struct TokenEndpoint<'a> {
	descriptor: &'a ProviderDescriptor,
	strategy: &'a dyn ProviderStrategy,
	credential: &'a Credential,
	http_client: &'a ReqwestHttpClient,
}
impl<'a> TokenEndpoint<'a> {
	/// Bundles the descriptor, strategy, credential, and client for a token call.
	pub fn new(
		descriptor: &'a ProviderDescriptor,
		strategy: &'a dyn ProviderStrategy,
		credential: &'a Credential,
		http_client: &'a ReqwestHttpClient,
	) -> Self {
		Self { descriptor, strategy, credential, http_client }
	}

	/// Redeems `refresh_token` for a new access/refresh pair.
	///
	/// The presented refresh token is dead after a successful call; callers must persist the
	/// returned grant before doing anything that can fail.
	pub async fn refresh(&self, refresh_token: &TokenSecret) -> Result<TokenGrant> {
		let mut form = BTreeMap::new();

		form.insert("refresh_token".to_owned(), refresh_token.expose().to_owned());

		match self.request(GrantType::RefreshToken, form).await? {
			TokenReply::Issued(raw) => raw.into_grant(),
			TokenReply::Rejected { status, body } => {
				let ctx = ProviderErrorContext::from_rejection(GrantType::RefreshToken, status, &body);
				let kind = self.strategy.classify_token_error(&ctx);

				tracing::warn!(
					provider = %self.descriptor.id,
					status,
					kind = kind.as_str(),
					"token endpoint rejected the refresh"
				);

				Err(Error::RefreshRejected { status, body, kind })
			},
		}
	}

	/// Exchanges an authorization code obtained through the bootstrap flow.
	pub async fn exchange_code(
		&self,
		code: &str,
		redirect_uri: &Url,
		pkce_verifier: Option<&str>,
	) -> Result<TokenGrant> {
		let mut form = BTreeMap::new();

		form.insert("code".to_owned(), code.to_owned());
		form.insert("redirect_uri".to_owned(), redirect_uri.to_string());

		if let Some(verifier) = pkce_verifier {
			form.insert("code_verifier".to_owned(), verifier.to_owned());
		}

		match self.request(GrantType::AuthorizationCode, form).await? {
			TokenReply::Issued(raw) => raw.into_grant(),
			TokenReply::Rejected { status, body } => Err(Error::AuthorizationRejected { status, body }),
		}
	}

	async fn request(
		&self,
		grant: GrantType,
		mut form: BTreeMap<String, String>,
	) -> Result<TokenReply> {
		let client_id = self.credential.client_id.as_ref();
		let client_secret = self.credential.client_secret.expose();

		form.insert("grant_type".to_owned(), grant.as_str().to_owned());

		if self.descriptor.preferred_client_auth_method == ClientAuthMethod::ClientSecretPost {
			form.insert("client_id".to_owned(), client_id.to_owned());
			form.insert("client_secret".to_owned(), client_secret.to_owned());
		}

		self.strategy.augment_token_request(grant, &mut form);

		let mut request = self
			.http_client
			.post(self.descriptor.endpoints.token.clone())
			.header(ACCEPT, "application/json")
			.form(&form);

		if self.descriptor.preferred_client_auth_method == ClientAuthMethod::ClientSecretBasic {
			request = request.basic_auth(client_id, Some(client_secret));
		}

		let response =
			request.send().await.map_err(|e| TransportError::network(ENDPOINT, e))?;
		let status = response.status().as_u16();
		let body = response.text().await.map_err(|e| TransportError::network(ENDPOINT, e))?;

		self.strategy
			.decode_token_reply(status, &body)
			.map_err(|source| Error::MalformedResponse { endpoint: ENDPOINT, source })
	}
}
impl Debug for TokenEndpoint<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenEndpoint")
			.field("provider", &self.descriptor.id)
			.field("token_url", &self.descriptor.endpoints.token.as_str())
			.field("client_id", &self.credential.client_id)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn raw(body: &str) -> RawTokenResponse {
		serde_json::from_str(body).expect("Fixture payload should decode.")
	}

	#[test]
	fn fitbit_payload_becomes_grant() {
		let grant = raw(
			r#"{"access_token":"T1","refresh_token":"abc2","expires_in":3600,"user_id":"U1","scope":"heartrate sleep","token_type":"Bearer"}"#,
		)
		.into_grant()
		.expect("Complete payload should validate.");

		assert_eq!(grant.access_token.expose(), "T1");
		assert_eq!(grant.refresh_token.expose(), "abc2");
		assert_eq!(grant.expires_in, Some(Duration::hours(1)));
		assert_eq!(grant.account_id.as_deref(), Some("U1"));
	}

	#[test]
	fn numeric_userid_and_string_expiry_are_accepted() {
		let grant = raw(r#"{"access_token":"a","refresh_token":"r","expires_in":"10800","userid":363}"#)
			.into_grant()
			.expect("Payload should validate.");

		assert_eq!(grant.expires_in, Some(Duration::seconds(10_800)));
		assert_eq!(grant.account_id.as_deref(), Some("363"));
	}

	#[test]
	fn missing_or_blank_secrets_are_incomplete() {
		let err = raw(r#"{"access_token":"T1","expires_in":3600}"#)
			.into_grant()
			.expect_err("Missing refresh token must be rejected.");

		assert!(matches!(err, Error::IncompleteRefreshResponse { field: "refresh_token" }));

		let err = raw(r#"{"access_token":"  ","refresh_token":"r"}"#)
			.into_grant()
			.expect_err("Blank access token must be rejected.");

		assert!(matches!(err, Error::IncompleteRefreshResponse { field: "access_token" }));
	}

	#[test]
	fn non_positive_expiry_is_dropped() {
		let grant = raw(r#"{"access_token":"a","refresh_token":"r","expires_in":0}"#)
			.into_grant()
			.expect("Payload should validate.");

		assert!(grant.expires_in.is_none());
		assert!(grant.account_id.is_none());
	}
}
