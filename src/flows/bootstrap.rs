//! Interactive authorization bootstrap: authorize URL, redirect handling, and code exchange.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{AccessGrant, TokenGrant, TokenState},
	flows::TokenManager,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods surfaced via [`AuthorizationSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Authorization handshake metadata returned by [`TokenManager::start_authorization`].
#[derive(Clone)]
pub struct AuthorizationSession {
	/// Opaque state value that must round-trip via the redirect.
	pub state: String,
	/// Redirect URI supplied when constructing the authorize URL.
	pub redirect_uri: Url,
	/// Fully-formed authorize URL the user should open.
	pub authorize_url: Url,
	pkce: Option<PkcePair>,
}
impl AuthorizationSession {
	/// PKCE code challenge, when the provider uses PKCE.
	pub fn code_challenge(&self) -> Option<&str> {
		self.pkce.as_ref().map(|pkce| pkce.challenge.as_str())
	}

	/// Validates the returned `state` parameter after the authorization redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state { Ok(()) } else { Err(Error::StateMismatch) }
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri)
			.field("authorize_url", &self.authorize_url)
			.field("code_challenge", &self.code_challenge())
			.finish()
	}
}

/// Parameters the provider appends to the redirect URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationCallback {
	/// Authorization code to exchange.
	pub code: String,
	/// Returned `state` value.
	pub state: String,
}
impl AuthorizationCallback {
	/// Extracts `code` and `state` from the URL the browser was redirected to.
	///
	/// A provider-reported `error` becomes [`Error::AuthorizationDenied`].
	pub fn from_redirect(url: &Url) -> Result<Self> {
		let mut code = None;
		let mut state = None;
		let mut error = None;
		let mut description = None;

		for (key, value) in url.query_pairs() {
			match key.as_ref() {
				"code" => code = Some(value.into_owned()),
				"state" => state = Some(value.into_owned()),
				"error" => error = Some(value.into_owned()),
				"error_description" => description = Some(value.into_owned()),
				_ => {},
			}
		}

		if let Some(error) = error {
			let reason = match description {
				Some(description) => format!("{error}: {description}"),
				None => error,
			};

			return Err(Error::AuthorizationDenied { reason });
		}

		let code = code.filter(|c| !c.trim().is_empty()).ok_or_else(|| {
			Error::AuthorizationDenied { reason: "redirect carries no `code` parameter".into() }
		})?;
		let state = state.ok_or(Error::StateMismatch)?;

		Ok(Self { code, state })
	}
}

#[derive(Clone)]
struct PkcePair {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}

impl TokenManager {
	/// Builds the authorize URL for a new bootstrap session.
	pub fn start_authorization(&self, redirect_uri: Url) -> AuthorizationSession {
		let _span =
			FlowSpan::new(FlowKind::Authorize, "start_authorization", &self.descriptor.id).entered();
		let state = random_string(STATE_LEN);
		let pkce = self.descriptor.quirks.pkce.then(PkcePair::generate);
		let authorize_url = self.build_authorize_url(&redirect_uri, &state, pkce.as_ref());

		AuthorizationSession { state, redirect_uri, authorize_url, pkce }
	}

	/// Validates the redirect, exchanges the code, and installs the result as a fresh cache.
	pub async fn complete_authorization(
		&self,
		session: AuthorizationSession,
		redirect: &Url,
	) -> Result<(AccessGrant, TokenGrant)> {
		const KIND: FlowKind = FlowKind::Authorize;

		let span = FlowSpan::new(KIND, "complete_authorization", &self.descriptor.id);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let callback = AuthorizationCallback::from_redirect(redirect)?;

				session.validate_state(&callback.state)?;

				let grant = self
					.token_endpoint()
					.exchange_code(
						&callback.code,
						&session.redirect_uri,
						session.pkce.as_ref().map(|pkce| pkce.verifier.as_str()),
					)
					.await?;
				let access = self.install_grant(grant.clone()).await?;

				Ok((access, grant))
			})
			.await;

		obs::finish_flow(KIND, result)
	}

	/// Replaces the token cache with a freshly issued grant.
	///
	/// The new refresh token becomes the recorded bootstrap secret, so a configuration updated
	/// with the same value does not trigger a reseed. A corrupt cache is overwritten.
	pub async fn install_grant(&self, grant: TokenGrant) -> Result<AccessGrant> {
		let _singleflight = self.guard.lock().await;
		let _lock = self.lock.acquire().await?;
		let previous_account = match self.store.load() {
			Ok(state) => state.and_then(|state| state.account_id),
			Err(e @ Error::CacheCorrupt { .. }) => {
				tracing::warn!(error = %e, "overwriting unreadable token cache");

				None
			},
			Err(e) => return Err(e),
		};
		let state = TokenState::installed(
			grant,
			previous_account.or_else(|| self.bootstrap.account_id.clone()),
			OffsetDateTime::now_utc(),
		);

		self.store.save(&state)?;

		tracing::info!(
			provider = %self.descriptor.id,
			cache = %self.store.location().display(),
			"authorization grant installed"
		);

		state.access_grant()
	}

	fn build_authorize_url(&self, redirect_uri: &Url, state: &str, pkce: Option<&PkcePair>) -> Url {
		let mut url = self.descriptor.endpoints.authorization.clone();
		let mut pairs = url.query_pairs_mut();

		pairs.append_pair("response_type", "code");
		pairs.append_pair("client_id", self.credential.client_id.as_ref());
		pairs.append_pair("redirect_uri", redirect_uri.as_str());

		if let Some(scope_value) = self.descriptor.scope_param() {
			pairs.append_pair("scope", &scope_value);
		}

		pairs.append_pair("state", state);

		if let Some(pkce) = pkce {
			pairs.append_pair("code_challenge", &pkce.challenge);
			pairs.append_pair("code_challenge_method", pkce.method.as_str());
		}

		drop(pairs);

		url
	}
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	let digest = Sha256::digest(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn callback_extracts_code_and_state() {
		let url = Url::parse("http://localhost:8000/callback?code=c0de&state=xyz")
			.expect("Redirect fixture should parse.");
		let callback = AuthorizationCallback::from_redirect(&url).expect("Callback should parse.");

		assert_eq!(callback.code, "c0de");
		assert_eq!(callback.state, "xyz");
	}

	#[test]
	fn callback_reports_provider_errors() {
		let url = Url::parse(
			"http://localhost:8000/callback?error=access_denied&error_description=User+said+no",
		)
		.expect("Redirect fixture should parse.");
		let err = AuthorizationCallback::from_redirect(&url).expect_err("Error must surface.");

		assert!(matches!(err, Error::AuthorizationDenied { ref reason } if reason.contains("User said no")));
	}

	#[test]
	fn callback_without_state_is_a_mismatch() {
		let url = Url::parse("http://localhost:8000/callback?code=c0de")
			.expect("Redirect fixture should parse.");

		assert!(matches!(AuthorizationCallback::from_redirect(&url), Err(Error::StateMismatch)));
	}

	#[test]
	fn pkce_challenge_matches_rfc_example() {
		// RFC 7636 appendix B.
		assert_eq!(
			compute_pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
			"E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
		);
	}

	#[test]
	fn random_strings_are_alphanumeric() {
		let value = random_string(STATE_LEN);

		assert_eq!(value.len(), STATE_LEN);
		assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
	}
}
