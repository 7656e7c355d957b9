//! Persisted token state and the grants derived from it.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, TokenSecret},
};

/// Durable token document stored in the token cache.
///
/// Every field is optional so partially seeded documents (refresh token only) and documents
/// written by older tooling deserialize cleanly. Only the lifecycle manager mutates it, and only
/// while holding the token lock.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
	/// Current access token.
	#[serde(default)]
	pub access_token: Option<TokenSecret>,
	/// Current single-use refresh token.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
	/// Provider user id the API paths are scoped to.
	#[serde(default, alias = "user_id")]
	pub account_id: Option<AccountId>,
	/// Absolute expiry of `access_token`.
	#[serde(default, alias = "expires_at_utc", with = "time::serde::rfc3339::option")]
	pub expires_at: Option<OffsetDateTime>,
	/// When the state was last seeded from a bootstrap token.
	#[serde(default, alias = "seeded_at_utc", with = "time::serde::rfc3339::option")]
	pub seeded_at: Option<OffsetDateTime>,
	/// When the state was last rotated by a refresh.
	#[serde(default, alias = "refreshed_at_utc", with = "time::serde::rfc3339::option")]
	pub refreshed_at: Option<OffsetDateTime>,
	/// Fingerprint of the bootstrap refresh token this state descends from.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub bootstrap_fingerprint: Option<String>,
}
impl TokenState {
	/// Builds the initial state written when no cache exists yet.
	pub fn seeded(
		refresh_token: TokenSecret,
		account_id: Option<AccountId>,
		now: OffsetDateTime,
	) -> Self {
		Self {
			bootstrap_fingerprint: Some(refresh_token.fingerprint()),
			refresh_token: Some(refresh_token),
			account_id,
			seeded_at: Some(now),
			..Default::default()
		}
	}

	/// Builds a fully populated state from a freshly exchanged authorization grant.
	pub fn installed(
		grant: TokenGrant,
		fallback_account: Option<AccountId>,
		now: OffsetDateTime,
	) -> Self {
		let fingerprint = grant.refresh_token.fingerprint();
		let mut state = Self { account_id: fallback_account, ..Default::default() };

		state.rotate(grant, now);
		state.seeded_at = Some(now);
		state.bootstrap_fingerprint = Some(fingerprint);

		state
	}

	/// Replaces the refresh token with a new bootstrap secret and invalidates the access token.
	///
	/// A provided account id replaces the cached one; otherwise the cached one is kept.
	pub fn reseed(
		&mut self,
		refresh_token: TokenSecret,
		account_id: Option<AccountId>,
		now: OffsetDateTime,
	) {
		self.bootstrap_fingerprint = Some(refresh_token.fingerprint());
		self.refresh_token = Some(refresh_token);
		self.access_token = None;
		self.expires_at = None;
		self.seeded_at = Some(now);

		if account_id.is_some() {
			self.account_id = account_id;
		}
	}

	/// Returns why the access token must be refreshed, or `None` when it is still trusted.
	pub fn refresh_reason(&self, now: OffsetDateTime, margin: Duration) -> Option<RefreshReason> {
		if self.access_token.as_ref().is_none_or(TokenSecret::is_blank) {
			return Some(RefreshReason::MissingAccessToken);
		}

		let Some(expires_at) = self.expires_at else {
			return Some(RefreshReason::MissingExpiry);
		};

		match expires_at.checked_sub(margin) {
			Some(deadline) if now < deadline => None,
			_ => Some(RefreshReason::WithinMargin),
		}
	}

	/// Returns true when the access token is absent, undated, or within `margin` of expiry.
	pub fn needs_refresh(&self, now: OffsetDateTime, margin: Duration) -> bool {
		self.refresh_reason(now, margin).is_some()
	}

	/// Applies a successful refresh, replacing both secrets and the expiry.
	///
	/// The cached account id is kept when the provider omits one. A lifetime that does not fit
	/// in a timestamp leaves the expiry unset, so the next run refreshes again.
	pub fn rotate(&mut self, grant: TokenGrant, now: OffsetDateTime) {
		self.access_token = Some(grant.access_token);
		self.refresh_token = Some(grant.refresh_token);
		self.expires_at = grant.expires_in.and_then(|ttl| now.checked_add(ttl));
		self.refreshed_at = Some(now);

		if let Some(account_id) = grant.account_id {
			self.account_id = Some(account_id);
		}
	}

	/// Returns the usable access token and account id.
	pub fn access_grant(&self) -> Result<AccessGrant> {
		let access_token = self
			.access_token
			.clone()
			.filter(|secret| !secret.is_blank())
			.ok_or(Error::IncompleteRefreshResponse { field: "access_token" })?;
		let account_id = self.account_id.clone().ok_or(Error::MissingAccountId)?;

		Ok(AccessGrant { access_token, account_id, expires_at: self.expires_at })
	}
}

/// Why the lifecycle manager decided to contact the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshReason {
	/// No access token is cached.
	MissingAccessToken,
	/// An access token is cached without an expiry.
	MissingExpiry,
	/// The access token expires within the safety margin.
	WithinMargin,
	/// The caller asked for a refresh regardless of expiry.
	Forced,
}
impl RefreshReason {
	/// Returns a stable label for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::MissingAccessToken => "missing_access_token",
			Self::MissingExpiry => "missing_expiry",
			Self::WithinMargin => "within_margin",
			Self::Forced => "forced",
		}
	}
}
impl Display for RefreshReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Validated token endpoint answer for a refresh or code exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenGrant {
	/// New access token.
	pub access_token: TokenSecret,
	/// New refresh token; the previous one is dead once this is issued.
	pub refresh_token: TokenSecret,
	/// Access token lifetime, when the provider reported a positive one.
	pub expires_in: Option<Duration>,
	/// Provider user id, when the provider reported one.
	pub account_id: Option<AccountId>,
	/// Granted scope string, as reported.
	pub scope: Option<String>,
}

/// What callers receive from the lifecycle manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessGrant {
	/// Access token to present as a bearer credential.
	pub access_token: TokenSecret,
	/// Account the token belongs to.
	pub account_id: AccountId,
	/// Absolute expiry of the access token, when known.
	pub expires_at: Option<OffsetDateTime>,
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	const MARGIN: Duration = Duration::minutes(2);

	fn valid_state(expires_at: OffsetDateTime) -> TokenState {
		TokenState {
			access_token: Some(TokenSecret::new("T1")),
			refresh_token: Some(TokenSecret::new("abc2")),
			account_id: Some(AccountId::new("U1").expect("Account fixture should be valid.")),
			expires_at: Some(expires_at),
			..Default::default()
		}
	}

	#[test]
	fn seeded_state_requires_refresh() {
		let now = datetime!(2025-03-01 08:00 UTC);
		let state = TokenState::seeded(TokenSecret::new("abc"), None, now);

		assert_eq!(state.refresh_reason(now, MARGIN), Some(RefreshReason::MissingAccessToken));
		assert_eq!(state.seeded_at, Some(now));
		assert_eq!(state.bootstrap_fingerprint, Some(TokenSecret::new("abc").fingerprint()));
	}

	#[test]
	fn margin_boundary_is_inclusive() {
		let now = datetime!(2025-03-01 08:00 UTC);

		assert!(valid_state(now + Duration::seconds(90)).needs_refresh(now, MARGIN));
		assert!(valid_state(now + MARGIN).needs_refresh(now, MARGIN));
		assert!(!valid_state(now + Duration::seconds(300)).needs_refresh(now, MARGIN));
	}

	#[test]
	fn blank_access_token_or_missing_expiry_forces_refresh() {
		let now = datetime!(2025-03-01 08:00 UTC);
		let mut state = valid_state(now + Duration::hours(1));

		state.access_token = Some(TokenSecret::new(""));

		assert_eq!(state.refresh_reason(now, MARGIN), Some(RefreshReason::MissingAccessToken));

		let mut state = valid_state(now + Duration::hours(1));

		state.expires_at = None;

		assert_eq!(state.refresh_reason(now, MARGIN), Some(RefreshReason::MissingExpiry));
	}

	#[test]
	fn rotate_carries_account_over_when_omitted() {
		let now = datetime!(2025-03-01 08:00 UTC);
		let mut state = valid_state(now);

		state.rotate(
			TokenGrant {
				access_token: TokenSecret::new("T2"),
				refresh_token: TokenSecret::new("abc3"),
				expires_in: Some(Duration::seconds(3600)),
				account_id: None,
				scope: None,
			},
			now,
		);

		assert_eq!(state.access_token, Some(TokenSecret::new("T2")));
		assert_eq!(state.refresh_token, Some(TokenSecret::new("abc3")));
		assert_eq!(state.expires_at, Some(now + Duration::hours(1)));
		assert_eq!(state.refreshed_at, Some(now));
		assert_eq!(state.account_id.as_deref(), Some("U1"));
	}

	#[test]
	fn unrepresentable_lifetime_leaves_expiry_unset() {
		let now = datetime!(2025-03-01 08:00 UTC);
		let mut state = valid_state(now);

		state.rotate(
			TokenGrant {
				access_token: TokenSecret::new("T2"),
				refresh_token: TokenSecret::new("abc3"),
				expires_in: Some(Duration::seconds(i64::MAX)),
				account_id: None,
				scope: None,
			},
			now,
		);

		assert_eq!(state.refresh_token, Some(TokenSecret::new("abc3")));
		assert!(state.expires_at.is_none());
		assert_eq!(state.refresh_reason(now, MARGIN), Some(RefreshReason::MissingExpiry));
	}

	#[test]
	fn reseed_clears_access_token_and_keeps_account() {
		let now = datetime!(2025-03-01 08:00 UTC);
		let mut state = valid_state(now + Duration::hours(1));

		state.reseed(TokenSecret::new("fresh"), None, now);

		assert!(state.access_token.is_none());
		assert!(state.expires_at.is_none());
		assert_eq!(state.refresh_token, Some(TokenSecret::new("fresh")));
		assert_eq!(state.account_id.as_deref(), Some("U1"));
	}

	#[test]
	fn access_grant_requires_account() {
		let now = datetime!(2025-03-01 08:00 UTC);
		let mut state = valid_state(now);

		state.account_id = None;

		assert!(matches!(state.access_grant(), Err(Error::MissingAccountId)));
	}

	#[test]
	fn older_cache_documents_deserialize() {
		let payload = r#"{
  "access_token": "T1",
  "refresh_token": "abc2",
  "user_id": "U1",
  "scope": "heartrate",
  "token_type": "Bearer",
  "expires_in": 28800,
  "expires_at_utc": "2025-03-01T09:00:00.123456Z",
  "refreshed_at_utc": "2025-03-01T01:00:00.123456Z",
  "note": "Refreshed via API. Store the new refresh token."
}"#;
		let state: TokenState =
			serde_json::from_str(payload).expect("Older cache document should deserialize.");

		assert_eq!(state.access_token, Some(TokenSecret::new("T1")));
		assert_eq!(state.account_id.as_deref(), Some("U1"));
		assert!(state.expires_at.is_some());
		assert!(state.refreshed_at.is_some());
		assert!(state.seeded_at.is_none());
		assert!(state.bootstrap_fingerprint.is_none());
	}
}
