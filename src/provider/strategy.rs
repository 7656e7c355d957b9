//! Provider strategy hooks that customize token exchanges.
//!
//! Implementations decorate outgoing token requests, decode the provider's response shape, and
//! classify rejections without tying flows to any particular HTTP client.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	oauth::{RawTokenResponse, TokenReply},
	provider::descriptor::GrantType,
};

/// Strategy hook that allows providers to decorate requests, decode replies, and classify errors.
///
/// Implementors are required to be `Send + Sync`. Override only what you need:
/// `augment_token_request` is a no-op and `decode_token_reply` expects a plain RFC 6749 JSON
/// body by default.
pub trait ProviderStrategy: Send + Sync {
	/// Maps a rejected token request into a coarse error category.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;

	/// Gives providers a chance to add custom form parameters before dispatching.
	///
	/// The method works on a plain `BTreeMap` so implementations remain HTTP client agnostic.
	fn augment_token_request(&self, _grant: GrantType, _form: &mut BTreeMap<String, String>) {}

	/// Turns the raw HTTP status and body into an issued token payload or a rejection.
	fn decode_token_reply(
		&self,
		status: u16,
		body: &str,
	) -> Result<TokenReply, serde_path_to_error::Error<serde_json::Error>> {
		if !(200..300).contains(&status) {
			return Ok(TokenReply::Rejected { status, body: body.to_owned() });
		}

		let de = &mut serde_json::Deserializer::from_str(body);
		let raw: RawTokenResponse = serde_path_to_error::deserialize(de)?;

		Ok(TokenReply::Issued(raw))
	}
}

/// Canonical provider error categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// Provider rejected the grant (bad code, rotated or revoked refresh token).
	InvalidGrant,
	/// Client authentication failed.
	InvalidClient,
	/// Requested scopes exceed what the client may ask for.
	InsufficientScope,
	/// Failure looks temporary on the provider side.
	Transient,
}
impl ProviderErrorKind {
	/// Returns a stable label for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::InvalidGrant => "invalid_grant",
			Self::InvalidClient => "invalid_client",
			Self::InsufficientScope => "insufficient_scope",
			Self::Transient => "transient",
		}
	}

	/// Short operator hint for the failure category.
	pub const fn hint(self) -> &'static str {
		match self {
			Self::InvalidGrant =>
				"the refresh token is no longer valid; run `lifeops authorize` to bootstrap again",
			Self::InvalidClient => "check the configured client id and secret",
			Self::InsufficientScope => "the app registration does not allow the requested scopes",
			Self::Transient => "the provider looks temporarily unavailable; try again later",
		}
	}
}
impl Display for ProviderErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Context passed to provider strategies when classifying token errors.
///
/// Only primitive data is kept (status code, OAuth error field, body preview) so strategies stay
/// decoupled from the HTTP client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant type associated with the failing request.
	pub grant_type: GrantType,
	/// HTTP (or envelope) status code returned by the provider.
	pub http_status: Option<u16>,
	/// Provider-supplied error code, when one could be extracted.
	pub oauth_error: Option<String>,
	/// Preview of the response body.
	pub body_preview: Option<String>,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context scoped to the provided grant type.
	pub fn new(grant_type: GrantType) -> Self {
		Self { grant_type, http_status: None, oauth_error: None, body_preview: None }
	}

	/// Builds the context for a rejected reply, extracting the error code from the body.
	pub fn from_rejection(grant_type: GrantType, status: u16, body: &str) -> Self {
		let mut ctx = Self::new(grant_type).with_http_status(status).with_body_preview(body);

		ctx.oauth_error = extract_error_code(body);

		ctx
	}

	/// Adds an HTTP status code (e.g., 400, 401, 500).
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds a body preview.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}
}

/// Strategy for providers that speak plain RFC 6749 JSON (Fitbit).
///
/// It prioritizes the structured error code, then falls back to body text hints, and finally the
/// HTTP status code.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-provider-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		ctx.oauth_error
			.as_deref()
			.and_then(match_exact_value)
			.or_else(|| classify_body(ctx.body_preview.as_deref()))
			.unwrap_or_else(|| classify_status(ctx.http_status))
	}
}

/// Strategy for Withings, whose token endpoint wraps every reply in a `{status, body}` envelope
/// and expects `action=requesttoken` on every call.
#[derive(Debug, Default)]
pub struct WithingsStrategy;
impl WithingsStrategy {
	/// Envelope status Withings returns when the caller is rate limited.
	pub const STATUS_TOO_MANY_REQUESTS: u16 = 601;
}
impl Display for WithingsStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("withings-strategy")
	}
}
impl ProviderStrategy for WithingsStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.http_status == Some(Self::STATUS_TOO_MANY_REQUESTS) {
			return ProviderErrorKind::Transient;
		}

		DefaultProviderStrategy.classify_token_error(ctx)
	}

	fn augment_token_request(&self, _grant: GrantType, form: &mut BTreeMap<String, String>) {
		form.insert("action".into(), "requesttoken".into());
	}

	fn decode_token_reply(
		&self,
		status: u16,
		body: &str,
	) -> Result<TokenReply, serde_path_to_error::Error<serde_json::Error>> {
		#[derive(Deserialize)]
		struct Envelope {
			status: i64,
			#[serde(default)]
			body: Option<RawTokenResponse>,
		}

		if !(200..300).contains(&status) {
			return Ok(TokenReply::Rejected { status, body: body.to_owned() });
		}

		let de = &mut serde_json::Deserializer::from_str(body);
		let envelope: Envelope = serde_path_to_error::deserialize(de)?;

		if envelope.status != 0 {
			let status = u16::try_from(envelope.status).unwrap_or(u16::MAX);

			return Ok(TokenReply::Rejected { status, body: body.to_owned() });
		}

		Ok(TokenReply::Issued(envelope.body.unwrap_or_default()))
	}
}

fn extract_error_code(body: &str) -> Option<String> {
	let value: Value = serde_json::from_str(body).ok()?;

	if let Some(code) = value.get("error").and_then(Value::as_str) {
		return Some(code.to_owned());
	}

	// Fitbit: {"errors":[{"errorType":"invalid_grant", ...}], "success": false}
	value
		.get("errors")
		.and_then(Value::as_array)
		.and_then(|errors| errors.first())
		.and_then(|first| first.get("errorType"))
		.and_then(Value::as_str)
		.map(str::to_owned)
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ProviderErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= ProviderErrorContext::BODY_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}
		buf.push(ch);
	}

	buf
}

fn match_exact_value(value: &str) -> Option<ProviderErrorKind> {
	if value.eq_ignore_ascii_case("invalid_grant") || value.eq_ignore_ascii_case("expired_token") {
		Some(ProviderErrorKind::InvalidGrant)
	} else if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("unauthorized_client")
	{
		Some(ProviderErrorKind::InvalidClient)
	} else if value.eq_ignore_ascii_case("invalid_scope")
		|| value.eq_ignore_ascii_case("insufficient_scope")
	{
		Some(ProviderErrorKind::InsufficientScope)
	} else if value.eq_ignore_ascii_case("temporarily_unavailable")
		|| value.eq_ignore_ascii_case("server_error")
		|| value.eq_ignore_ascii_case("system")
	{
		Some(ProviderErrorKind::Transient)
	} else {
		None
	}
}

fn classify_body(body: Option<&str>) -> Option<ProviderErrorKind> {
	let body = body?;
	let lowered = body.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant") || text.contains("invalid refresh_token") =>
			Some(ProviderErrorKind::InvalidGrant),
		text if text.contains("invalid_client") || text.contains("invalid client") =>
			Some(ProviderErrorKind::InvalidClient),
		text if text.contains("insufficient_scope") || text.contains("invalid_scope") =>
			Some(ProviderErrorKind::InsufficientScope),
		text if text.contains("temporarily_unavailable") || text.contains("retry") =>
			Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 404 | 410) => ProviderErrorKind::InvalidGrant,
		Some(401) => ProviderErrorKind::InvalidClient,
		Some(403) => ProviderErrorKind::InsufficientScope,
		Some(429) => ProviderErrorKind::Transient,
		Some(code) if code >= 500 => ProviderErrorKind::Transient,
		_ => ProviderErrorKind::InvalidGrant,
	}
}
