//! Provider data APIs: authenticated requests, response decoding, and typed daily rows.

pub mod fitbit;
pub mod withings;

pub use fitbit::{HeartRow, SleepRow, StepsRow};
pub use withings::{WeightPull, WeightRow};

// crates.io
use reqwest::{RequestBuilder, header::ACCEPT};
use serde::de::DeserializeOwned;
use serde_json::Value;
use time::format_description::BorrowedFormatItem;
// self
use crate::{
	_prelude::*,
	auth::{AccessGrant, AccountId},
	error::{ConfigError, TransportError},
	http::ReqwestHttpClient,
	provider::ProviderDescriptor,
};

const ISO_DATE: &[BorrowedFormatItem<'static>] =
	time::macros::format_description!("[year]-[month]-[day]");

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Inclusive range of calendar days (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
	start: Date,
	end: Date,
}
impl DateRange {
	/// Default look-back window of the pull jobs.
	pub const DEFAULT_DAYS: u16 = 30;

	/// Creates a range; `start` must not be after `end`.
	pub fn new(start: Date, end: Date) -> Result<Self, ConfigError> {
		if start > end {
			return Err(ConfigError::InvalidValue {
				key: "date range".into(),
				reason: format!("start {start} is after end {end}"),
			});
		}

		Ok(Self { start, end })
	}

	/// The `days` days ending with (and including) `today`.
	pub fn last_days(days: u16, today: Date) -> Self {
		let span = Duration::days(i64::from(days.max(1)) - 1);
		let start = today.checked_sub(span).unwrap_or(Date::MIN);

		Self { start, end: today }
	}

	/// The default window ending today (UTC).
	pub fn default_window() -> Self {
		Self::last_days(Self::DEFAULT_DAYS, OffsetDateTime::now_utc().date())
	}

	/// First day of the range.
	pub fn start(&self) -> Date {
		self.start
	}

	/// Last day of the range.
	pub fn end(&self) -> Date {
		self.end
	}

	/// Every day of the range in ascending order.
	pub fn days(&self) -> impl Iterator<Item = Date> {
		let end = self.end;

		std::iter::successors(Some(self.start), move |day| {
			day.next_day().filter(|next| *next <= end)
		})
	}
}
impl Display for DateRange {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}..={}", self.start, self.end)
	}
}

/// Authenticated view of one provider's data API.
#[derive(Clone, Copy)]
pub struct ApiSession<'a> {
	descriptor: &'a ProviderDescriptor,
	http_client: &'a ReqwestHttpClient,
	grant: &'a AccessGrant,
}
impl<'a> ApiSession<'a> {
	/// Binds an access grant to the provider's API base.
	pub fn new(
		descriptor: &'a ProviderDescriptor,
		http_client: &'a ReqwestHttpClient,
		grant: &'a AccessGrant,
	) -> Self {
		Self { descriptor, http_client, grant }
	}

	/// Account the grant belongs to.
	pub fn account_id(&self) -> &AccountId {
		&self.grant.account_id
	}

	pub(crate) async fn get_json<T>(&self, endpoint: &'static str, path: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let request = self.http_client.get(self.descriptor.api_url(path)?);
		let body = self.send(endpoint, request).await?;

		decode_json(endpoint, &body)
	}

	pub(crate) async fn post_form(
		&self,
		endpoint: &'static str,
		path: &str,
		form: &[(&str, String)],
	) -> Result<String> {
		let request = self.http_client.post(self.descriptor.api_url(path)?).form(form);

		self.send(endpoint, request).await
	}

	async fn send(&self, endpoint: &'static str, request: RequestBuilder) -> Result<String> {
		let response = request
			.bearer_auth(self.grant.access_token.expose())
			.header(ACCEPT, "application/json")
			.send()
			.await
			.map_err(|e| TransportError::network(endpoint, e))?;
		let status = response.status();
		let body = response.text().await.map_err(|e| TransportError::network(endpoint, e))?;

		if !status.is_success() {
			tracing::warn!(endpoint, status = status.as_u16(), "data API rejected the request");

			return Err(Error::ApiRejected { endpoint, status: status.as_u16(), body });
		}

		Ok(body)
	}
}
impl Debug for ApiSession<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiSession")
			.field("provider", &self.descriptor.id)
			.field("api_base", &self.descriptor.endpoints.api.as_str())
			.field("account_id", &self.grant.account_id)
			.finish()
	}
}

pub(crate) fn decode_json<T>(endpoint: &'static str, body: &str) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_str(body);

	serde_path_to_error::deserialize(&mut de)
		.map_err(|source| Error::MalformedResponse { endpoint, source })
}

pub(crate) fn decode_value<T>(endpoint: &'static str, value: Value) -> Result<T>
where
	T: DeserializeOwned,
{
	serde_path_to_error::deserialize(value)
		.map_err(|source| Error::MalformedResponse { endpoint, source })
}

/// Reads an integer that providers send as a number or a numeric string.
pub(crate) fn lenient_i64(value: &Value) -> Option<i64> {
	match value {
		Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
		Value::String(s) => s.trim().parse().ok(),
		_ => None,
	}
}

pub(crate) fn parse_iso_date(raw: &str) -> Option<Date> {
	Date::parse(raw.trim(), ISO_DATE).ok()
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::date;
	// self
	use super::*;

	#[test]
	fn last_days_is_inclusive_of_today() {
		let range = DateRange::last_days(30, date!(2025 - 03 - 10));

		assert_eq!(range.start(), date!(2025 - 02 - 09));
		assert_eq!(range.end(), date!(2025 - 03 - 10));
		assert_eq!(range.days().count(), 30);
	}

	#[test]
	fn single_day_range_yields_one_day() {
		let day = date!(2025 - 01 - 01);
		let range = DateRange::new(day, day).expect("Single day range is valid.");

		assert_eq!(range.days().collect::<Vec<_>>(), vec![day]);
		assert!(DateRange::new(date!(2025 - 01 - 02), day).is_err());
	}

	#[test]
	fn lenient_integers_accept_strings_and_floats() {
		assert_eq!(lenient_i64(&Value::from("8123")), Some(8123));
		assert_eq!(lenient_i64(&Value::from(91.0)), Some(91));
		assert_eq!(lenient_i64(&Value::from("n/a")), None);
		assert_eq!(lenient_i64(&Value::Null), None);
	}

	#[test]
	fn malformed_json_reports_the_failing_path() {
		#[derive(Debug, Deserialize)]
		struct Payload {
			#[allow(dead_code)]
			count: u32,
		}

		let err = decode_json::<Payload>("test endpoint", r#"{"count":"many"}"#)
			.expect_err("String count must be rejected.");

		match err {
			Error::MalformedResponse { endpoint, source } => {
				assert_eq!(endpoint, "test endpoint");
				assert_eq!(source.path().to_string(), "count");
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}
}
