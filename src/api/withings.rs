//! Withings Measure API: body weight measurement groups.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	api::{ApiSession, DateRange, decode_json, decode_value, lenient_i64},
};

const MEASURE_ENDPOINT: &str = "Withings measure endpoint";
const MEAS_TYPE_WEIGHT: i64 = 1;
const MAX_PAGES: usize = 100;

/// One weight measurement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightRow {
	/// Measurement instant (UTC).
	#[serde(with = "time::serde::rfc3339")]
	pub measured_at: OffsetDateTime,
	/// Weight in kilograms (`value * 10^unit`).
	pub weight_kg: f64,
	/// Measurement group id.
	pub grpid: Option<i64>,
	/// Attribution of the measure (device, manual entry, ...).
	pub attrib: Option<i64>,
	/// Real measurement (1) or objective (2).
	pub category: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
	status: i64,
	#[serde(default)]
	body: Value,
}

#[derive(Debug, Default, Deserialize)]
struct MeasureBody {
	#[serde(default)]
	measuregrps: Vec<MeasureGroup>,
	#[serde(default)]
	more: Option<Value>,
	#[serde(default)]
	offset: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct MeasureGroup {
	#[serde(default)]
	date: Option<Value>,
	#[serde(default)]
	grpid: Option<Value>,
	#[serde(default)]
	attrib: Option<Value>,
	#[serde(default)]
	category: Option<Value>,
	#[serde(default)]
	measures: Vec<Measure>,
}

#[derive(Debug, Deserialize)]
struct Measure {
	#[serde(rename = "type", default)]
	kind: Option<Value>,
	#[serde(default)]
	value: Option<Value>,
	#[serde(default)]
	unit: Option<Value>,
}

/// Weight rows and the number of measurement groups they were extracted from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightPull {
	/// Measurement groups returned by the API.
	pub groups: usize,
	/// Extracted weight rows.
	pub rows: Vec<WeightRow>,
}

/// Fetches every weight measurement taken during `range`, following pagination.
pub async fn weight_measurements(session: &ApiSession<'_>, range: DateRange) -> Result<WeightPull> {
	let start = range.start().midnight().assume_utc().unix_timestamp();
	let end = range.end().midnight().assume_utc().unix_timestamp() + 86_399;
	let mut pull = WeightPull::default();
	let mut offset: Option<i64> = None;

	for _ in 0..MAX_PAGES {
		let mut form = vec![
			("action", "getmeas".to_owned()),
			("meastype", MEAS_TYPE_WEIGHT.to_string()),
			("startdate", start.to_string()),
			("enddate", end.to_string()),
		];

		if let Some(offset) = offset {
			form.push(("offset", offset.to_string()));
		}

		let raw = session.post_form(MEASURE_ENDPOINT, "measure", &form).await?;
		let body = open_envelope(&raw)?;
		let more = body.more.as_ref().and_then(lenient_i64).unwrap_or(0) != 0;
		let next = if more { body.offset.as_ref().and_then(lenient_i64) } else { None };

		pull.groups += body.measuregrps.len();
		pull.rows.extend(weight_rows(body.measuregrps));

		match next {
			Some(next) if Some(next) != offset => offset = Some(next),
			_ => return Ok(pull),
		}
	}

	tracing::warn!(pages = MAX_PAGES, "stopped following Withings pagination");

	Ok(pull)
}

fn open_envelope(raw: &str) -> Result<MeasureBody> {
	let envelope: Envelope = decode_json(MEASURE_ENDPOINT, raw)?;

	if envelope.status != 0 {
		return Err(Error::ApiRejected {
			endpoint: MEASURE_ENDPOINT,
			status: u16::try_from(envelope.status).unwrap_or(u16::MAX),
			body: raw.to_owned(),
		});
	}
	if envelope.body.is_null() {
		return Ok(MeasureBody::default());
	}

	decode_value(MEASURE_ENDPOINT, envelope.body)
}

fn weight_rows(groups: Vec<MeasureGroup>) -> Vec<WeightRow> {
	let mut rows = Vec::new();

	for group in groups {
		let Some(measured_at) = group
			.date
			.as_ref()
			.and_then(lenient_i64)
			.filter(|ts| *ts != 0)
			.and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok())
		else {
			continue;
		};
		let grpid = group.grpid.as_ref().and_then(lenient_i64);
		let attrib = group.attrib.as_ref().and_then(lenient_i64);
		let category = group.category.as_ref().and_then(lenient_i64);

		for measure in group.measures {
			if measure.kind.as_ref().and_then(lenient_i64) != Some(MEAS_TYPE_WEIGHT) {
				continue;
			}

			let Some(value) = measure.value.as_ref().and_then(Value::as_f64) else {
				continue;
			};
			let Ok(unit) = i32::try_from(measure.unit.as_ref().and_then(lenient_i64).unwrap_or(0))
			else {
				continue;
			};
			let weight_kg = value * 10_f64.powi(unit);

			rows.push(WeightRow { measured_at, weight_kg, grpid, attrib, category });
		}
	}

	rows
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	#[test]
	fn weight_is_scaled_by_unit_and_other_types_are_ignored() {
		let body = open_envelope(
			r#"{"status":0,"body":{"measuregrps":[
				{"grpid":11,"attrib":0,"date":1735725600,"category":1,"measures":[
					{"value":72450,"type":1,"unit":-3},
					{"value":215,"type":6,"unit":-1}
				]},
				{"grpid":12,"attrib":2,"category":1,"measures":[{"value":70,"type":1,"unit":0}]}
			]}}"#,
		)
		.expect("Envelope should open.");
		let rows = weight_rows(body.measuregrps);

		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].measured_at, datetime!(2025-01-01 10:00 UTC));
		assert!((rows[0].weight_kg - 72.45).abs() < 1e-9);
		assert_eq!(rows[0].grpid, Some(11));
		assert_eq!(rows[0].attrib, Some(0));
		assert_eq!(rows[0].category, Some(1));
	}

	#[test]
	fn out_of_range_unit_skips_the_measure() {
		let body = open_envelope(
			r#"{"status":0,"body":{"measuregrps":[
				{"grpid":21,"date":1735725600,"measures":[
					{"value":72450,"type":1,"unit":4294967293},
					{"value":71900,"type":1,"unit":-3}
				]}
			]}}"#,
		)
		.expect("Envelope should open.");
		let rows = weight_rows(body.measuregrps);

		assert_eq!(rows.len(), 1);
		assert!((rows[0].weight_kg - 71.9).abs() < 1e-9);
	}

	#[test]
	fn non_zero_envelope_status_is_a_rejection() {
		let raw = r#"{"status":401,"body":{},"error":"invalid_token"}"#;
		let err = open_envelope(raw).expect_err("Status 401 must be rejected.");

		assert!(matches!(
			err,
			Error::ApiRejected { status: 401, ref body, .. } if body.contains("invalid_token")
		));
	}

	#[test]
	fn missing_body_means_no_groups() {
		let body = open_envelope(r#"{"status":0}"#).expect("Envelope should open.");

		assert!(body.measuregrps.is_empty());
	}
}
