//! Fitbit Web API daily series: resting heart rate, steps, and sleep summaries.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	api::{ApiSession, DateRange, iso_date, lenient_i64, parse_iso_date},
};

const HEART_ENDPOINT: &str = "Fitbit heart rate endpoint";
const STEPS_ENDPOINT: &str = "Fitbit steps endpoint";
const SLEEP_ENDPOINT: &str = "Fitbit sleep endpoint";

/// Daily resting heart rate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRow {
	/// Calendar day.
	#[serde(with = "iso_date")]
	pub date: Date,
	/// Resting heart rate in beats per minute.
	pub resting_hr: i64,
}

/// Daily step count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepsRow {
	/// Calendar day.
	#[serde(with = "iso_date")]
	pub date: Date,
	/// Total steps.
	pub steps: i64,
}

/// Nightly sleep summary, attributed to the day the sleep ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepRow {
	/// Calendar day.
	#[serde(with = "iso_date")]
	pub date: Date,
	/// Minutes asleep.
	pub minutes_asleep: Option<i64>,
	/// Minutes in bed.
	pub minutes_in_bed: Option<i64>,
	/// Sleep efficiency percentage.
	pub efficiency: Option<i64>,
	/// Minutes in deep sleep.
	pub minutes_deep: Option<i64>,
	/// Minutes in light sleep.
	pub minutes_light: Option<i64>,
	/// Minutes in REM sleep.
	pub minutes_rem: Option<i64>,
	/// Minutes awake.
	pub minutes_wake: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct HeartSeries {
	#[serde(rename = "activities-heart", default)]
	entries: Vec<HeartEntry>,
}

#[derive(Debug, Deserialize)]
struct HeartEntry {
	#[serde(rename = "dateTime", default)]
	date_time: Option<String>,
	#[serde(default)]
	value: Option<HeartValue>,
}

#[derive(Debug, Deserialize)]
struct HeartValue {
	#[serde(rename = "restingHeartRate", default)]
	resting_heart_rate: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct StepsSeries {
	#[serde(rename = "activities-steps", default)]
	entries: Vec<StepsEntry>,
}

#[derive(Debug, Deserialize)]
struct StepsEntry {
	#[serde(rename = "dateTime", default)]
	date_time: Option<String>,
	#[serde(default)]
	value: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct SleepDay {
	#[serde(default)]
	summary: Option<SleepSummary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SleepSummary {
	#[serde(default)]
	total_minutes_asleep: Option<Value>,
	#[serde(default)]
	total_time_in_bed: Option<Value>,
	#[serde(default)]
	efficiency: Option<Value>,
	#[serde(default)]
	stages: Option<SleepStages>,
}

#[derive(Debug, Default, Deserialize)]
struct SleepStages {
	#[serde(default)]
	deep: Option<Value>,
	#[serde(default)]
	light: Option<Value>,
	#[serde(default)]
	rem: Option<Value>,
	#[serde(default)]
	wake: Option<Value>,
}

/// Fetches resting heart rate for every day of `range` in one request.
pub async fn heart_daily(session: &ApiSession<'_>, range: DateRange) -> Result<Vec<HeartRow>> {
	let path = format!(
		"1/user/{}/activities/heart/date/{}/{}.json",
		session.account_id(),
		range.start(),
		range.end()
	);
	let series: HeartSeries = session.get_json(HEART_ENDPOINT, &path).await?;

	Ok(heart_rows(series))
}

/// Fetches step counts for every day of `range` in one request.
pub async fn steps_daily(session: &ApiSession<'_>, range: DateRange) -> Result<Vec<StepsRow>> {
	let path = format!(
		"1/user/{}/activities/steps/date/{}/{}.json",
		session.account_id(),
		range.start(),
		range.end()
	);
	let series: StepsSeries = session.get_json(STEPS_ENDPOINT, &path).await?;

	Ok(steps_rows(series))
}

/// Fetches the sleep summary of one day; `None` when the day has no sleep data.
pub async fn sleep_day(session: &ApiSession<'_>, day: Date) -> Result<Option<SleepRow>> {
	let path = format!("1.2/user/{}/sleep/date/{day}.json", session.account_id());
	let payload: SleepDay = session.get_json(SLEEP_ENDPOINT, &path).await?;

	Ok(sleep_row(day, payload))
}

/// Fetches sleep summaries for each day of `range`, one request per day.
pub async fn sleep_range(session: &ApiSession<'_>, range: DateRange) -> Result<Vec<SleepRow>> {
	let mut rows = Vec::new();

	for day in range.days() {
		if let Some(row) = sleep_day(session, day).await? {
			rows.push(row);
		}
	}

	Ok(rows)
}

fn heart_rows(series: HeartSeries) -> Vec<HeartRow> {
	series
		.entries
		.into_iter()
		.filter_map(|entry| {
			let date = parse_iso_date(entry.date_time.as_deref()?)?;
			let resting_hr = lenient_i64(entry.value?.resting_heart_rate.as_ref()?)?;

			Some(HeartRow { date, resting_hr })
		})
		.collect()
}

fn steps_rows(series: StepsSeries) -> Vec<StepsRow> {
	series
		.entries
		.into_iter()
		.filter_map(|entry| {
			let date = parse_iso_date(entry.date_time.as_deref()?)?;
			let steps = lenient_i64(entry.value.as_ref()?)?;

			Some(StepsRow { date, steps })
		})
		.collect()
}

fn sleep_row(day: Date, payload: SleepDay) -> Option<SleepRow> {
	let summary = payload.summary.unwrap_or_default();

	if summary.total_minutes_asleep.is_none()
		&& summary.total_time_in_bed.is_none()
		&& summary.efficiency.is_none()
	{
		return None;
	}

	let stages = summary.stages.unwrap_or_default();
	let int = |value: &Option<Value>| value.as_ref().and_then(lenient_i64);

	Some(SleepRow {
		date: day,
		minutes_asleep: int(&summary.total_minutes_asleep),
		minutes_in_bed: int(&summary.total_time_in_bed),
		efficiency: int(&summary.efficiency),
		minutes_deep: int(&stages.deep),
		minutes_light: int(&stages.light),
		minutes_rem: int(&stages.rem),
		minutes_wake: int(&stages.wake),
	})
}
