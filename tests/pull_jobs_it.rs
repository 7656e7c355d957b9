mod common;

// crates.io
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime, macros::date};
// self
use common::*;
use lifeops_ingest::{
	api::{DateRange, HeartRow, SleepRow, WeightRow},
	auth::{AccountId, TokenSecret, TokenState},
	error::Error,
	jobs::PullJob,
	sink::ColumnarFile,
	store::{FileCache, TokenStore},
};

fn write_valid_cache(dir: &std::path::Path, file: &str, bootstrap: &str, account: &str) {
	let state = TokenState {
		access_token: Some(TokenSecret::new("T0")),
		refresh_token: Some(TokenSecret::new("r0")),
		account_id: Some(AccountId::new(account).expect("Account fixture should be valid.")),
		expires_at: Some(OffsetDateTime::now_utc() + Duration::hours(6)),
		bootstrap_fingerprint: Some(TokenSecret::new(bootstrap).fingerprint()),
		..Default::default()
	};

	FileCache::new(dir.join(file)).save(&state).expect("Cache fixture should be written.");
}

fn range(start: time::Date, end: time::Date) -> DateRange {
	DateRange::new(start, end).expect("Range fixture should be valid.")
}

#[tokio::test]
async fn heart_job_upserts_daily_rows() {
	let server = MockServer::start_async().await;
	let dir = tempfile::tempdir().expect("Temp dir should be created.");

	write_valid_cache(dir.path(), FITBIT_CACHE, "abc", "U0");

	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/1/user/U0/activities/heart/date/2025-01-01/2025-01-03.json")
				.header("authorization", "Bearer T0");
			then.status(200).header("content-type", "application/json").body(
				"{\"activities-heart\":[\
					{\"dateTime\":\"2025-01-01\",\"value\":{\"restingHeartRate\":58}},\
					{\"dateTime\":\"2025-01-02\",\"value\":{\"heartRateZones\":[]}},\
					{\"dateTime\":\"2025-01-03\",\"value\":{\"restingHeartRate\":60}}]}",
			);
		})
		.await;
	let manager = fitbit_manager(&server, dir.path(), Some("abc"));
	let window = range(date!(2025 - 01 - 01), date!(2025 - 01 - 03));
	let report =
		PullJob::FitbitHeart.run(&manager, dir.path(), window).await.expect("Job should succeed.");

	mock.assert_async().await;
	assert_eq!(report.fetched, 2);
	assert_eq!(report.incoming, 2);
	assert_eq!(report.total, 2);
	assert_eq!(report.output, dir.path().join("raw_fitbit_heart_daily.json"));
	assert!(!dir.path().join(".raw_fitbit_heart_daily.json.lock").exists());

	let rows = ColumnarFile::<HeartRow>::new(&report.output).load().expect("Table should load.");

	assert_eq!(
		rows.into_iter().map(|(row, _)| row).collect::<Vec<_>>(),
		vec![
			HeartRow { date: date!(2025 - 01 - 01), resting_hr: 58 },
			HeartRow { date: date!(2025 - 01 - 03), resting_hr: 60 },
		]
	);

	// Re-running the same window replaces rows by date instead of appending.
	let report =
		PullJob::FitbitHeart.run(&manager, dir.path(), window).await.expect("Re-run should succeed.");

	mock.assert_calls_async(2).await;
	assert_eq!(report.total, 2);
}

#[tokio::test]
async fn steps_job_reads_string_values() {
	let server = MockServer::start_async().await;
	let dir = tempfile::tempdir().expect("Temp dir should be created.");

	write_valid_cache(dir.path(), FITBIT_CACHE, "abc", "U0");

	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/1/user/U0/activities/steps/date/2025-01-01/2025-01-02.json");
			then.status(200).header("content-type", "application/json").body(
				"{\"activities-steps\":[\
					{\"dateTime\":\"2025-01-01\",\"value\":\"10234\"},\
					{\"dateTime\":\"2025-01-02\",\"value\":\"8120\"}]}",
			);
		})
		.await;
	let manager = fitbit_manager(&server, dir.path(), Some("abc"));
	let report = PullJob::FitbitSteps
		.run(&manager, dir.path(), range(date!(2025 - 01 - 01), date!(2025 - 01 - 02)))
		.await
		.expect("Job should succeed.");

	mock.assert_async().await;
	assert_eq!((report.fetched, report.total), (2, 2));

	let table = read_json(&report.output);

	assert_eq!(table["columns"][1]["name"], "steps");
	assert_eq!(table["columns"][1]["values"][0], 10_234);
	assert_eq!(table["columns"][1]["values"][1], 8_120);
}

#[tokio::test]
async fn sleep_job_requests_each_day_and_skips_empty_nights() {
	let server = MockServer::start_async().await;
	let dir = tempfile::tempdir().expect("Temp dir should be created.");

	write_valid_cache(dir.path(), FITBIT_CACHE, "abc", "U0");

	let first = server
		.mock_async(|when, then| {
			when.method(GET).path("/1.2/user/U0/sleep/date/2025-01-01.json");
			then.status(200).header("content-type", "application/json").body(
				"{\"sleep\":[],\"summary\":{\"totalMinutesAsleep\":402,\"totalTimeInBed\":455,\
					\"stages\":{\"deep\":71,\"light\":240,\"rem\":91,\"wake\":53}}}",
			);
		})
		.await;
	let second = server
		.mock_async(|when, then| {
			when.method(GET).path("/1.2/user/U0/sleep/date/2025-01-02.json");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"sleep\":[],\"summary\":{\"totalMinutesAsleep\":0,\"totalTimeInBed\":0}}");
		})
		.await;
	let third = server
		.mock_async(|when, then| {
			when.method(GET).path("/1.2/user/U0/sleep/date/2025-01-03.json");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"sleep\":[],\"summary\":{\"stages\":{}}}");
		})
		.await;
	let manager = fitbit_manager(&server, dir.path(), Some("abc"));
	let report = PullJob::FitbitSleep
		.run(&manager, dir.path(), range(date!(2025 - 01 - 01), date!(2025 - 01 - 03)))
		.await
		.expect("Job should succeed.");

	first.assert_async().await;
	second.assert_async().await;
	third.assert_async().await;
	assert_eq!(report.fetched, 3);
	assert_eq!(report.incoming, 2);

	let rows = ColumnarFile::<SleepRow>::new(&report.output).load().expect("Table should load.");

	assert_eq!(rows.len(), 2);
	assert_eq!(rows[0].0.minutes_deep, Some(71));
	assert_eq!(rows[1].0.minutes_asleep, Some(0));
}

#[tokio::test]
async fn weight_job_posts_getmeas_and_scales_values() {
	let server = MockServer::start_async().await;
	let dir = tempfile::tempdir().expect("Temp dir should be created.");

	write_valid_cache(dir.path(), WITHINGS_CACHE, "w1", "363");

	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/measure")
				.header("authorization", "Bearer T0")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200).header("content-type", "application/json").body(
				"{\"status\":0,\"body\":{\"more\":0,\"offset\":0,\"measuregrps\":[\
					{\"grpid\":11,\"attrib\":0,\"date\":1735725600,\"category\":1,\
						\"measures\":[{\"value\":72450,\"type\":1,\"unit\":-3}]},\
					{\"grpid\":12,\"attrib\":0,\"date\":1735812000,\"category\":1,\
						\"measures\":[{\"value\":36,\"type\":12,\"unit\":0}]}]}}",
			);
		})
		.await;
	let manager = withings_manager(&server, dir.path(), Some("w1"));
	let report = PullJob::WithingsWeight
		.run(&manager, dir.path(), range(date!(2025 - 01 - 01), date!(2025 - 01 - 02)))
		.await
		.expect("Job should succeed.");

	mock.assert_async().await;
	assert_eq!(report.fetched, 2);
	assert_eq!(report.incoming, 1);
	assert_eq!(report.output, dir.path().join("raw_withings_weight.json"));

	let rows = ColumnarFile::<WeightRow>::new(&report.output).load().expect("Table should load.");

	assert_eq!(rows.len(), 1);
	assert!((rows[0].0.weight_kg - 72.45).abs() < 1e-9);
	assert_eq!(rows[0].0.grpid, Some(11));
}

#[tokio::test]
async fn api_rejection_fails_the_job_without_touching_the_table() {
	let server = MockServer::start_async().await;
	let dir = tempfile::tempdir().expect("Temp dir should be created.");

	write_valid_cache(dir.path(), FITBIT_CACHE, "abc", "U0");

	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/1/user/U0/activities/heart/date/2025-01-01/2025-01-01.json");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"errors\":[{\"errorType\":\"expired_token\"}]}");
		})
		.await;
	let manager = fitbit_manager(&server, dir.path(), Some("abc"));
	let err = PullJob::FitbitHeart
		.run(&manager, dir.path(), range(date!(2025 - 01 - 01), date!(2025 - 01 - 01)))
		.await
		.expect_err("Rejected API call must fail.");

	mock.assert_async().await;
	assert!(matches!(err, Error::ApiRejected { status: 401, ref body, .. } if body.contains("expired_token")));
	assert!(!dir.path().join("raw_fitbit_heart_daily.json").exists());
}
