//! Pull jobs: token resolution, provider fetch, and table upsert for one data series.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	api::{ApiSession, fitbit, withings},
	flows::TokenManager,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::ProviderKind,
	sink::{ColumnarFile, TableRow, UpsertReport},
};

pub use crate::api::DateRange;

/// Data series that can be pulled into the data directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum PullJob {
	/// Fitbit daily resting heart rate.
	FitbitHeart,
	/// Fitbit daily step counts.
	FitbitSteps,
	/// Fitbit nightly sleep summaries.
	FitbitSleep,
	/// Withings weight measurements.
	WithingsWeight,
}
impl PullJob {
	/// Every job in its default run order.
	pub const ALL: [PullJob; 4] =
		[Self::FitbitHeart, Self::FitbitSteps, Self::FitbitSleep, Self::WithingsWeight];

	/// Returns a stable label for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::FitbitHeart => "fitbit-heart",
			Self::FitbitSteps => "fitbit-steps",
			Self::FitbitSleep => "fitbit-sleep",
			Self::WithingsWeight => "withings-weight",
		}
	}

	/// Provider whose token the job needs.
	pub const fn provider(self) -> ProviderKind {
		match self {
			Self::FitbitHeart | Self::FitbitSteps | Self::FitbitSleep => ProviderKind::Fitbit,
			Self::WithingsWeight => ProviderKind::Withings,
		}
	}

	/// Table file name inside the data directory.
	pub const fn output_file_name(self) -> &'static str {
		match self {
			Self::FitbitHeart => "raw_fitbit_heart_daily.json",
			Self::FitbitSteps => "raw_fitbit_steps_daily.json",
			Self::FitbitSleep => "raw_fitbit_sleep_daily.json",
			Self::WithingsWeight => "raw_withings_weight.json",
		}
	}

	/// Runs the job against `manager`, writing its table under `data_dir`.
	pub async fn run(
		self,
		manager: &TokenManager,
		data_dir: &Path,
		range: DateRange,
	) -> Result<JobReport> {
		const KIND: FlowKind = FlowKind::Pull;

		let span = FlowSpan::new(KIND, self.as_str(), &manager.descriptor.id);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let grant = manager.access_token().await?;
				let session = ApiSession::new(&manager.descriptor, &manager.http_client, &grant);
				let output = data_dir.join(self.output_file_name());
				let lock_timeout = manager.lock.timeout();

				tracing::info!(job = self.as_str(), %range, "pulling");

				let report = match self {
					Self::FitbitHeart => {
						let rows = fitbit::heart_daily(&session, range).await?;

						store(&output, lock_timeout, rows.len(), rows).await?
					},
					Self::FitbitSteps => {
						let rows = fitbit::steps_daily(&session, range).await?;

						store(&output, lock_timeout, rows.len(), rows).await?
					},
					Self::FitbitSleep => {
						let rows = fitbit::sleep_range(&session, range).await?;

						store(&output, lock_timeout, range.days().count(), rows).await?
					},
					Self::WithingsWeight => {
						let pull = withings::weight_measurements(&session, range).await?;

						store(&output, lock_timeout, pull.groups, pull.rows).await?
					},
				};

				tracing::info!(
					job = self.as_str(),
					fetched = report.fetched,
					incoming = report.incoming,
					total = report.total,
					output = %report.output.display(),
					"pull finished"
				);

				Ok(report)
			})
			.await;

		obs::finish_flow(KIND, result)
	}
}
impl Display for PullJob {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Summary of one job run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobReport {
	/// Provider records fetched: days requested for sleep, measure groups for weight, rows
	/// otherwise.
	pub fetched: usize,
	/// Rows in the upserted batch.
	pub incoming: usize,
	/// Rows in the table afterwards.
	pub total: usize,
	/// Table file written.
	pub output: PathBuf,
}

async fn store<R>(
	output: &Path,
	lock_timeout: StdDuration,
	fetched: usize,
	rows: Vec<R>,
) -> Result<JobReport>
where
	R: TableRow,
{
	let table = ColumnarFile::<R>::new(output);
	let lock = table.lock().with_timeout(lock_timeout);
	let UpsertReport { incoming, total } = table.upsert_locked(&lock, rows).await?;

	Ok(JobReport { fetched, incoming, total, output: output.to_path_buf() })
}
