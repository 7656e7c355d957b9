//! Keyed upserts into columnar JSON tables under the data directory.
//!
//! A table file holds one array per column plus an `ingested_at` column. Upserting loads the
//! table, drops existing rows whose key is in the incoming batch, appends the batch stamped
//! with the current time, sorts by key, and atomically replaces the file. Concurrent pulls into
//! the same table queue on a `.<table>.lock` marker so neither batch is lost.

// std
use std::{ffi::OsString, fs, io::ErrorKind, marker::PhantomData};
// crates.io
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
// self
use crate::{
	_prelude::*,
	api::{HeartRow, SleepRow, StepsRow, WeightRow},
	store::{FileLock, StoreError, write_atomic},
};

/// Column holding the time each row was last written.
pub const INGESTED_AT: &str = "ingested_at";

/// A row type that can live in a columnar table.
pub trait TableRow
where
	Self: Clone + Serialize + DeserializeOwned,
{
	/// Primary key; a table holds at most one row per key.
	type Key: Ord;

	/// Column names in file order, excluding [`INGESTED_AT`].
	const COLUMNS: &'static [&'static str];

	/// Returns this row's key.
	fn key(&self) -> Self::Key;
}

/// Destination that merges batches by key.
///
/// `upsert` is a read-modify-write; callers sharing a destination serialize through its lock.
pub trait UpsertSink<R>
where
	Self: Send + Sync,
{
	/// Merges `rows` and reports the batch size and resulting table size.
	fn upsert(&self, rows: Vec<R>) -> Result<UpsertReport>;
}

/// Result of one upsert.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpsertReport {
	/// Rows in the incoming batch.
	pub incoming: usize,
	/// Rows in the table after the merge.
	pub total: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ColumnarDocument {
	rows: usize,
	columns: Vec<Column>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Column {
	name: String,
	values: Vec<Value>,
}

/// Columnar JSON table file.
pub struct ColumnarFile<R> {
	path: PathBuf,
	_row: PhantomData<fn() -> R>,
}
impl<R> ColumnarFile<R>
where
	R: TableRow,
{
	/// Binds a table to `path`; the file is created on the first upsert.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into(), _row: PhantomData }
	}

	/// Table file location.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Cross-process lock for this table, a `.<file>.lock` marker next to it.
	pub fn lock(&self) -> FileLock {
		let mut name = OsString::from(".");

		name.push(self.path.file_name().map(OsString::from).unwrap_or_default());
		name.push(".lock");

		FileLock::new(self.path.with_file_name(name))
	}

	/// Upserts `rows` while holding `lock`.
	pub async fn upsert_locked(&self, lock: &FileLock, rows: Vec<R>) -> Result<UpsertReport> {
		let guard = lock.acquire().await?;
		let report = self.upsert(rows);

		guard.release();

		report
	}

	/// Reads every stored row with its `ingested_at` value; a missing file is an empty table.
	pub fn load(&self) -> Result<Vec<(R, Value)>, StoreError> {
		let bytes = match fs::read(&self.path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => {
				return Err(StoreError::Backend {
					message: format!("Failed to read {}: {e}", self.path.display()),
				});
			},
		};
		let mut de = serde_json::Deserializer::from_slice(&bytes);
		let document: ColumnarDocument =
			serde_path_to_error::deserialize(&mut de).map_err(|e| self.corrupt(e))?;

		self.rows_from(document)
	}

	fn rows_from(&self, document: ColumnarDocument) -> Result<Vec<(R, Value)>, StoreError> {
		let mut columns = document
			.columns
			.into_iter()
			.map(|column| (column.name, column.values.into_iter()))
			.collect::<BTreeMap<_, _>>();

		for name in R::COLUMNS.iter().chain([&INGESTED_AT]) {
			match columns.get(*name) {
				Some(values) if values.len() == document.rows => {},
				Some(values) => {
					return Err(self.corrupt(format!(
						"column `{name}` has {} values, expected {}",
						values.len(),
						document.rows
					)));
				},
				None => return Err(self.corrupt(format!("column `{name}` is missing"))),
			}
		}

		let mut rows = Vec::with_capacity(document.rows);

		for index in 0..document.rows {
			let mut object = Map::new();
			let mut ingested_at = Value::Null;

			for (name, values) in columns.iter_mut() {
				let value = values.next().unwrap_or(Value::Null);

				if name == INGESTED_AT {
					ingested_at = value;
				} else {
					object.insert(name.clone(), value);
				}
			}

			let row = serde_json::from_value(Value::Object(object))
				.map_err(|e| self.corrupt(format!("row {index}: {e}")))?;

			rows.push((row, ingested_at));
		}

		Ok(rows)
	}

	fn document_from(&self, rows: &[(R, Value)]) -> Result<ColumnarDocument, StoreError> {
		let mut columns = R::COLUMNS
			.iter()
			.chain([&INGESTED_AT])
			.map(|name| Column { name: (*name).to_owned(), values: Vec::with_capacity(rows.len()) })
			.collect::<Vec<_>>();

		for (row, ingested_at) in rows {
			let Value::Object(mut object) = serde_json::to_value(row)
				.map_err(|e| StoreError::Serialization { message: e.to_string() })?
			else {
				return Err(StoreError::Serialization {
					message: "table rows must serialize as objects".into(),
				});
			};

			for column in &mut columns {
				let value = if column.name == INGESTED_AT {
					ingested_at.clone()
				} else {
					object.remove(&column.name).unwrap_or(Value::Null)
				};

				column.values.push(value);
			}
		}

		Ok(ColumnarDocument { rows: rows.len(), columns })
	}

	fn corrupt(&self, detail: impl Display) -> StoreError {
		StoreError::Serialization {
			message: format!("Table {} is unreadable: {detail}", self.path.display()),
		}
	}
}
impl<R> UpsertSink<R> for ColumnarFile<R>
where
	R: TableRow,
{
	fn upsert(&self, rows: Vec<R>) -> Result<UpsertReport> {
		let ingested_at = OffsetDateTime::now_utc()
			.format(&Rfc3339)
			.map_err(|e| StoreError::Serialization { message: e.to_string() })?;
		let incoming = rows.len();
		let mut table = self
			.load()?
			.into_iter()
			.map(|(row, stamp)| (row.key(), (row, stamp)))
			.collect::<BTreeMap<_, _>>();

		for row in rows {
			table.insert(row.key(), (row, Value::String(ingested_at.clone())));
		}

		let merged = table.into_values().collect::<Vec<_>>();
		let document = self.document_from(&merged)?;
		let mut bytes = serde_json::to_vec(&document)
			.map_err(|e| StoreError::Serialization { message: e.to_string() })?;

		bytes.push(b'\n');
		write_atomic(&self.path, &bytes)?;

		tracing::debug!(
			table = %self.path.display(),
			incoming,
			total = merged.len(),
			"table upserted"
		);

		Ok(UpsertReport { incoming, total: merged.len() })
	}
}
impl<R> Debug for ColumnarFile<R> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ColumnarFile").field("path", &self.path).finish()
	}
}

impl TableRow for HeartRow {
	type Key = Date;

	const COLUMNS: &'static [&'static str] = &["date", "resting_hr"];

	fn key(&self) -> Self::Key {
		self.date
	}
}

impl TableRow for StepsRow {
	type Key = Date;

	const COLUMNS: &'static [&'static str] = &["date", "steps"];

	fn key(&self) -> Self::Key {
		self.date
	}
}

impl TableRow for SleepRow {
	type Key = Date;

	const COLUMNS: &'static [&'static str] = &[
		"date",
		"minutes_asleep",
		"minutes_in_bed",
		"efficiency",
		"minutes_deep",
		"minutes_light",
		"minutes_rem",
		"minutes_wake",
	];

	fn key(&self) -> Self::Key {
		self.date
	}
}

impl TableRow for WeightRow {
	type Key = OffsetDateTime;

	const COLUMNS: &'static [&'static str] =
		&["measured_at", "weight_kg", "grpid", "attrib", "category"];

	fn key(&self) -> Self::Key {
		self.measured_at
	}
}
