//! Command-line surface of the `lifeops` binary.

// crates.io
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{self, WrapErr};
use time::format_description::well_known::Rfc3339;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
// self
use crate::{
	_prelude::*,
	api::parse_iso_date,
	config::{self, ProviderKeys, Settings},
	flows::TokenManager,
	jobs::{DateRange, PullJob},
	provider::ProviderKind,
};

/// Pull personal health data from Fitbit and Withings into a local data directory.
#[derive(Debug, Parser)]
#[command(name = "lifeops", version)]
pub struct Cli {
	/// Env file overlaid on the process environment (its values win).
	#[arg(long, global = true, default_value = ".env")]
	pub env_file: PathBuf,
	/// Data directory [default: `LIFEOPS_DATA_DIR` or `data`].
	#[arg(long, global = true)]
	pub data_dir: Option<PathBuf>,
	/// Log this crate at debug level (ignored when `RUST_LOG` is set).
	#[arg(short, long, global = true)]
	pub verbose: bool,
	/// Subcommand to run.
	#[command(subcommand)]
	pub command: Command,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
	/// Fetch data series and upsert them into their tables.
	Pull(PullArgs),
	/// Resolve an access token and show who it belongs to.
	Token(TokenArgs),
	/// Run the interactive authorization bootstrap.
	Authorize(AuthorizeArgs),
}

/// Arguments of `lifeops pull`.
#[derive(Debug, Args)]
pub struct PullArgs {
	/// Jobs to run, in order.
	#[arg(value_enum, required = true)]
	pub jobs: Vec<PullJob>,
	/// Look-back window ending today (UTC), inclusive.
	#[arg(long, conflicts_with_all = ["start", "end"])]
	pub days: Option<u16>,
	/// First day to pull (YYYY-MM-DD).
	#[arg(long, requires = "end", value_parser = parse_date)]
	pub start: Option<Date>,
	/// Last day to pull (YYYY-MM-DD).
	#[arg(long, requires = "start", value_parser = parse_date)]
	pub end: Option<Date>,
}
impl PullArgs {
	/// Resolves the requested date range.
	pub fn range(&self) -> Result<DateRange> {
		match (self.start, self.end) {
			(Some(start), Some(end)) => Ok(DateRange::new(start, end)?),
			_ => Ok(DateRange::last_days(
				self.days.unwrap_or(DateRange::DEFAULT_DAYS),
				OffsetDateTime::now_utc().date(),
			)),
		}
	}
}

/// Arguments of `lifeops token`.
#[derive(Debug, Args)]
pub struct TokenArgs {
	/// Provider to resolve.
	#[arg(value_enum)]
	pub provider: ProviderKind,
	/// Redeem the refresh token even when the cached access token is still valid.
	#[arg(long)]
	pub refresh: bool,
}

/// Arguments of `lifeops authorize`.
#[derive(Debug, Args)]
pub struct AuthorizeArgs {
	/// Provider to authorize.
	#[arg(value_enum)]
	pub provider: ProviderKind,
	/// Redirect URI registered with the provider [default: `<PROVIDER>_REDIRECT_URI`].
	#[arg(long)]
	pub redirect_uri: Option<Url>,
}

/// Executes the parsed command line.
pub async fn run(cli: Cli) -> eyre::Result<()> {
	let settings = Settings::load(&cli.env_file)
		.wrap_err_with(|| format!("loading configuration from {}", cli.env_file.display()))?;
	let data_dir = cli.data_dir.clone().unwrap_or_else(|| settings.data_dir());

	match cli.command {
		Command::Pull(args) => pull(&settings, &data_dir, args).await,
		Command::Token(args) => token(&settings, &data_dir, args).await,
		Command::Authorize(args) => authorize(&settings, &data_dir, &cli.env_file, args).await,
	}
}

async fn pull(settings: &Settings, data_dir: &Path, args: PullArgs) -> eyre::Result<()> {
	let range = args.range().wrap_err("resolving the date range")?;
	let mut managers: Vec<(ProviderKind, TokenManager)> = Vec::new();

	for job in args.jobs {
		let provider = job.provider();
		let manager = match managers.iter().find(|(kind, _)| *kind == provider) {
			Some((_, manager)) => manager.clone(),
			None => {
				let manager = settings
					.manager(provider, data_dir)
					.wrap_err_with(|| format!("configuring {provider}"))?;

				managers.push((provider, manager.clone()));

				manager
			},
		};
		let report = job
			.run(&manager, data_dir, range)
			.await
			.wrap_err_with(|| format!("running {job} for {range}"))?;

		println!(
			"{job}: fetched {}, upserted {}, {} rows in {}",
			report.fetched,
			report.incoming,
			report.total,
			report.output.display()
		);
	}

	Ok(())
}

async fn token(settings: &Settings, data_dir: &Path, args: TokenArgs) -> eyre::Result<()> {
	let manager = settings
		.manager(args.provider, data_dir)
		.wrap_err_with(|| format!("configuring {}", args.provider))?;
	let grant = if args.refresh {
		manager.force_refresh().await
	} else {
		manager.access_token().await
	}
	.wrap_err_with(|| format!("resolving the {} access token", args.provider))?;
	let expires_at = match grant.expires_at {
		Some(at) => at.format(&Rfc3339).wrap_err("formatting the expiry")?,
		None => "unknown".into(),
	};

	println!("provider: {}", args.provider);
	println!("account: {}", grant.account_id);
	println!("expires_at: {expires_at}");

	Ok(())
}

async fn authorize(
	settings: &Settings,
	data_dir: &Path,
	env_file: &Path,
	args: AuthorizeArgs,
) -> eyre::Result<()> {
	let provider = settings
		.provider(args.provider)
		.wrap_err_with(|| format!("configuring {}", args.provider))?;
	let redirect_uri = match args.redirect_uri.or(provider.redirect_uri) {
		Some(uri) => uri,
		None => eyre::bail!(
			"no redirect URI; pass --redirect-uri or set {}",
			ProviderKeys::new(args.provider).redirect_uri
		),
	};
	let manager = settings
		.manager(args.provider, data_dir)
		.wrap_err_with(|| format!("configuring {}", args.provider))?;
	let session = manager.start_authorization(redirect_uri);
	let prompt = format!(
		"Open this URL in a browser and approve access:\n\n{}\n\n\
		 Paste the URL you were redirected to: ",
		session.authorize_url
	);
	let mut stdout = io::stdout();

	stdout.write_all(prompt.as_bytes()).await?;
	stdout.flush().await?;

	let mut line = String::new();

	BufReader::new(io::stdin())
		.read_line(&mut line)
		.await
		.wrap_err("reading the redirect URL from stdin")?;

	let redirect = Url::parse(line.trim()).wrap_err("parsing the redirect URL")?;
	let (access, grant) = manager
		.complete_authorization(session, &redirect)
		.await
		.wrap_err_with(|| format!("completing {} authorization", args.provider))?;

	config::update_env_file(env_file, &provider.keys.refresh_token, grant.refresh_token.expose())
		.wrap_err_with(|| format!("saving {}", provider.keys.refresh_token))?;
	config::update_env_file(env_file, &provider.keys.user_id, &access.account_id)
		.wrap_err_with(|| format!("saving {}", provider.keys.user_id))?;

	println!(
		"\nAuthorized {} account {}; saved {} and {} to {}.",
		args.provider,
		access.account_id,
		provider.keys.refresh_token,
		provider.keys.user_id,
		env_file.display()
	);

	Ok(())
}

fn parse_date(raw: &str) -> Result<Date, String> {
	parse_iso_date(raw).ok_or_else(|| format!("`{raw}` is not a YYYY-MM-DD date"))
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::date;
	// self
	use super::*;

	#[test]
	fn pull_accepts_explicit_range() {
		let cli = Cli::try_parse_from([
			"lifeops",
			"pull",
			"fitbit-heart",
			"withings-weight",
			"--start",
			"2025-01-01",
			"--end",
			"2025-01-31",
		])
		.expect("Command line should parse.");
		let Command::Pull(args) = cli.command else { panic!("Expected the pull command.") };
		let range = args.range().expect("Range should resolve.");

		assert_eq!(args.jobs, vec![PullJob::FitbitHeart, PullJob::WithingsWeight]);
		assert_eq!(range.start(), date!(2025 - 01 - 01));
		assert_eq!(range.end(), date!(2025 - 01 - 31));
		assert_eq!(cli.env_file, PathBuf::from(".env"));
	}

	#[test]
	fn days_conflicts_with_explicit_range() {
		let parsed = Cli::try_parse_from([
			"lifeops",
			"pull",
			"fitbit-steps",
			"--days",
			"7",
			"--start",
			"2025-01-01",
			"--end",
			"2025-01-02",
		]);

		assert!(parsed.is_err());
	}

	#[test]
	fn inverted_range_is_rejected() {
		let cli = Cli::try_parse_from([
			"lifeops",
			"pull",
			"fitbit-sleep",
			"--start",
			"2025-02-01",
			"--end",
			"2025-01-01",
		])
		.expect("Command line should parse.");
		let Command::Pull(args) = cli.command else { panic!("Expected the pull command.") };

		assert!(args.range().is_err());
	}

	#[test]
	fn token_and_authorize_take_a_provider() {
		let cli = Cli::try_parse_from(["lifeops", "-v", "token", "withings", "--refresh"])
			.expect("Command line should parse.");

		assert!(cli.verbose);
		assert!(matches!(
			cli.command,
			Command::Token(TokenArgs { provider: ProviderKind::Withings, refresh: true })
		));

		let cli = Cli::try_parse_from([
			"lifeops",
			"authorize",
			"fitbit",
			"--redirect-uri",
			"http://127.0.0.1:8080/callback",
		])
		.expect("Command line should parse.");

		assert!(matches!(
			cli.command,
			Command::Authorize(AuthorizeArgs { provider: ProviderKind::Fitbit, .. })
		));
	}
}
