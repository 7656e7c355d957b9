// crates.io
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global log subscriber.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` for this crate when `verbose` is on.
/// Logs go to stderr so command output on stdout stays clean. Calling it twice is harmless.
pub fn init_logging(verbose: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		EnvFilter::new(if verbose { "info,lifeops_ingest=debug" } else { "info" })
	});

	let _ = fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).try_init();
}
