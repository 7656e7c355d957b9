//! `lifeops` binary entry point.

// crates.io
use clap::Parser;
// self
use lifeops_ingest::{
	cli::{self, Cli},
	obs,
};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let cli = Cli::parse();

	obs::init_logging(cli.verbose);

	cli::run(cli).await
}
