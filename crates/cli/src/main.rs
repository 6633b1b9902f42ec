use std::process::ExitCode;

use clap::Parser;
use pagecast_cli::settings::Settings;
use pagecast_cli::{app, logging};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
	let settings = Settings::parse();
	logging::init_logging(&settings.log_level, &settings.log_format);

	match app::run(settings).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!(target = "pagecast", error = %format!("{err:#}"), "fatal error");
			ExitCode::FAILURE
		}
	}
}
