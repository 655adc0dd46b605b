use std::process::ExitCode;

use clap::Parser;
use tripod_aws::adapters::load_sdk_config;
use tripod_aws::cli::{finish, run, Cli};
use tripod_aws::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let sdk_config = load_sdk_config(cli.region.clone()).await;
    ExitCode::from(finish(run(&cli, &sdk_config)))
}
