use std::path::PathBuf;

use aws_config::SdkConfig;
use clap::{Parser, Subcommand};
use tripod_core::commands;
use tripod_core::manifest::{load_manifest, DEFAULT_MANIFEST_FILE};
use tracing::error;
use tripod_core::TripodResult;

use crate::adapters::lambda::LambdaPlatform;
use crate::adapters::parameter_store::ParameterStore;
use crate::logging::LogFormat;

#[derive(Debug, Parser)]
#[command(
    name = "tripod",
    about = "Publish serverless functions declared in a tripod manifest",
    long_about = "Reads a tripod manifest, packages the named function's files\n\
                  and creates or updates it on AWS Lambda, cutting a new version."
)]
pub struct Cli {
    /// Manifest describing functions and layers
    #[arg(long, global = true, env = "TRIPOD_MANIFEST", default_value = DEFAULT_MANIFEST_FILE)]
    pub manifest: PathBuf,
    /// AWS region; defaults to the SDK provider chain
    #[arg(long, global = true, env = "TRIPOD_REGION")]
    pub region: Option<String>,
    /// Also write each function package here as `<function>.zip`
    #[arg(long, global = true, env = "TRIPOD_ARCHIVE_DIR")]
    pub archive_dir: Option<PathBuf>,
    /// Log output format (stderr)
    #[arg(value_enum, long, global = true, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Commands {
    /// Print the functions declared in the manifest
    List,
    /// Package and create-or-update one function, then publish a version
    Publish {
        /// Function name as declared in the manifest
        function: String,
    },
    /// Build and publish a new version of a declared layer
    PublishLayer {
        /// Layer name as declared under `layers:`
        layer: String,
    },
}

/// Loads the manifest and runs the selected command against AWS.
pub fn run(cli: &Cli, sdk_config: &SdkConfig) -> TripodResult<()> {
    let secrets = ParameterStore::new(sdk_config);
    let manifest = load_manifest(&cli.manifest, &secrets)?;

    match &cli.command {
        Commands::List => {
            print!("{}", commands::render_function_list(&manifest));
        }
        Commands::Publish { function } => {
            println!("publishing {function}");
            let platform = LambdaPlatform::new(sdk_config);
            let outcome =
                commands::publish(&manifest, function, &platform, cli.archive_dir.as_deref())?;
            println!(
                "{} function {} (version {})",
                outcome.action, outcome.function_name, outcome.version
            );
        }
        Commands::PublishLayer { layer } => {
            let platform = LambdaPlatform::new(sdk_config);
            let outcome = commands::publish_layer(&manifest, layer, &platform)?;
            println!(
                "published layer {} ({} files): {}",
                outcome.layer_name, outcome.entries, outcome.version_arn
            );
        }
    }
    Ok(())
}

/// Reports a failed run once, through the log, and maps it to the process
/// exit status.
pub fn finish(result: TripodResult<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(failure) => {
            error!(error = %failure, "tripod failed");
            failure.exit_code()
        }
    }
}
