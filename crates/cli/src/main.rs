use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod api_client;
mod commands;
mod config;

#[derive(Parser)]
#[command(
    name = "driveseal",
    version,
    about = "driveseal CLI: upload files to an encrypting relay and fetch them back"
)]
struct Cli {
    /// Relay base URL, overriding the config file
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Config file to read instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file through the relay
    Upload {
        /// Path to the file to upload
        file_path: PathBuf,
        /// Content type to record, instead of letting the server default it
        #[arg(long)]
        mime: Option<String>,
    },
    /// Download a file by id
    Download {
        /// Identifier returned by `upload`
        id: String,
        /// Where to write the file; defaults to the stored name in the download directory
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Show storage usage of the relay's blob store
    Quota,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = config::CliConfig::load(cli.config.as_deref())?;
    if let Some(endpoint) = cli.endpoint {
        config.server.endpoint = endpoint;
    }
    let api = api_client::ApiClient::from_config(&config)?;

    match cli.command {
        Commands::Upload { file_path, mime } => {
            commands::upload::run(&api, &file_path, mime.as_deref()).await?;
        }
        Commands::Download { id, output } => {
            commands::download::run(&config, &api, &id, output.as_deref()).await?;
        }
        Commands::Quota => {
            commands::quota::run(&api).await?;
        }
    }

    Ok(())
}
