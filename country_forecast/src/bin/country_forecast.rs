//! Country forecast CLI
//!
//! Preprocesses the raw dataset, trains per-country models and answers
//! single forecast queries from the saved models.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use country_forecast::config::PipelineConfig;
use country_forecast::registry::FsModelStore;
use country_forecast::server::ForecastServer;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "country-forecast")]
#[command(version = country_forecast::VERSION)]
#[command(about = "Per-country energy forecasting", long_about = None)]
struct Args {
    /// Pipeline configuration file (YAML)
    #[arg(short, long, default_value = "config/config.yaml")]
    config: PathBuf,

    /// Override the model directory from the config file
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill missing targets and split the raw dataset into train/test CSVs
    Preprocess,
    /// Train one model per country and write the evaluation report
    Train,
    /// Forecast one country for one year from the saved models
    Predict {
        /// Country name as it appears in the dataset
        #[arg(long)]
        country: String,

        /// Absolute year to forecast
        #[arg(long)]
        year: i32,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_level.as_str())),
        )
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let mut config = if args.config.exists() {
        PipelineConfig::from_yaml_file(&args.config)
            .with_context(|| format!("Failed to load config {}", args.config.display()))?
    } else {
        info!(
            "Config {} not found, using defaults",
            args.config.display()
        );
        PipelineConfig::default()
    };
    if let Some(dir) = args.model_dir {
        config.model.dir = dir;
    }

    match args.command {
        Command::Preprocess => {
            let summary = country_forecast::pipeline::preprocess(&config)
                .context("Preprocessing failed")?;
            println!(
                "Train rows: {}, test rows: {}, filled targets: {}",
                summary.train_rows, summary.test_rows, summary.filled_targets
            );
        }
        Command::Train => {
            info!("Training {} models", config.model.kind);
            let report =
                country_forecast::pipeline::train(&config).context("Training failed")?;
            print!("{}", report);
        }
        Command::Predict { country, year } => {
            let store = FsModelStore::new(&config.model.dir);
            let server = ForecastServer::start(&store);
            info!(state = %server.state(), "Server started");

            let request = serde_json::json!({ "partition_key": country, "target_time": year });
            let reply = server.handle_predict_json(&request.to_string());
            println!("{} {}", reply.status, reply.body);
        }
    }

    Ok(())
}
