#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the food price extraction tool.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use food_prices_cli_utils::{IndicatifProgress, init_logger};
use food_prices_extract::config::{ConfigError, ExtractConfig, current_year};
use food_prices_extract::{ExtractError, run_extract};
use food_prices_extract_models::FailurePolicy;
use food_prices_scraper::identifier::app_identifier;

#[derive(Parser)]
#[command(
    name = "food_prices_extract",
    about = "Extract retail food prices from the HDX HAPI food price API"
)]
struct Cli {
    /// Path to a TOML config file (defaults to the embedded configuration)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every (country, commodity) query and write the CSV (default)
    Extract(ExtractArgs),
    /// Print the resolved scope and query list without fetching anything
    Scope,
    /// Print the `app_identifier` token sent with every request
    Identifier,
}

#[derive(Args, Default)]
struct ExtractArgs {
    /// Output CSV path
    #[arg(long)]
    output: Option<PathBuf>,
    /// What to do when one query fails: "abort" or "skip"
    #[arg(long)]
    failure_policy: Option<FailurePolicy>,
    /// First year of the window (inclusive)
    #[arg(long)]
    start_year: Option<i32>,
    /// Last year of the window (inclusive)
    #[arg(long)]
    end_year: Option<i32>,
    /// Records requested per page
    #[arg(long)]
    page_size: Option<u32>,
    /// Maximum pages fetched for one query before it is treated as failed
    #[arg(long)]
    max_pages: Option<u32>,
    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl ExtractArgs {
    fn apply(self, config: &mut ExtractConfig) -> Result<(), ConfigError> {
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if let Some(policy) = self.failure_policy {
            config.failure_policy = policy;
        }
        if let Some(year) = self.start_year {
            config.start_year = Some(year);
        }
        if let Some(year) = self.end_year {
            config.end_year = Some(year);
        }
        if let Some(size) = self.page_size {
            config.page_size = size;
        }
        if let Some(max) = self.max_pages {
            config.max_pages = max;
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }
        config.validate()
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ExtractConfig, ConfigError> {
    path.map_or_else(ExtractConfig::embedded, |p| ExtractConfig::load(p))
}

fn run(cli: Cli) -> Result<(), ExtractError> {
    let multi = init_logger();
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command.unwrap_or_else(|| Commands::Extract(ExtractArgs::default())) {
        Commands::Extract(args) => {
            args.apply(&mut config)?;
            let year = current_year();
            let scope = config.scope(year)?;
            let progress = IndicatifProgress::steps_bar(
                &multi,
                "Fetching",
                u64::try_from(scope.dimension_count()).unwrap_or(u64::MAX),
            );

            let summary = run_extract(&config, year, progress)?;
            println!("{summary}");
        }
        Commands::Scope => {
            let scope = config.scope(current_year())?;
            println!("Price type: {}", scope.price_type);
            println!("Years: {} to {}", scope.start_year, scope.end_year);
            println!("Failure policy: {}", config.failure_policy);
            println!(
                "Pages: up to {} full pages of {} records per query",
                config.max_pages, config.page_size
            );
            println!("Output: {}", config.output_path.display());
            println!("{:<8} COMMODITY", "COUNTRY");
            println!("{}", "-".repeat(30));
            for dimension in scope.dimensions() {
                println!("{:<8} {}", dimension.country, dimension.commodity);
            }
        }
        Commands::Identifier => {
            println!("{}", app_identifier(&config.app_name, &config.email));
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            if let ExtractError::NoData { failed } = &e {
                for failure in failed {
                    eprintln!("  failed: {} ({})", failure.dimension, failure.error);
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}
