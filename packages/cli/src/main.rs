#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the Diridon station-area analysis.
//!
//! Each subcommand runs one pipeline stage against a project root holding
//! `data/raw/`; `all` runs them in order. Logging goes through
//! [`diridon_cli_utils::init_logger`] so log lines and progress bars share
//! the terminal.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use diridon_cli_utils::{IndicatifProgress, MultiProgress};
use diridon_pipeline::config::PipelineConfig;
use diridon_pipeline::{etl, maps, station};
use diridon_spatial::progress::ProgressCallback;
use diridon_storage::paths::{DataPaths, project_root};

#[derive(Parser)]
#[command(name = "diridon_cli", about = "San Jose parcel, zoning and Census analysis")]
struct Cli {
    /// Pipeline config file. Defaults to the built-in configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Project root containing `data/`. Defaults to the workspace root.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join parcels to zoning and tracts, pull ACS data and write `data/processed/`
    Etl,
    /// Summarize parcels and tracts around the station and draw the buffer map
    Station,
    /// Render tract choropleths and the interactive map
    Maps,
    /// Run etl, station and maps in order
    All,
}

async fn run_etl(
    config: &PipelineConfig,
    paths: &DataPaths,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let progress = IndicatifProgress::features_bar(multi, "Joining parcels");
    etl::run_etl(config, paths, &progress).await?;
    Ok(())
}

fn run_station(
    config: &PipelineConfig,
    paths: &DataPaths,
) -> Result<(), Box<dyn std::error::Error>> {
    let outputs = station::run_station(&config.station, paths)?;
    println!(
        "{} parcels within {} mi of {} ({} urban)",
        outputs.total_parcels,
        config.station.inner_miles,
        config.station.name,
        outputs.uv_parcels,
    );
    for (label, value) in &outputs.acs_values {
        match value {
            Some(value) => println!("  {label:<32} {value:.2}"),
            None => println!("  {label:<32} n/a"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = diridon_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = PipelineConfig::load(cli.config.as_deref())?;
    let paths = DataPaths::new(cli.root.unwrap_or_else(project_root));
    let start = Instant::now();

    match cli.command {
        Commands::Etl => run_etl(&config, &paths, &multi).await?,
        Commands::Station => run_station(&config, &paths)?,
        Commands::Maps => {
            maps::run_maps(&config.maps, &config.station, &paths)?;
        }
        Commands::All => {
            let stages = IndicatifProgress::stages_bar(&multi, "Pipeline", 3);
            stages.set_message("etl".to_string());
            run_etl(&config, &paths, &multi).await?;
            stages.inc(1);
            stages.set_message("station".to_string());
            run_station(&config, &paths)?;
            stages.inc(1);
            stages.set_message("maps".to_string());
            maps::run_maps(&config.maps, &config.station, &paths)?;
            stages.inc(1);
            stages.finish("Pipeline complete".to_string());
        }
    }

    log::info!("Finished in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}
