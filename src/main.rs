//! CLI driver: parse an input CSV of region rows, simulate every row with
//! the selected routing algorithm, and write the scored report.

use clap::Parser;
use sliceroute::config::SimulationConfig;
use sliceroute::process;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "sliceroute",
    version,
    about = "Evaluate topology-aware endpoint-slice routing algorithms"
)]
struct Cli {
    /// Input CSV file: header `input name, zone1, ...`, one region per row.
    #[arg(short, long)]
    input: PathBuf,

    /// Output CSV file for the scored report.
    #[arg(short, long)]
    output: PathBuf,

    /// Routing algorithm name; overrides the configuration file.
    #[arg(short, long)]
    algorithm: Option<String>,

    /// Optional TOML configuration file with algorithm parameters.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    sliceroute::init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SimulationConfig::from_path(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(algorithm) = cli.algorithm {
        config.algorithm = algorithm;
    }

    info!(
        input = %cli.input.display(),
        output = %cli.output.display(),
        algorithm = %config.algorithm,
        "starting simulation run"
    );
    process::run(&cli.input, &cli.output, &config).await?;
    info!("simulation run complete");
    Ok(())
}
