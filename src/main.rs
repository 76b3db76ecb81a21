use std::fs::File;
use std::io::BufReader;
use std::path::{
    Path,
    PathBuf
};
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{
    Parser,
    Subcommand
};
use serde::Serialize;
use tracing::error;
use tracing_subscriber::{
    EnvFilter,
    layer::SubscriberExt,
    util::SubscriberInitExt
};

use curvebuilder::configuration::Configuration;
use curvebuilder::curveerror::CurveResult;
use curvebuilder::instrument::bond::bond::BondTerms;
use curvebuilder::manager::managererror::ManagerError;
use curvebuilder::model::modelfactory::{
    BuildRequest,
    build_model
};

/// Term structure builder for bond, CPI and seasonality curves
#[derive(Parser)]
#[command(name = "curvebuilder")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration JSON with calendars, bond conventions and defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a model from a request JSON and print its results
    Build {
        request: PathBuf,

        /// Seasonality request whose model adjusts a CPI build
        #[arg(short, long)]
        seasonality: Option<PathBuf>,

        #[arg(short, long)]
        pretty: bool,
    },

    /// Print the cashflow schedule of a bond
    Schedule {
        bond: PathBuf,

        /// Base date (YYYY-MM-DD); flows before it project to zero
        #[arg(short, long)]
        base_date: NaiveDate,

        #[arg(short, long)]
        pretty: bool,
    },
}

fn read_json(path: &Path) -> CurveResult<serde_json::Value> {
    let file = File::open(path).map_err(ManagerError::IOError)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> CurveResult<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

fn run(cli: Cli) -> CurveResult<()> {
    let config = match &cli.config {
        Some(path) => Configuration::from_reader(path)?,
        None => Configuration::default(),
    };

    match cli.command {
        Commands::Build { request, seasonality, pretty } => {
            let seasonality = match seasonality {
                Some(path) => {
                    let request = BuildRequest::from_json(read_json(&path)?)?;
                    Some(build_model(&request, &config, None)?.into_seasonality()?)
                }
                None => None,
            };
            let request = BuildRequest::from_json(read_json(&request)?)?;
            let model = build_model(&request, &config, seasonality)?;
            print_json(&model.results(), pretty)
        }
        Commands::Schedule { bond, base_date, pretty } => {
            let terms: BondTerms = serde_json::from_value(read_json(&bond)?)?;
            let bond = terms.create_bond(&config)?;
            print_json(&bond.projected_schedule(base_date)?, pretty)
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "curvebuilder failed");
            for diagnostic in e.diagnostics() {
                eprintln!(
                    "{}: target_pv={} model_pv={} diff={}",
                    diagnostic.instrument, diagnostic.target_pv, diagnostic.model_pv, diagnostic.diff
                );
            }
            ExitCode::FAILURE
        }
    }
}
