//! salary-sacrifice: scenario runner for the salary-sacrifice pension cap.
//!
//! Usage:
//!   salary-sacrifice matrix --cap 2000 --year 2026
//!   salary-sacrifice single --cap 2000 --employer absorb --employee maintain
//!   salary-sacrifice distributional --cap 2000 --year 2026
//!   salary-sacrifice --bridge python --bridge-arg -m --bridge-arg engine_bridge matrix

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use salary_sacrifice_core::{
    config::{AnalysisConfig, EngineSpec, DEFAULT_SYNTHETIC_SEED},
    dispatch::{execute, OutputOptions, Request},
    engine::{bridge::BridgeCommand, build_backend},
    scenario::{EmployeeResponse, EmployerResponse},
    types::{Gbp, Year},
};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "salary-sacrifice")]
#[command(about = "UK salary sacrifice pension cap analysis")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Household dataset (JSON) for the in-process engine
    #[arg(long, global = true, conflicts_with_all = ["synthetic", "bridge"])]
    dataset: Option<PathBuf>,

    /// Use a synthetic population of this many households
    #[arg(long, global = true, conflicts_with = "bridge")]
    synthetic: Option<usize>,

    /// Seed for the synthetic population
    #[arg(long, global = true, conflicts_with_all = ["dataset", "bridge"])]
    seed: Option<u64>,

    /// External engine program speaking the JSON-lines bridge protocol
    #[arg(long, global = true)]
    bridge: Option<String>,

    /// Argument passed to the bridge program (repeatable)
    #[arg(long = "bridge-arg", global = true, allow_hyphen_values = true)]
    bridge_args: Vec<String>,

    /// Dataset path handed to the bridge engine
    #[arg(long, global = true, requires = "bridge")]
    bridge_dataset: Option<PathBuf>,

    /// Output directory for CSV exports
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Skip CSV exports
    #[arg(long, global = true)]
    no_save: bool,

    /// Also write the full results as JSON to this path
    #[arg(long, global = true)]
    json: Option<PathBuf>,

    /// Count pension contributions as household income
    #[arg(long, global = true)]
    pensions_as_income: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the 2x2 scenario matrix
    Matrix(MatrixArgs),
    /// Run a single scenario
    Single(SingleArgs),
    /// Calculate distributional impact by income decile
    Distributional(DistributionalArgs),
}

#[derive(Args, Debug)]
struct MatrixArgs {
    /// Cap amount in GBP (repeat for several caps)
    #[arg(short, long)]
    cap: Vec<Gbp>,

    /// Year to analyse
    #[arg(short, long)]
    year: Option<Year>,

    /// Last year of a multi-year run
    #[arg(long)]
    through: Option<Year>,

    /// Add the targeted-haircut comparison scenario
    #[arg(long)]
    with_targeted: bool,
}

#[derive(Args, Debug)]
struct SingleArgs {
    /// Cap amount in GBP
    #[arg(short, long)]
    cap: Option<Gbp>,

    /// Employer response
    #[arg(short, long, value_enum, default_value_t = EmployerArg::Spread)]
    employer: EmployerArg,

    /// Employee response
    #[arg(short = 'E', long, value_enum, default_value_t = EmployeeArg::Maintain)]
    employee: EmployeeArg,

    /// Share of the excess redirected to pension (with --employee partial)
    #[arg(long)]
    redirect_rate: Option<f64>,

    /// Year to analyse
    #[arg(short, long)]
    year: Option<Year>,

    /// Last year of a multi-year run
    #[arg(long)]
    through: Option<Year>,
}

#[derive(Args, Debug)]
struct DistributionalArgs {
    /// Cap amount in GBP
    #[arg(short, long)]
    cap: Option<Gbp>,

    /// Year to analyse
    #[arg(short, long)]
    year: Option<Year>,

    /// Employer response
    #[arg(short, long, value_enum, default_value_t = EmployerArg::Spread)]
    employer: EmployerArg,

    /// Employee response
    #[arg(short = 'E', long, value_enum, default_value_t = EmployeeArg::Maintain)]
    employee: EmployeeArg,

    /// Share of the excess redirected to pension (with --employee partial)
    #[arg(long)]
    redirect_rate: Option<f64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum EmployerArg {
    Spread,
    Absorb,
    Targeted,
}

impl From<EmployerArg> for EmployerResponse {
    fn from(arg: EmployerArg) -> Self {
        match arg {
            EmployerArg::Spread   => EmployerResponse::SpreadCost,
            EmployerArg::Absorb   => EmployerResponse::AbsorbCost,
            EmployerArg::Targeted => EmployerResponse::TargetedHaircut,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum EmployeeArg {
    Maintain,
    Cash,
    Partial,
}

impl From<EmployeeArg> for EmployeeResponse {
    fn from(arg: EmployeeArg) -> Self {
        match arg {
            EmployeeArg::Maintain => EmployeeResponse::MaintainPension,
            EmployeeArg::Cash     => EmployeeResponse::TakeCash,
            EmployeeArg::Partial  => EmployeeResponse::PartialRedirect,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    // Argument errors exit here with clap's status (2), before any engine
    // is built.
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };

    let request = build_request(&cli.command, &config);
    let plan = request
        .plan(&config.defaults)
        .context("invalid scenario")?;
    log::debug!("plan: {} scenarios over {:?}", plan.scenarios.len(), plan.years);

    let engine = engine_spec(&cli, &config)?;
    let backend = build_backend(&engine, frame_options(&cli, &config))
        .context("cannot start simulation engine")?;

    let output = OutputOptions {
        save_dir:  if cli.no_save { None } else { Some(cli.output.clone().unwrap_or(config.output_dir.clone())) },
        json_path: cli.json.clone(),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(&plan, backend.as_ref(), &mut out, &output)?;
    Ok(())
}

fn build_request(command: &Commands, config: &AnalysisConfig) -> Request {
    let defaults = &config.defaults;
    match command {
        Commands::Matrix(args) => Request::Matrix {
            caps:          args.cap.clone(),
            year:          args.year.unwrap_or(defaults.year),
            through:       args.through,
            with_targeted: args.with_targeted,
        },
        Commands::Single(args) => Request::Single {
            cap:           args.cap.unwrap_or(defaults.cap),
            year:          args.year.unwrap_or(defaults.year),
            through:       args.through,
            employer:      args.employer.into(),
            employee:      args.employee.into(),
            redirect_rate: args.redirect_rate,
        },
        Commands::Distributional(args) => Request::Distributional {
            cap:           args.cap.unwrap_or(defaults.cap),
            year:          args.year.unwrap_or(defaults.year),
            employer:      args.employer.into(),
            employee:      args.employee.into(),
            redirect_rate: args.redirect_rate,
        },
    }
}

/// Command-line engine flags win over the config file. `--seed` applies to
/// whichever synthetic population is chosen and is an error otherwise.
fn engine_spec(cli: &Cli, config: &AnalysisConfig) -> Result<EngineSpec> {
    let mut spec = if let Some(program) = &cli.bridge {
        EngineSpec::Bridge(BridgeCommand {
            program: program.clone(),
            args:    cli.bridge_args.clone(),
            dataset: cli.bridge_dataset.clone(),
        })
    } else if let Some(dataset) = &cli.dataset {
        EngineSpec::Frame { dataset: dataset.clone() }
    } else if let Some(households) = cli.synthetic {
        let seed = match config.engine {
            EngineSpec::Synthetic { seed, .. } => seed,
            _ => DEFAULT_SYNTHETIC_SEED,
        };
        EngineSpec::Synthetic { households, seed }
    } else {
        config.engine.clone()
    };

    if let Some(seed) = cli.seed {
        match &mut spec {
            EngineSpec::Synthetic { seed: current, .. } => *current = seed,
            _ => bail!("--seed only applies to a synthetic population"),
        }
    }
    Ok(spec)
}

fn frame_options(
    cli: &Cli,
    config: &AnalysisConfig,
) -> salary_sacrifice_core::engine::frame::FrameOptions {
    let mut options = config.frame_options();
    if cli.pensions_as_income {
        options.net_income_includes_pensions = true;
    }
    options
}
