mod commands;
mod input;
mod output;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::analyze::AnalyzeArgs;
use commands::bond::{BondArgs, Dv01Args};
use commands::clean::CleanArgs;
use commands::curve::{ForwardCurveArgs, SpotCurveArgs, YieldCurveArgs};
use commands::portfolio::{NormalizeWeightsArgs, PortfolioArgs};

/// Bond pricing, risk metrics and rate curves
#[derive(Parser)]
#[command(
    name = "bondrisk",
    version,
    about = "Bond pricing, risk metrics and rate curves",
    long_about = "A CLI for bond analytics with decimal precision. Prices bonds on the \
                  bid and ask side, computes Macaulay and modified duration, convexity \
                  and DV01, derives spot and forward curves, aggregates portfolio risk, \
                  and prepares bond/CDS spreadsheets for analysis."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Analysis config file (JSON or YAML)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log verbosity on stderr (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse every bond in a table (prices, durations, convexity, DV01, spreads)
    Analyze(AnalyzeArgs),
    /// Analyse one bond on both sides of the market
    Bond(BondArgs),
    /// DV01 of one bond at one yield
    Dv01(Dv01Args),
    /// Implied spot rates (and forwards) from bond yields
    SpotCurve(SpotCurveArgs),
    /// Pairwise forward rates from spot rates
    ForwardCurve(ForwardCurveArgs),
    /// Mean observed yields by maturity from a bond table
    YieldCurve(YieldCurveArgs),
    /// Weighted portfolio yield, duration, convexity and DV01
    Portfolio(PortfolioArgs),
    /// Rescale a weight column to total 100
    NormalizeWeights(NormalizeWeightsArgs),
    /// Build the analysis table from raw bond and CDS sheets
    Clean(CleanArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "bond_risk_core=warn,bondrisk=warn",
        1 => "bond_risk_core=info,bondrisk=info",
        _ => "bond_risk_core=debug,bondrisk=debug",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match input::file::read_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Analyze(args) => commands::analyze::run_analyze(args, &config),
        Commands::Bond(args) => commands::bond::run_bond(args, &config),
        Commands::Dv01(args) => commands::bond::run_dv01(args, &config),
        Commands::SpotCurve(args) => commands::curve::run_spot_curve(args),
        Commands::ForwardCurve(args) => commands::curve::run_forward_curve(args),
        Commands::YieldCurve(args) => commands::curve::run_yield_curve(args, &config),
        Commands::Portfolio(args) => commands::portfolio::run_portfolio(args, &config),
        Commands::NormalizeWeights(args) => commands::portfolio::run_normalize_weights(args),
        Commands::Clean(args) => commands::clean::run_clean(args, &config),
        Commands::Version => {
            println!("bondrisk {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
