use clap::Args;
use serde_json::Value;

use bond_risk_core::dataset::analysis::analyze_table;
use bond_risk_core::AnalysisConfig;

use crate::input;
use crate::output::export;

/// Arguments for row-wise analysis of a bond table
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Path to the bond table (CSV or JSON rows); stdin if omitted
    #[arg(long)]
    pub input: Option<String>,

    /// Fail on the first bond whose metrics cannot be computed
    #[arg(long)]
    pub strict: bool,

    /// Also write the result table to this CSV file
    #[arg(long)]
    pub export: Option<String>,
}

pub fn run_analyze(args: AnalyzeArgs, config: &AnalysisConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let table = input::table::read_table_input(args.input.as_deref(), "analyze")?;
    let config = AnalysisConfig {
        strict: config.strict || args.strict,
        ..config.clone()
    };
    let result = analyze_table(&table, &config)?;
    if let Some(ref path) = args.export {
        export::write_table_csv(&result.result.table, path)?;
    }
    Ok(serde_json::to_value(result)?)
}
