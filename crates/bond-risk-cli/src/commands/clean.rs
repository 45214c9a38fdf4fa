use clap::Args;
use serde_json::Value;
use std::collections::BTreeMap;

use bond_risk_core::config::parse_date;
use bond_risk_core::dataset::cleaning::{clean_dataset, CdsSheets, CleaningOptions, COUNTRY};
use bond_risk_core::AnalysisConfig;

use crate::input;
use crate::output::export;

/// Arguments for preparing the analysis table from raw sheets
#[derive(Args)]
pub struct CleanArgs {
    /// Raw bond sheet (CSV or JSON rows)
    #[arg(long)]
    pub bonds: String,

    /// 10-year CDS sheet
    #[arg(long = "cds-10y")]
    pub cds_10y: String,

    /// 5-year CDS sheet
    #[arg(long = "cds-5y")]
    pub cds_5y: String,

    /// 2-year CDS sheet
    #[arg(long = "cds-2y")]
    pub cds_2y: String,

    /// Issuer → country pairings for issuers whose name carries no country
    #[arg(long)]
    pub overrides: Option<String>,

    /// Cleaning options (JSON/YAML): column names, dropped columns, countries
    #[arg(long)]
    pub options: Option<String>,

    /// Valuation date (dd.mm.yyyy or yyyy-mm-dd), overriding the config
    #[arg(long)]
    pub as_of: Option<String>,

    /// Also write the cleaned table to this CSV file
    #[arg(long)]
    pub export: Option<String>,
}

pub fn run_clean(args: CleanArgs, config: &AnalysisConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let mut options: CleaningOptions = match args.options {
        Some(ref path) => input::file::read_structured(path)?,
        None => CleaningOptions::default(),
    };
    if let Some(ref path) = args.overrides {
        options.country_overrides.extend(read_overrides(path, &options.issuer_field)?);
    }

    let mut config = config.clone();
    if let Some(ref raw) = args.as_of {
        config.as_of_date = parse_date(raw)?;
    }

    let bonds = input::table::read_table(&args.bonds)?;
    let sheets = CdsSheets {
        ten_year: input::table::read_table(&args.cds_10y)?,
        five_year: input::table::read_table(&args.cds_5y)?,
        two_year: input::table::read_table(&args.cds_2y)?,
    };

    let result = clean_dataset(&bonds, sheets, &options, &config)?;
    if let Some(ref path) = args.export {
        export::write_table_csv(&result.result, path)?;
    }
    Ok(serde_json::to_value(result)?)
}

/// Pairings come either as a table with issuer and `Country` columns or as a
/// JSON/YAML map of issuer → country.
fn read_overrides(
    path: &str,
    issuer_field: &str,
) -> Result<BTreeMap<String, String>, Box<dyn std::error::Error>> {
    if path.ends_with(".csv") {
        let table = input::table::read_table(path)?;
        table.require_columns(&[issuer_field, COUNTRY])?;
        return Ok(table
            .rows()
            .iter()
            .filter_map(|row| {
                let issuer = row.text(issuer_field)?;
                let country = row.text(COUNTRY)?;
                Some((issuer.to_string(), country.to_string()))
            })
            .collect());
    }
    input::file::read_structured(path)
}
