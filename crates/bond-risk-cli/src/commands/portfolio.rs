use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use bond_risk_core::portfolio::aggregator::{calculate_portfolio_metrics, PortfolioFields};
use bond_risk_core::portfolio::weights::normalize_weights;
use bond_risk_core::AnalysisConfig;

use crate::input;
use crate::output::export;

/// Arguments for portfolio aggregation
#[derive(Args)]
pub struct PortfolioArgs {
    /// Path to the holdings table (CSV or JSON rows); stdin if omitted
    #[arg(long)]
    pub input: Option<String>,

    /// Weight column, in percent
    #[arg(long, default_value = "Weight")]
    pub weight_field: String,

    /// Price column, also the face value for DV01
    #[arg(long, default_value = "Buy Price")]
    pub price_field: String,

    /// Yield column, in percent
    #[arg(long, default_value = "YTM - Ask")]
    pub ytm_field: String,

    /// Years-to-maturity column
    #[arg(long, default_value = "Years to Maturity")]
    pub maturity_field: String,

    /// Coupon column, in percent
    #[arg(long, default_value = "Cpn")]
    pub coupon_field: String,

    /// Rescale weights to total 100 before aggregating
    #[arg(long)]
    pub normalize: bool,

    /// Report each metric multiplied by 100
    #[arg(long)]
    pub scaled: bool,
}

/// Arguments for weight normalisation
#[derive(Args)]
pub struct NormalizeWeightsArgs {
    /// Path to the holdings table (CSV or JSON rows); stdin if omitted
    #[arg(long)]
    pub input: Option<String>,

    /// Weight column to rescale
    #[arg(long, default_value = "Weight")]
    pub weight_field: String,

    /// Also write the rescaled table to this CSV file
    #[arg(long)]
    pub export: Option<String>,
}

pub fn run_portfolio(
    args: PortfolioArgs,
    config: &AnalysisConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut table = input::table::read_table_input(args.input.as_deref(), "portfolio")?;
    if args.normalize {
        table = normalize_weights(&table, &args.weight_field)?;
    }

    let fields = PortfolioFields {
        weight: args.weight_field,
        price: args.price_field,
        ytm: args.ytm_field,
        maturity: args.maturity_field,
        coupon: args.coupon_field,
        periods_per_year: config.periods_per_year,
        basis_point_change: config.basis_point_change,
    };
    let result = calculate_portfolio_metrics(&table, &fields)?;

    let mut value = serde_json::to_value(&result)?;
    if args.scaled {
        let scaled: serde_json::Map<String, Value> = result
            .result
            .scaled_for_display()
            .into_iter()
            .map(|(k, v): (&str, Decimal)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        value["result"] = Value::Object(scaled);
    }
    Ok(value)
}

pub fn run_normalize_weights(args: NormalizeWeightsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let table = input::table::read_table_input(args.input.as_deref(), "normalize-weights")?;
    let normalized = normalize_weights(&table, &args.weight_field)?;
    if let Some(ref path) = args.export {
        export::write_table_csv(&normalized, path)?;
    }
    Ok(serde_json::to_value(&normalized)?)
}
