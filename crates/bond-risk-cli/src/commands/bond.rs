use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Instant;

use bond_risk_core::fixed_income::bond_math::{analyze_bond, calculate_dv01};
use bond_risk_core::fixed_income::terms::BondTerms;
use bond_risk_core::types::with_metadata;
use bond_risk_core::AnalysisConfig;

use crate::input;

/// Arguments for single-bond analysis
#[derive(Args)]
pub struct BondArgs {
    /// Path to JSON/YAML bond terms
    #[arg(long)]
    pub input: Option<String>,

    /// Face value (defaults to the configured face value)
    #[arg(long)]
    pub face_value: Option<Decimal>,

    /// Annual coupon in percent; omit for a zero-coupon bond
    #[arg(long)]
    pub coupon: Option<Decimal>,

    /// Years to maturity
    #[arg(long)]
    pub years: Option<Decimal>,

    /// Bid yield to maturity in percent
    #[arg(long, allow_hyphen_values = true)]
    pub bid: Option<Decimal>,

    /// Ask yield to maturity in percent
    #[arg(long, allow_hyphen_values = true)]
    pub ask: Option<Decimal>,

    /// Coupon periods per year (defaults to the configured value)
    #[arg(long)]
    pub periods_per_year: Option<u32>,
}

/// Arguments for a standalone DV01
#[derive(Args)]
pub struct Dv01Args {
    /// Face value (defaults to the configured face value)
    #[arg(long)]
    pub face_value: Option<Decimal>,

    /// Annual coupon in percent; omit for a zero-coupon bond
    #[arg(long)]
    pub coupon: Option<Decimal>,

    /// Years to maturity
    #[arg(long)]
    pub years: Decimal,

    /// Yield to maturity in percent
    #[arg(long, allow_hyphen_values = true)]
    pub ytm: Decimal,

    /// Yield bump in basis points (defaults to the configured bump)
    #[arg(long, allow_hyphen_values = true)]
    pub bp: Option<Decimal>,

    /// Coupon periods per year (defaults to the configured value)
    #[arg(long)]
    pub periods_per_year: Option<u32>,
}

fn terms_from_args(
    args: &BondArgs,
    config: &AnalysisConfig,
) -> Result<BondTerms, Box<dyn std::error::Error>> {
    if let Some(ref path) = args.input {
        return input::file::read_structured(path);
    }
    if let Some(years) = args.years {
        return Ok(BondTerms {
            face_value: args.face_value.unwrap_or(config.default_face_value),
            coupon_rate: args.coupon,
            years_to_maturity: years,
            periods_per_year: args.periods_per_year.unwrap_or(config.periods_per_year),
            ytm_bid: args.bid,
            ytm_ask: args.ask,
        });
    }
    if let Some(data) = input::stdin::read_stdin()? {
        return Ok(serde_json::from_value(data)?);
    }
    Err("--input <file>, --years with --bid/--ask, or stdin required for bond".into())
}

pub fn run_bond(args: BondArgs, config: &AnalysisConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let terms = terms_from_args(&args, config)?;
    let result = analyze_bond(&terms, config.basis_point_change)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_dv01(args: Dv01Args, config: &AnalysisConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let face_value = args.face_value.unwrap_or(config.default_face_value);
    let bp = args.bp.unwrap_or(config.basis_point_change);
    let ppy = args.periods_per_year.unwrap_or(config.periods_per_year);

    let dv01 = calculate_dv01(face_value, args.coupon, args.years, args.ytm, bp, ppy)?;

    let assumptions = json!({
        "face_value": face_value.to_string(),
        "coupon_rate": args.coupon.map(|c| c.to_string()),
        "years_to_maturity": args.years.to_string(),
        "ytm": args.ytm.to_string(),
        "basis_point_change": bp.to_string(),
        "periods_per_year": ppy,
    });
    let result = with_metadata(
        "DV01 by finite difference (unrounded prices)",
        &assumptions,
        Vec::new(),
        start.elapsed().as_micros() as u64,
        json!({ "dv01": dv01.to_string() }),
    );
    Ok(serde_json::to_value(result)?)
}
