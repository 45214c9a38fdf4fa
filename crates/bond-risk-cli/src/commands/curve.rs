use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Instant;

use bond_risk_core::dataset::curve::{mean_yields_by_maturity, to_rate_curve_input, CurveFilter};
use bond_risk_core::fixed_income::rate_curve::{
    build_rate_curves, create_forward_rate_curve, ForwardRate, RateCurveInput,
};
use bond_risk_core::types::with_metadata;
use bond_risk_core::{AnalysisConfig, Side};

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum QuoteSide {
    /// Ask yields
    Buy,
    /// Bid yields
    Sell,
}

impl From<QuoteSide> for Side {
    fn from(side: QuoteSide) -> Self {
        match side {
            QuoteSide::Buy => Side::Buy,
            QuoteSide::Sell => Side::Sell,
        }
    }
}

/// Arguments for spot (and forward) curve construction
#[derive(Args)]
pub struct SpotCurveArgs {
    /// Path to JSON/YAML with ytms, coupon_rates, maturities, face_value
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated yields to maturity as decimals (e.g. "0.04,0.045")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub ytms: Option<Vec<Decimal>>,

    /// Comma-separated annual coupons in percent
    #[arg(long, value_delimiter = ',')]
    pub coupons: Option<Vec<Decimal>>,

    /// Comma-separated years to maturity
    #[arg(long, value_delimiter = ',')]
    pub maturities: Option<Vec<Decimal>>,

    /// Face value shared by every bond
    #[arg(long, default_value = "100")]
    pub face_value: Decimal,
}

/// Arguments for forward rates from a spot curve
#[derive(Args)]
pub struct ForwardCurveArgs {
    /// Comma-separated spot rates as decimals
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub spots: Vec<Decimal>,

    /// Comma-separated maturities matching the spot rates
    #[arg(long, value_delimiter = ',')]
    pub maturities: Vec<Decimal>,
}

/// Arguments for the observed yield curve of a bond table
#[derive(Args)]
pub struct YieldCurveArgs {
    /// Path to the bond table (CSV or JSON rows)
    #[arg(long)]
    pub input: Option<String>,

    /// Keep only bonds from this country
    #[arg(long)]
    pub country: Option<String>,

    /// Also derive spot and forward curves at this side's mean yields
    #[arg(long, value_enum)]
    pub rate_curves: Option<QuoteSide>,
}

pub fn run_spot_curve(args: SpotCurveArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let curve_input: RateCurveInput = if let Some(ref path) = args.input {
        input::file::read_structured(path)?
    } else if let (Some(ytms), Some(maturities)) = (args.ytms, args.maturities) {
        let coupon_rates = args
            .coupons
            .unwrap_or_else(|| vec![Decimal::ZERO; ytms.len()]);
        RateCurveInput {
            ytms,
            coupon_rates,
            maturities,
            face_value: args.face_value,
        }
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file>, --ytms with --maturities, or stdin required for spot-curve".into());
    };
    let result = build_rate_curves(&curve_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_forward_curve(args: ForwardCurveArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let rates = create_forward_rate_curve(&args.spots, &args.maturities)?;

    let n = args.spots.len();
    let forwards: Vec<ForwardRate> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .zip(rates)
        .map(|((i, j), rate)| ForwardRate {
            start: args.maturities[i],
            end: args.maturities[j],
            rate,
        })
        .collect();

    let result = with_metadata(
        "Pairwise Forward Rates from Spot Rates",
        &json!({ "forward_pairs": "all i < j" }),
        Vec::new(),
        start.elapsed().as_micros() as u64,
        forwards,
    );
    Ok(serde_json::to_value(result)?)
}

pub fn run_yield_curve(
    args: YieldCurveArgs,
    config: &AnalysisConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let table = input::table::read_table_input(args.input.as_deref(), "yield-curve")?;
    let filter = CurveFilter {
        country: args.country,
        ..CurveFilter::default()
    };
    let curve = mean_yields_by_maturity(&table, &filter)?;

    let Some(side) = args.rate_curves else {
        return Ok(serde_json::to_value(curve)?);
    };
    let rate_input = to_rate_curve_input(&curve.result, side.into(), config.default_face_value);
    let rates = build_rate_curves(&rate_input)?;

    let mut warnings = curve.warnings;
    warnings.extend(rates.warnings);
    let result = with_metadata(
        "Observed Yield Curve with Implied Spot & Forward Rates",
        &json!({
            "country": filter.country,
            "side": Side::from(side).label(),
            "face_value": config.default_face_value.to_string(),
        }),
        warnings,
        curve.metadata.computation_time_us + rates.metadata.computation_time_us,
        json!({
            "points": curve.result,
            "spot_rates": rates.result.spot_rates,
            "forward_rates": rates.result.forward_rates,
        }),
    );
    Ok(serde_json::to_value(result)?)
}
