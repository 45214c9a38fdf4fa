//! Observed yield curve: mean quoted yields per maturity bucket.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::dataset::analysis::{COUPON, YEARS_TO_MATURITY, YTM_ASK, YTM_BID};
use crate::dataset::cleaning::COUNTRY;
use crate::fixed_income::rate_curve::RateCurveInput;
use crate::table::Table;
use crate::types::{with_metadata, ComputationOutput, Money, Percent, Side, Years};
use crate::BondRiskResult;

/// Which rows and columns feed the curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveFilter {
    /// Keep only rows whose country column equals this value
    pub country: Option<String>,
    pub country_field: String,
    pub maturity_field: String,
    pub bid_field: String,
    pub ask_field: String,
    pub coupon_field: String,
}

impl Default for CurveFilter {
    fn default() -> Self {
        Self {
            country: None,
            country_field: COUNTRY.into(),
            maturity_field: YEARS_TO_MATURITY.into(),
            bid_field: YTM_BID.into(),
            ask_field: YTM_ASK.into(),
            coupon_field: COUPON.into(),
        }
    }
}

/// Mean quotes for one maturity bucket. Blank quotes are skipped, so a
/// bucket with no bid quotes has no bid mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldPoint {
    pub maturity: Years,
    pub ytm_bid: Option<Percent>,
    pub ytm_ask: Option<Percent>,
    pub coupon: Option<Percent>,
    pub observations: usize,
}

#[derive(Default)]
struct Bucket {
    rows: usize,
    bid: Mean,
    ask: Mean,
    coupon: Mean,
}

#[derive(Default)]
struct Mean {
    sum: Decimal,
    count: u32,
}

impl Mean {
    fn add(&mut self, value: Option<Decimal>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<Decimal> {
        (self.count > 0).then(|| self.sum / Decimal::from(self.count))
    }
}

/// Group rows by maturity and average their bid, ask and coupon, ascending
/// by maturity. Rows without a numeric maturity are skipped with a warning.
pub fn mean_yields_by_maturity(
    table: &Table,
    filter: &CurveFilter,
) -> BondRiskResult<ComputationOutput<Vec<YieldPoint>>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let mut required = vec![
        filter.maturity_field.as_str(),
        filter.bid_field.as_str(),
        filter.ask_field.as_str(),
    ];
    if filter.country.is_some() {
        required.push(filter.country_field.as_str());
    }
    table.require_columns(&required)?;

    let mut buckets: BTreeMap<Decimal, Bucket> = BTreeMap::new();
    let mut skipped = 0;
    for row in table.rows() {
        if let Some(country) = &filter.country {
            if row.text(&filter.country_field) != Some(country.as_str()) {
                continue;
            }
        }
        let Some(maturity) = row.number(&filter.maturity_field) else {
            skipped += 1;
            continue;
        };
        let bucket = buckets.entry(maturity.normalize()).or_default();
        bucket.rows += 1;
        bucket.bid.add(row.number(&filter.bid_field));
        bucket.ask.add(row.number(&filter.ask_field));
        bucket.coupon.add(row.number(&filter.coupon_field));
    }

    if skipped > 0 {
        warnings.push(format!("{skipped} rows without a numeric maturity were skipped"));
    }
    if buckets.is_empty() {
        warnings.push(match &filter.country {
            Some(c) => format!("No bonds matched country '{c}'"),
            None => "No bonds to build a curve from".to_string(),
        });
    }

    let points: Vec<YieldPoint> = buckets
        .into_iter()
        .map(|(maturity, b)| YieldPoint {
            maturity,
            ytm_bid: b.bid.value(),
            ytm_ask: b.ask.value(),
            coupon: b.coupon.value(),
            observations: b.rows,
        })
        .collect();

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "country": filter.country,
        "grouping": filter.maturity_field,
        "aggregate": "arithmetic mean, blanks skipped",
    });

    Ok(with_metadata(
        "Observed Yield Curve (mean YTM by maturity)",
        &assumptions,
        warnings,
        elapsed,
        points,
    ))
}

/// Turn curve points into rate-curve input at one side's yields.
///
/// Buy takes the ask mean, Sell the bid mean; percent yields become decimals
/// and a missing coupon mean counts as zero-coupon. Points lacking that
/// side's yield are left out.
pub fn to_rate_curve_input(points: &[YieldPoint], side: Side, face_value: Money) -> RateCurveInput {
    let mut input = RateCurveInput {
        ytms: Vec::new(),
        coupon_rates: Vec::new(),
        maturities: Vec::new(),
        face_value,
    };
    for p in points {
        let quote = match side {
            Side::Buy => p.ytm_ask,
            Side::Sell => p.ytm_bid,
        };
        if let Some(ytm) = quote {
            input.ytms.push(ytm / dec!(100));
            input.coupon_rates.push(p.coupon.unwrap_or(Decimal::ZERO));
            input.maturities.push(p.maturity);
        }
    }
    input
}
