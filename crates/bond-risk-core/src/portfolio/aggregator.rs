use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::error::BondRiskError;
use crate::fixed_income::bond_math::calculate_dv01;
use crate::table::Table;
use crate::types::*;
use crate::BondRiskResult;

fn default_periods_per_year() -> u32 {
    2
}

fn default_basis_point_change() -> Decimal {
    Decimal::ONE
}

/// Column names the aggregator reads, plus the DV01 repricing convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioFields {
    /// Holding weight in percent of the invested portfolio
    pub weight: String,
    /// Bond price; also used as the face value when repricing for DV01
    pub price: String,
    /// Yield to maturity in percent
    pub ytm: String,
    /// Years to maturity
    pub maturity: String,
    /// Annual coupon in percent (blank = zero-coupon)
    pub coupon: String,
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: u32,
    #[serde(default = "default_basis_point_change")]
    pub basis_point_change: Decimal,
}

impl Default for PortfolioFields {
    fn default() -> Self {
        Self {
            weight: "Weight".into(),
            price: "Buy Price".into(),
            ytm: "YTM - Ask".into(),
            maturity: "Years to Maturity".into(),
            coupon: "Cpn".into(),
            periods_per_year: default_periods_per_year(),
            basis_point_change: default_basis_point_change(),
        }
    }
}

impl PortfolioFields {
    fn required(&self) -> [&str; 5] {
        [
            self.weight.as_str(),
            self.price.as_str(),
            self.ytm.as_str(),
            self.maturity.as_str(),
            self.coupon.as_str(),
        ]
    }
}

/// Portfolio-level figures, each `Σ (weight / 100) × per-bond value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub ytm: Decimal,
    pub duration: Decimal,
    pub modified_duration: Decimal,
    pub convexity: Decimal,
    pub dv01: Money,
    /// Number of rows aggregated
    pub holdings: usize,
    /// Sum of the weight column, in percent
    pub total_weight: Percent,
}

impl PortfolioMetrics {
    /// Flat metric-name → value mapping.
    pub fn as_map(&self) -> BTreeMap<&'static str, Decimal> {
        BTreeMap::from([
            ("YTM", self.ytm),
            ("Duration", self.duration),
            ("Modified Duration", self.modified_duration),
            ("Convexity", self.convexity),
            ("DV01", self.dv01),
        ])
    }

    /// The same mapping multiplied by 100 for display.
    pub fn scaled_for_display(&self) -> BTreeMap<&'static str, Decimal> {
        self.as_map()
            .into_iter()
            .map(|(k, v)| (k, v * dec!(100)))
            .collect()
    }
}

/// Weighted sum of per-bond metrics across a holdings table.
///
/// Weights are divided by 100 as given and never renormalised, so a table
/// whose weights do not total 100 yields a scaled sum rather than an average.
/// Use [`crate::portfolio::weights::normalize_weights`] first when a true
/// average is wanted.
///
/// Duration, modified duration and convexity are maturity-based
/// approximations: `T`, `T / (1 + y)` and `T(T + 1) / (1 + y)²` per bond.
pub fn calculate_portfolio_metrics(
    table: &Table,
    fields: &PortfolioFields,
) -> BondRiskResult<ComputationOutput<PortfolioMetrics>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    table.require_columns(&fields.required())?;
    if fields.periods_per_year == 0 {
        return Err(BondRiskError::InvalidInput {
            field: "periods_per_year".into(),
            reason: "Periods per year must be positive.".into(),
        });
    }

    let mut ytm = Decimal::ZERO;
    let mut duration = Decimal::ZERO;
    let mut modified_duration = Decimal::ZERO;
    let mut convexity = Decimal::ZERO;
    let mut dv01 = Decimal::ZERO;
    let mut total_weight = Decimal::ZERO;

    for (idx, row) in table.rows().iter().enumerate() {
        let weight_pct = row.require_number(&fields.weight, idx)?;
        let price = row.require_number(&fields.price, idx)?;
        let row_ytm = row.require_number(&fields.ytm, idx)?;
        let maturity = row.require_number(&fields.maturity, idx)?;
        let coupon = row.optional_number(&fields.coupon, idx)?;

        let w = weight_pct / dec!(100);
        let growth = Decimal::ONE + row_ytm / dec!(100);
        if growth.is_zero() {
            return Err(BondRiskError::DivisionByZero {
                context: format!("portfolio row {idx}: 1 + ytm/100 is zero"),
            });
        }

        let row_dv01 = calculate_dv01(
            price,
            coupon,
            maturity,
            row_ytm,
            fields.basis_point_change,
            fields.periods_per_year,
        )
        .map_err(|e| BondRiskError::InvalidInput {
            field: fields.price.clone(),
            reason: format!("Row {idx}: DV01 could not be computed ({e})"),
        })?;

        total_weight += weight_pct;
        ytm += w * row_ytm;
        duration += w * maturity;
        modified_duration += w * maturity / growth;
        convexity += w * maturity * (maturity + Decimal::ONE) / (growth * growth);
        dv01 += w * row_dv01;
    }

    if table.is_empty() {
        warnings.push("Portfolio has no holdings; all metrics are zero".into());
    } else if total_weight != dec!(100) {
        warnings.push(format!(
            "Weights total {total_weight}%, not 100%; metrics are a weighted sum, not an average"
        ));
    }
    for w in &warnings {
        tracing::warn!(warning = %w, "portfolio aggregation");
    }

    let output = PortfolioMetrics {
        ytm,
        duration,
        modified_duration,
        convexity,
        dv01,
        holdings: table.len(),
        total_weight,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "weight_field": fields.weight,
        "price_field": fields.price,
        "ytm_field": fields.ytm,
        "maturity_field": fields.maturity,
        "coupon_field": fields.coupon,
        "periods_per_year": fields.periods_per_year,
        "weighting": "sum of weight/100 × value, no renormalisation",
        "dv01_face_value": "row price",
    });

    Ok(with_metadata(
        "Portfolio Weighted Yield, Duration, Convexity & DV01",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn fields() -> PortfolioFields {
        PortfolioFields {
            weight: "Weight".into(),
            price: "Price".into(),
            ytm: "YTM".into(),
            maturity: "Years".into(),
            coupon: "Cpn".into(),
            periods_per_year: 2,
            basis_point_change: Decimal::ONE,
        }
    }

    fn holdings(weights: [Decimal; 2]) -> Table {
        let mut t = Table::new(["Weight", "Price", "YTM", "Years", "Cpn"]);
        t.push_values(vec![
            weights[0].into(),
            dec!(1000).into(),
            dec!(4).into(),
            dec!(10).into(),
            dec!(5).into(),
        ])
        .unwrap();
        t.push_values(vec![
            weights[1].into(),
            dec!(950).into(),
            dec!(5).into(),
            dec!(2).into(),
            Cell::Empty,
        ])
        .unwrap();
        t
    }

    #[test]
    fn test_weighted_sums() {
        let out = calculate_portfolio_metrics(&holdings([dec!(60), dec!(40)]), &fields()).unwrap();
        let m = &out.result;
        assert_eq!(m.ytm, dec!(4.4));
        assert_eq!(m.duration, dec!(6.8));
        assert_eq!(m.holdings, 2);
        assert_eq!(m.total_weight, dec!(100));
        assert!(m.dv01 < Decimal::ZERO);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_modified_and_convexity_formulas() {
        let out = calculate_portfolio_metrics(&holdings([dec!(100), Decimal::ZERO]), &fields())
            .unwrap();
        let m = &out.result;
        assert_eq!(m.modified_duration, dec!(10) / dec!(1.04));
        assert_eq!(m.convexity, dec!(110) / (dec!(1.04) * dec!(1.04)));
    }

    #[test]
    fn test_weights_not_renormalised() {
        let full = calculate_portfolio_metrics(&holdings([dec!(60), dec!(40)]), &fields()).unwrap();
        let half = calculate_portfolio_metrics(&holdings([dec!(30), dec!(20)]), &fields()).unwrap();
        assert_eq!(half.result.ytm * dec!(2), full.result.ytm);
        assert_eq!(half.warnings.len(), 1);
    }

    #[test]
    fn test_missing_fields_named_before_computation() {
        let mut f = fields();
        f.price = "Clean Price".into();
        f.coupon = "Coupon".into();
        match calculate_portfolio_metrics(&holdings([dec!(60), dec!(40)]), &f) {
            Err(BondRiskError::MissingFields(missing)) => {
                assert_eq!(missing, vec!["Clean Price".to_string(), "Coupon".to_string()])
            }
            other => panic!("Expected MissingFields, got {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_weight_rejected() {
        let mut t = holdings([dec!(60), dec!(40)]);
        t.rows_mut()[1].set("Weight", "forty");
        assert!(calculate_portfolio_metrics(&t, &fields()).is_err());
    }

    #[test]
    fn test_unreadable_coupon_rejected() {
        let mut t = holdings([dec!(60), dec!(40)]);
        t.rows_mut()[0].set("Cpn", Cell::parse("4,5"));
        match calculate_portfolio_metrics(&t, &fields()) {
            Err(BondRiskError::InvalidInput { field, .. }) => assert_eq!(field, "Cpn"),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_display_scaling() {
        let out = calculate_portfolio_metrics(&holdings([dec!(60), dec!(40)]), &fields()).unwrap();
        let scaled = out.result.scaled_for_display();
        assert_eq!(scaled["YTM"], dec!(440));
        assert_eq!(scaled["Duration"], dec!(680));
    }

    #[test]
    fn test_empty_portfolio_warns() {
        let t = Table::new(["Weight", "Price", "YTM", "Years", "Cpn"]);
        let out = calculate_portfolio_metrics(&t, &fields()).unwrap();
        assert_eq!(out.result.ytm, Decimal::ZERO);
        assert_eq!(out.warnings.len(), 1);
    }
}
