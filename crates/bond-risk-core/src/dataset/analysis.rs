//! Row-wise bond analytics over a cleaned bond table.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::AnalysisConfig;
use crate::error::BondRiskError;
use crate::fixed_income::bond_math::{calculate_bond_metrics, price_spread};
use crate::fixed_income::terms::BondTerms;
use crate::table::{Cell, Row, Table};
use crate::types::{with_metadata, ComputationOutput, Side};
use crate::BondRiskResult;

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

pub const FACE_VALUE: &str = "Face Value";
pub const YEARS_TO_MATURITY: &str = "Years to Maturity";
pub const YTM_BID: &str = "YTM - Bid";
pub const YTM_ASK: &str = "YTM - Ask";
pub const COUPON: &str = "Cpn";

pub const BUY_PRICE: &str = "Buy Price";
pub const SELL_PRICE: &str = "Sell Price";
pub const MACAULAY_BUY: &str = "Macaulay Duration (Buy)";
pub const MACAULAY_SELL: &str = "Macaulay Duration (Sell)";
pub const MODIFIED_BUY: &str = "Modified Duration (Buy)";
pub const MODIFIED_SELL: &str = "Modified Duration (Sell)";
pub const CONVEXITY_BUY: &str = "Convexity (Buy)";
pub const CONVEXITY_SELL: &str = "Convexity (Sell)";
pub const DV01: &str = "DV01";
pub const BUY_SELL_SPREAD: &str = "Buy-Sell Spread";
pub const PERCENTAGE_SPREAD: &str = "Percentage Spread";

/// Appended result columns, in output order.
pub const RESULT_COLUMNS: [&str; 11] = [
    BUY_PRICE,
    SELL_PRICE,
    MACAULAY_BUY,
    MACAULAY_SELL,
    MODIFIED_BUY,
    MODIFIED_SELL,
    CONVEXITY_BUY,
    CONVEXITY_SELL,
    DV01,
    BUY_SELL_SPREAD,
    PERCENTAGE_SPREAD,
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A row whose metrics could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFailure {
    pub row: usize,
    pub reason: String,
}

/// The input table with result columns appended.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedTable {
    pub table: Table,
    pub analyzed: usize,
    pub failures: Vec<RowFailure>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Read one row's bond terms. Blank face values take the configured default;
/// unreadable text in any numeric column fails the row.
pub fn terms_from_row(
    row: &Row,
    index: usize,
    config: &AnalysisConfig,
) -> BondRiskResult<BondTerms> {
    Ok(BondTerms {
        face_value: row
            .optional_number(FACE_VALUE, index)?
            .unwrap_or(config.default_face_value),
        coupon_rate: row.optional_number(COUPON, index)?,
        years_to_maturity: row.require_number(YEARS_TO_MATURITY, index)?,
        periods_per_year: config.periods_per_year,
        ytm_bid: row.optional_number(YTM_BID, index)?,
        ytm_ask: row.optional_number(YTM_ASK, index)?,
    })
}

/// Append price, duration, convexity, DV01 and spread columns to every row.
///
/// DV01 is taken at the bid yield. A row that fails leaves its result cells
/// empty and is reported in `failures`, unless `config.strict` is set, in
/// which case the first failure is returned as the error.
pub fn analyze_table(
    table: &Table,
    config: &AnalysisConfig,
) -> BondRiskResult<ComputationOutput<AnalyzedTable>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    config.validate()?;
    table.require_columns(&[YEARS_TO_MATURITY, YTM_BID, YTM_ASK])?;
    if !table.has_column(COUPON) {
        warnings.push(format!(
            "No '{COUPON}' column; every bond is treated as zero-coupon"
        ));
    }

    let mut out = table.clone();
    for column in RESULT_COLUMNS {
        out.ensure_column(column);
    }

    let mut failures = Vec::new();
    for (idx, row) in out.rows_mut().iter_mut().enumerate() {
        match analyze_row(row, idx, config) {
            Ok(row_warnings) => {
                warnings.extend(row_warnings.into_iter().map(|w| format!("Row {idx}: {w}")));
            }
            Err(e) if config.strict => {
                return Err(BondRiskError::InvalidInput {
                    field: format!("row {idx}"),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                tracing::warn!(row = idx, error = %e, "bond metrics failed; leaving row blank");
                for column in RESULT_COLUMNS {
                    row.set(column, Cell::Empty);
                }
                failures.push(RowFailure {
                    row: idx,
                    reason: e.to_string(),
                });
            }
        }
    }

    if !failures.is_empty() {
        warnings.push(format!(
            "{} of {} rows could not be analysed",
            failures.len(),
            out.len()
        ));
    }
    tracing::debug!(rows = out.len(), failed = failures.len(), "bond table analysed");

    let output = AnalyzedTable {
        analyzed: out.len() - failures.len(),
        table: out,
        failures,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "periods_per_year": config.periods_per_year,
        "default_face_value": config.default_face_value.to_string(),
        "basis_point_change": config.basis_point_change.to_string(),
        "dv01_yield": "bid",
        "buy_side_yield": "ask",
        "sell_side_yield": "bid",
    });

    Ok(with_metadata(
        "Row-wise Bond Price, Duration, Convexity, DV01 & Bid-Ask Spread",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Compute every result column for one row, or none of them.
fn analyze_row(row: &mut Row, idx: usize, config: &AnalysisConfig) -> BondRiskResult<Vec<String>> {
    let terms = terms_from_row(row, idx, config)?;
    let buy = calculate_bond_metrics(&terms, Side::Buy, config.basis_point_change)?;
    let sell = calculate_bond_metrics(&terms, Side::Sell, config.basis_point_change)?;
    // Sell-side metrics are taken at the bid, so their DV01 is the bid DV01
    let dv01 = sell.dv01;
    let (spread, pct_spread) = price_spread(buy.price, sell.price)?;

    let values: [(&str, Decimal); 11] = [
        (BUY_PRICE, buy.price),
        (SELL_PRICE, sell.price),
        (MACAULAY_BUY, buy.macaulay_duration),
        (MACAULAY_SELL, sell.macaulay_duration),
        (MODIFIED_BUY, buy.modified_duration),
        (MODIFIED_SELL, sell.modified_duration),
        (CONVEXITY_BUY, buy.convexity),
        (CONVEXITY_SELL, sell.convexity),
        (DV01, dv01),
        (BUY_SELL_SPREAD, spread),
        (PERCENTAGE_SPREAD, pct_spread),
    ];
    for (column, value) in values {
        row.set(column, value);
    }

    Ok(terms.quality_warnings())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bonds() -> Table {
        let mut t = Table::new(["ISIN", YEARS_TO_MATURITY, YTM_BID, YTM_ASK, COUPON]);
        t.push_values(vec![
            "XS0001".into(),
            dec!(10).into(),
            dec!(3.9).into(),
            dec!(4).into(),
            dec!(5).into(),
        ])
        .unwrap();
        t.push_values(vec![
            "XS0002".into(),
            dec!(5).into(),
            dec!(5).into(),
            dec!(5).into(),
            Cell::Empty,
        ])
        .unwrap();
        t
    }

    fn annual() -> AnalysisConfig {
        AnalysisConfig {
            periods_per_year: 1,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn test_result_columns_appended_in_order() {
        let out = analyze_table(&bonds(), &AnalysisConfig::default()).unwrap();
        let columns = out.result.table.columns();
        assert_eq!(&columns[..5], &["ISIN", YEARS_TO_MATURITY, YTM_BID, YTM_ASK, COUPON]);
        assert_eq!(&columns[5..], &RESULT_COLUMNS);
        assert_eq!(out.result.analyzed, 2);
    }

    #[test]
    fn test_default_face_value_applied() {
        let out = analyze_table(&bonds(), &annual()).unwrap();
        let zero = &out.result.table.rows()[1];
        assert_eq!(zero.number(BUY_PRICE), Some(dec!(783.526)));
        assert_eq!(zero.number(BUY_SELL_SPREAD), Some(Decimal::ZERO));
    }

    #[test]
    fn test_spread_columns() {
        let out = analyze_table(&bonds(), &AnalysisConfig::default()).unwrap();
        let row = &out.result.table.rows()[0];
        let buy = row.number(BUY_PRICE).unwrap();
        let sell = row.number(SELL_PRICE).unwrap();
        let spread = row.number(BUY_SELL_SPREAD).unwrap();
        assert_eq!(spread, buy - sell);
        assert_eq!(
            row.number(PERCENTAGE_SPREAD).unwrap(),
            spread / buy * dec!(100)
        );
        assert!(row.number(DV01).unwrap() < Decimal::ZERO);
    }

    #[test]
    fn test_failed_row_left_blank() {
        let mut t = bonds();
        t.rows_mut()[1].set(YEARS_TO_MATURITY, Decimal::ZERO);
        let out = analyze_table(&t, &AnalysisConfig::default()).unwrap();
        assert_eq!(out.result.analyzed, 1);
        assert_eq!(out.result.failures.len(), 1);
        assert_eq!(out.result.failures[0].row, 1);
        let row = &out.result.table.rows()[1];
        assert!(RESULT_COLUMNS.iter().all(|c| row.get(c).is_empty()));
    }

    #[test]
    fn test_strict_mode_aborts() {
        let mut t = bonds();
        t.rows_mut()[0].set(YTM_BID, Cell::Empty);
        t.rows_mut()[0].set(YTM_ASK, Cell::Empty);
        let config = AnalysisConfig {
            strict: true,
            ..AnalysisConfig::default()
        };
        assert!(analyze_table(&t, &config).is_err());
    }

    #[test]
    fn test_missing_yield_columns_rejected() {
        let mut t = bonds();
        t.drop_columns(&[YTM_ASK]);
        match analyze_table(&t, &AnalysisConfig::default()) {
            Err(BondRiskError::MissingFields(f)) => assert_eq!(f, vec![YTM_ASK.to_string()]),
            other => panic!("Expected MissingFields, got {other:?}"),
        }
    }

    #[test]
    fn test_crossed_quotes_reported_per_row() {
        let mut t = bonds();
        t.rows_mut()[0].set(YTM_BID, dec!(4.5));
        let out = analyze_table(&t, &AnalysisConfig::default()).unwrap();
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].starts_with("Row 0:"));
    }

    #[test]
    fn test_unreadable_coupon_or_face_fails_row() {
        let mut t = bonds();
        t.ensure_column(FACE_VALUE);
        t.rows_mut()[0].set(COUPON, Cell::parse("5%"));
        t.rows_mut()[1].set(FACE_VALUE, Cell::parse("1,000"));
        let out = analyze_table(&t, &AnalysisConfig::default()).unwrap();
        assert_eq!(out.result.analyzed, 0);
        let failed: Vec<usize> = out.result.failures.iter().map(|f| f.row).collect();
        assert_eq!(failed, vec![0, 1]);
        assert!(out.result.failures[0].reason.contains("5%"));
        assert!(out.result.table.rows()[0].get(BUY_PRICE).is_empty());
    }

    #[test]
    fn test_yield_near_floor_recorded_as_failure() {
        let mut t = bonds();
        t.rows_mut()[1].set(YEARS_TO_MATURITY, dec!(30));
        t.rows_mut()[1].set(YTM_BID, dec!(-199));
        t.rows_mut()[1].set(YTM_ASK, dec!(-199));
        let out = analyze_table(&t, &AnalysisConfig::default()).unwrap();
        assert_eq!(out.result.analyzed, 1);
        assert_eq!(out.result.failures.len(), 1);
        assert_eq!(out.result.failures[0].row, 1);
    }

    #[test]
    fn test_dv01_column_is_bid_side_dv01() {
        let out = analyze_table(&bonds(), &AnalysisConfig::default()).unwrap();
        let row = &out.result.table.rows()[0];
        let terms = terms_from_row(row, 0, &AnalysisConfig::default()).unwrap();
        let bid = calculate_bond_metrics(&terms, Side::Sell, Decimal::ONE).unwrap();
        assert_eq!(row.number(DV01), Some(bid.dv01));
    }
}
