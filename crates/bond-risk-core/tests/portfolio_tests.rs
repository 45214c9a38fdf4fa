use bond_risk_core::fixed_income::bond_math::calculate_dv01;
use bond_risk_core::portfolio::aggregator::{calculate_portfolio_metrics, PortfolioFields};
use bond_risk_core::portfolio::weights::normalize_weights;
use bond_risk_core::table::{Cell, Table};
use bond_risk_core::BondRiskError;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Portfolio aggregation over a holdings table using the default column names
// ===========================================================================

fn holdings(weights: &[Decimal]) -> Table {
    let mut t = Table::new(["ISIN", "Weight", "Buy Price", "YTM - Ask", "Years to Maturity", "Cpn"]);
    let bonds = [
        ("US91282CJL6", dec!(1001.2), dec!(4.4), dec!(5), dec!(4.5)),
        ("FR0013508470", dec!(912.4), dec!(3.1), dec!(10), dec!(2)),
        ("XS2234567890", dec!(850), dec!(7.2), dec!(2), Decimal::ZERO),
    ];
    for ((isin, price, ytm, years, cpn), w) in bonds.into_iter().zip(weights) {
        t.push_values(vec![
            isin.into(),
            (*w).into(),
            price.into(),
            ytm.into(),
            years.into(),
            cpn.into(),
        ])
        .unwrap();
    }
    t
}

#[test]
fn test_default_fields_read_analysis_columns() {
    let out = calculate_portfolio_metrics(
        &holdings(&[dec!(50), dec!(30), dec!(20)]),
        &PortfolioFields::default(),
    )
    .unwrap();
    let m = &out.result;
    // 0.5*4.4 + 0.3*3.1 + 0.2*7.2
    assert_eq!(m.ytm, dec!(4.57));
    // 0.5*5 + 0.3*10 + 0.2*2
    assert_eq!(m.duration, dec!(5.9));
    assert_eq!(m.holdings, 3);
    assert!(out.warnings.is_empty());
}

#[test]
fn test_dv01_is_weighted_per_bond_dv01() {
    let table = holdings(&[dec!(100), Decimal::ZERO, Decimal::ZERO]);
    let out = calculate_portfolio_metrics(&table, &PortfolioFields::default()).unwrap();
    let single = calculate_dv01(dec!(1001.2), Some(dec!(4.5)), dec!(5), dec!(4.4), Decimal::ONE, 2)
        .unwrap();
    assert_eq!(out.result.dv01, single);
}

#[test]
fn test_duration_weighted_by_maturity_only() {
    let out = calculate_portfolio_metrics(
        &holdings(&[Decimal::ZERO, dec!(100), Decimal::ZERO]),
        &PortfolioFields::default(),
    )
    .unwrap();
    assert_eq!(out.result.duration, dec!(10));
    assert_eq!(out.result.modified_duration, dec!(10) / dec!(1.031));
}

#[test]
fn test_normalize_then_aggregate_averages() {
    let raw = holdings(&[dec!(1), dec!(1), dec!(2)]);
    let normalized = normalize_weights(&raw, "Weight").unwrap();
    let weights: Vec<Decimal> = normalized
        .rows()
        .iter()
        .filter_map(|r| r.number("Weight"))
        .collect();
    assert_eq!(weights, vec![dec!(25), dec!(25), dec!(50)]);

    let out = calculate_portfolio_metrics(&normalized, &PortfolioFields::default()).unwrap();
    assert_eq!(out.result.total_weight, dec!(100));
    assert!(out.warnings.is_empty());
}

#[test]
fn test_unnormalized_weights_warn_and_scale() {
    let out = calculate_portfolio_metrics(
        &holdings(&[dec!(1), dec!(1), dec!(2)]),
        &PortfolioFields::default(),
    )
    .unwrap();
    assert_eq!(out.result.total_weight, dec!(4));
    assert_eq!(out.warnings.len(), 1);
    assert!(out.result.ytm < dec!(1));
}

#[test]
fn test_missing_columns_all_named() {
    let mut table = holdings(&[dec!(50), dec!(30), dec!(20)]);
    table.drop_columns(&["Buy Price", "Cpn"]);
    match calculate_portfolio_metrics(&table, &PortfolioFields::default()) {
        Err(BondRiskError::MissingFields(missing)) => {
            assert_eq!(missing, vec!["Buy Price".to_string(), "Cpn".to_string()])
        }
        other => panic!("Expected MissingFields, got {other:?}"),
    }
}

#[test]
fn test_blank_price_row_rejected() {
    let mut table = holdings(&[dec!(50), dec!(30), dec!(20)]);
    table.rows_mut()[2].set("Buy Price", Cell::Empty);
    match calculate_portfolio_metrics(&table, &PortfolioFields::default()) {
        Err(BondRiskError::InvalidInput { field, reason }) => {
            assert_eq!(field, "Buy Price");
            assert!(reason.starts_with("Row 2"), "{reason}");
        }
        other => panic!("Expected InvalidInput, got {other:?}"),
    }
}

#[test]
fn test_normalize_zero_total_rejected() {
    let table = holdings(&[Decimal::ZERO, Decimal::ZERO, Decimal::ZERO]);
    match normalize_weights(&table, "Weight") {
        Err(BondRiskError::DivisionByZero { .. }) => {}
        other => panic!("Expected DivisionByZero, got {other:?}"),
    }
}
