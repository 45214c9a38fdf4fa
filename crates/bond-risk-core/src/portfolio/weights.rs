use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::BondRiskError;
use crate::table::Table;
use crate::BondRiskResult;

/// Rescale a weight column so it totals 100.
///
/// Kept separate from [`crate::portfolio::aggregator::calculate_portfolio_metrics`],
/// which sums weights exactly as given.
pub fn normalize_weights(table: &Table, weight_field: &str) -> BondRiskResult<Table> {
    table.require_columns(&[weight_field])?;

    let weights = table
        .rows()
        .iter()
        .enumerate()
        .map(|(idx, row)| row.require_number(weight_field, idx))
        .collect::<BondRiskResult<Vec<Decimal>>>()?;

    let total: Decimal = weights.iter().sum();
    if total.is_zero() {
        return Err(BondRiskError::DivisionByZero {
            context: format!("normalising '{weight_field}': weights total zero"),
        });
    }

    let mut normalized = table.clone();
    for (row, w) in normalized.rows_mut().iter_mut().zip(weights) {
        row.set(weight_field, w * dec!(100) / total);
    }
    Ok(normalized)
}
