//! Run-level settings shared by the dataset pipeline and the CLI.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::BondRiskError;
use crate::types::Money;
use crate::BondRiskResult;

/// Settings for a bond analysis run.
///
/// Every field has a default so a config file only needs to name what it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Coupon / compounding periods per year applied to every bond
    pub periods_per_year: u32,
    /// Face value used when a row carries none
    pub default_face_value: Money,
    /// Yield bump for DV01, in basis points
    pub basis_point_change: Decimal,
    /// Valuation date used to derive years to maturity
    pub as_of_date: NaiveDate,
    /// Round derived years to maturity to whole years
    pub round_years: bool,
    /// Abort on the first bond whose metrics cannot be computed
    pub strict: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 2,
            default_face_value: dec!(1000),
            basis_point_change: Decimal::ONE,
            as_of_date: NaiveDate::from_ymd_opt(2023, 11, 24).unwrap_or_default(),
            round_years: true,
            strict: false,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> BondRiskResult<()> {
        if self.periods_per_year == 0 {
            return Err(BondRiskError::InvalidInput {
                field: "periods_per_year".into(),
                reason: "Periods per year must be positive.".into(),
            });
        }
        if self.default_face_value <= Decimal::ZERO {
            return Err(BondRiskError::InvalidInput {
                field: "default_face_value".into(),
                reason: "Face value must be positive.".into(),
            });
        }
        if self.basis_point_change.is_zero() {
            return Err(BondRiskError::InvalidInput {
                field: "basis_point_change".into(),
                reason: "Basis point change must be non-zero.".into(),
            });
        }
        Ok(())
    }
}

/// Accepted spreadsheet date layouts: `dd.mm.yyyy`, ISO, ISO with a time part.
const DATE_FORMATS: [&str; 3] = ["%d.%m.%Y", "%Y-%m-%d", "%Y-%m-%d %H:%M:%S"];

/// Parse a date in any of the accepted spreadsheet layouts.
pub fn parse_date(raw: &str) -> BondRiskResult<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| {
            NaiveDate::parse_from_str(raw, fmt).ok().or_else(|| {
                NaiveDateTime::parse_from_str(raw, fmt)
                    .ok()
                    .map(|dt| dt.date())
            })
        })
        .ok_or_else(|| {
            BondRiskError::DateError(format!(
                "'{raw}' is not a date (expected dd.mm.yyyy or yyyy-mm-dd)"
            ))
        })
}
