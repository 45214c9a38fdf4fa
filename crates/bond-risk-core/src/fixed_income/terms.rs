//! Bond reference terms and the quote-side conventions shared by every
//! metric in [`crate::fixed_income::bond_math`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::BondRiskError;
use crate::types::{Money, Percent, Side, Years};
use crate::BondRiskResult;

fn default_periods_per_year() -> u32 {
    2
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Terms of a single fixed-coupon bullet bond plus its bid/ask yield quotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondTerms {
    /// Par amount redeemed at maturity (e.g. 1000)
    pub face_value: Money,
    /// Annual nominal coupon in percent (5 = 5%). `None` or zero means zero-coupon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_rate: Option<Percent>,
    /// Years remaining until maturity; fractional values allowed
    pub years_to_maturity: Years,
    /// Coupon / compounding periods per year (1, 2, 4, 12 ...)
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: u32,
    /// Bid yield to maturity in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ytm_bid: Option<Percent>,
    /// Ask yield to maturity in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ytm_ask: Option<Percent>,
}

/// The yield actually used for one side of a computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotedYield {
    pub side: Side,
    pub ytm: Percent,
    /// True when the side's own quote was missing and the other side's was used
    pub fell_back: bool,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl BondTerms {
    /// Terms quoted at a single yield on both sides (DV01 and ad-hoc repricing).
    pub fn at_yield(
        face_value: Money,
        coupon_rate: Option<Percent>,
        years_to_maturity: Years,
        ytm: Percent,
        periods_per_year: u32,
    ) -> Self {
        Self {
            face_value,
            coupon_rate,
            years_to_maturity,
            periods_per_year,
            ytm_bid: Some(ytm),
            ytm_ask: Some(ytm),
        }
    }

    /// Reject terms that would make discounting degenerate.
    pub fn validate(&self) -> BondRiskResult<()> {
        if self.face_value <= Decimal::ZERO {
            return Err(BondRiskError::InvalidInput {
                field: "face_value".into(),
                reason: "Face value must be positive.".into(),
            });
        }
        if self.years_to_maturity <= Decimal::ZERO {
            return Err(BondRiskError::InvalidInput {
                field: "years_to_maturity".into(),
                reason: "Years to maturity must be positive.".into(),
            });
        }
        if self.periods_per_year == 0 {
            return Err(BondRiskError::InvalidInput {
                field: "periods_per_year".into(),
                reason: "Periods per year must be positive.".into(),
            });
        }
        if self.ytm_bid.is_none() && self.ytm_ask.is_none() {
            return Err(BondRiskError::InvalidInput {
                field: "ytm_bid/ytm_ask".into(),
                reason: "At least one of bid or ask yield is required.".into(),
            });
        }
        Ok(())
    }

    /// Zero-coupon when the coupon is absent or exactly zero.
    pub fn is_zero_coupon(&self) -> bool {
        self.coupon_rate.map_or(true, |c| c.is_zero())
    }

    /// Number of discounting periods.
    ///
    /// `floor(years × periods_per_year)`, plus one when the bond has less than
    /// a year left so near-maturity bonds always keep a cash-flow period.
    pub fn total_periods(&self) -> BondRiskResult<u32> {
        self.validate()?;
        let raw = (self.years_to_maturity * Decimal::from(self.periods_per_year)).floor();
        let mut periods = raw.to_u32().ok_or_else(|| BondRiskError::Overflow {
            context: format!(
                "period count for {} years at {} periods per year",
                self.years_to_maturity, self.periods_per_year
            ),
        })?;
        if self.years_to_maturity < Decimal::ONE {
            periods += 1;
        }
        Ok(periods)
    }

    /// Select the yield for `side`: ask when buying, bid when selling.
    ///
    /// A missing quote falls back to the other side's quote.
    pub fn quoted_yield(&self, side: Side) -> BondRiskResult<QuotedYield> {
        let (own, other) = match side {
            Side::Buy => (self.ytm_ask, self.ytm_bid),
            Side::Sell => (self.ytm_bid, self.ytm_ask),
        };
        let (ytm, fell_back) = match (own, other) {
            (Some(y), _) => (y, false),
            (None, Some(y)) => (y, true),
            (None, None) => {
                return Err(BondRiskError::InvalidInput {
                    field: "ytm_bid/ytm_ask".into(),
                    reason: "At least one of bid or ask yield is required.".into(),
                })
            }
        };

        let floor = dec!(-100) * Decimal::from(self.periods_per_year.max(1));
        if ytm <= floor {
            return Err(BondRiskError::InvalidInput {
                field: match side {
                    Side::Buy => "ytm_ask".into(),
                    Side::Sell => "ytm_bid".into(),
                },
                reason: "Periodic yield must be greater than -100%.".into(),
            });
        }

        Ok(QuotedYield {
            side,
            ytm,
            fell_back,
        })
    }

    /// Data-quality observations that do not stop a computation.
    pub fn quality_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if let (Some(bid), Some(ask)) = (self.ytm_bid, self.ytm_ask) {
            if bid > ask {
                warnings.push(format!(
                    "Bid yield {bid}% exceeds ask yield {ask}%; quotes look crossed"
                ));
            }
        }
        if self.ytm_ask.is_none() {
            warnings.push("Ask yield missing; buy-side metrics use the bid yield".into());
        }
        if self.ytm_bid.is_none() {
            warnings.push("Bid yield missing; sell-side metrics use the ask yield".into());
        }
        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(years: Decimal, ppy: u32) -> BondTerms {
        BondTerms {
            face_value: dec!(1000),
            coupon_rate: Some(dec!(5)),
            years_to_maturity: years,
            periods_per_year: ppy,
            ytm_bid: Some(dec!(3.9)),
            ytm_ask: Some(dec!(4)),
        }
    }

    #[test]
    fn test_total_periods_whole_years() {
        assert_eq!(terms(dec!(10), 2).total_periods().unwrap(), 20);
        assert_eq!(terms(dec!(10), 1).total_periods().unwrap(), 10);
    }

    #[test]
    fn test_total_periods_floors_fractional_years() {
        assert_eq!(terms(dec!(2.7), 2).total_periods().unwrap(), 5);
    }

    #[test]
    fn test_total_periods_short_bond_adjustment() {
        // floor(0.8) = 0, bumped to 1
        assert_eq!(terms(dec!(0.4), 2).total_periods().unwrap(), 1);
        // floor(1.2) = 1, still bumped because the bond is under a year
        assert_eq!(terms(dec!(0.6), 2).total_periods().unwrap(), 2);
    }

    #[test]
    fn test_zero_and_missing_coupon_equivalent() {
        let mut t = terms(dec!(5), 1);
        t.coupon_rate = None;
        assert!(t.is_zero_coupon());
        t.coupon_rate = Some(Decimal::ZERO);
        assert!(t.is_zero_coupon());
        t.coupon_rate = Some(dec!(0.5));
        assert!(!t.is_zero_coupon());
    }

    #[test]
    fn test_side_selects_quote() {
        let t = terms(dec!(10), 2);
        assert_eq!(t.quoted_yield(Side::Buy).unwrap().ytm, dec!(4));
        assert_eq!(t.quoted_yield(Side::Sell).unwrap().ytm, dec!(3.9));
    }

    #[test]
    fn test_missing_quote_falls_back() {
        let mut t = terms(dec!(10), 2);
        t.ytm_ask = None;
        let q = t.quoted_yield(Side::Buy).unwrap();
        assert_eq!(q.ytm, dec!(3.9));
        assert!(q.fell_back);
        assert_eq!(t.quality_warnings().len(), 1);
    }

    #[test]
    fn test_missing_both_quotes_is_domain_error() {
        let mut t = terms(dec!(10), 2);
        t.ytm_ask = None;
        t.ytm_bid = None;
        assert!(t.validate().is_err());
        assert!(t.quoted_yield(Side::Sell).is_err());
    }

    #[test]
    fn test_non_positive_maturity_rejected() {
        assert!(terms(Decimal::ZERO, 2).total_periods().is_err());
        assert!(terms(dec!(-1), 2).total_periods().is_err());
    }

    #[test]
    fn test_zero_periods_rejected() {
        match terms(dec!(5), 0).validate() {
            Err(BondRiskError::InvalidInput { field, .. }) => {
                assert_eq!(field, "periods_per_year")
            }
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_crossed_quotes_warn() {
        let mut t = terms(dec!(10), 2);
        t.ytm_bid = Some(dec!(4.2));
        let warnings = t.quality_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("crossed"));
    }

    #[test]
    fn test_deserialize_defaults_periods() {
        let t: BondTerms = serde_json::from_str(
            r#"{"face_value": 1000, "years_to_maturity": 5, "ytm_bid": 5, "ytm_ask": 5}"#,
        )
        .unwrap();
        assert_eq!(t.periods_per_year, 2);
        assert!(t.is_zero_coupon());
    }
}
