//! Price and first/second-order risk of a fixed-coupon bullet bond.
//!
//! Every function takes the bond's [`BondTerms`] and a [`Side`]; the side picks
//! the ask yield (buying) or the bid yield (selling). Discounting is
//! `periods_per_year`-compounded and uses iterative multiplication rather than
//! `powd()` so long maturities keep full decimal precision.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::BondRiskError;
use crate::fixed_income::terms::{BondTerms, QuotedYield};
use crate::types::{with_metadata, ComputationOutput, Money, Percent, Side, Years};
use crate::BondRiskResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const PRICE_DP: u32 = 3;
const DURATION_DP: u32 = 3;
const CONVEXITY_DP: u32 = 2;
const DV01_DP: u32 = 6;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Price and risk metrics for one side of a bond.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondMetrics {
    /// Yield (percent) the metrics were computed at
    pub ytm: Percent,
    /// Present value of coupons and redemption (3 dp)
    pub price: Money,
    /// PV-weighted average time to cash flow, in years (3 dp)
    pub macaulay_duration: Years,
    /// Macaulay duration / (1 + y/periods_per_year) (3 dp)
    pub modified_duration: Decimal,
    /// Second-order price sensitivity (2 dp)
    pub convexity: Decimal,
    /// Price change per basis point of yield increase (signed)
    pub dv01: Money,
}

/// Both sides of a bond plus the bid/ask price spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondAnalysis {
    pub total_periods: u32,
    pub buy: BondMetrics,
    pub sell: BondMetrics,
    /// Buy price minus sell price
    pub buy_sell_spread: Money,
    /// Spread as a percentage of the buy price
    pub percentage_spread: Percent,
}

/// Discounting schedule for one bond at one yield.
struct Discounting {
    coupon: Money,
    face_value: Money,
    one_plus_y: Decimal,
    periods: u32,
    freq: Decimal,
    /// df(k) for k = 1..=periods
    discount_factors: Vec<Decimal>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Price: discounted coupons plus discounted face value, rounded to 3 dp.
///
/// Zero-coupon bonds (`coupon_rate` absent or zero) are just the discounted
/// face value.
pub fn calculate_bond_price(terms: &BondTerms, side: Side) -> BondRiskResult<Money> {
    let schedule = Discounting::for_side(terms, side)?;
    Ok(schedule.present_value().round_dp(PRICE_DP))
}

/// Macaulay duration in years, rounded to 3 dp.
pub fn calculate_macaulay_duration(terms: &BondTerms, side: Side) -> BondRiskResult<Years> {
    let schedule = Discounting::for_side(terms, side)?;
    macaulay(terms, &schedule)
}

/// Modified duration: Macaulay duration over one period's yield growth, 3 dp.
pub fn calculate_modified_duration(terms: &BondTerms, side: Side) -> BondRiskResult<Decimal> {
    let schedule = Discounting::for_side(terms, side)?;
    let mac = macaulay(terms, &schedule)?;
    modified(mac, &schedule)
}

/// Convexity, rounded to 2 dp.
pub fn calculate_bond_convexity(terms: &BondTerms, side: Side) -> BondRiskResult<Decimal> {
    let schedule = Discounting::for_side(terms, side)?;
    convexity(terms, &schedule)
}

/// DV01 by finite difference: `(P(ytm + bp/100) - P(ytm)) / bp`.
///
/// The raw signed difference is returned, so a positive `basis_point_change`
/// gives a negative DV01 for any bond with positive cash flows. Both prices
/// are taken unrounded; the result is rounded to 6 dp.
pub fn calculate_dv01(
    face_value: Money,
    coupon_rate: Option<Percent>,
    years_to_maturity: Years,
    ytm: Percent,
    basis_point_change: Decimal,
    periods_per_year: u32,
) -> BondRiskResult<Money> {
    if basis_point_change.is_zero() {
        return Err(BondRiskError::InvalidInput {
            field: "basis_point_change".into(),
            reason: "Basis point change must be non-zero.".into(),
        });
    }

    let base = BondTerms::at_yield(
        face_value,
        coupon_rate,
        years_to_maturity,
        ytm,
        periods_per_year,
    );
    let bumped = BondTerms::at_yield(
        face_value,
        coupon_rate,
        years_to_maturity,
        ytm + basis_point_change / dec!(100),
        periods_per_year,
    );

    let initial_price = Discounting::for_side(&base, Side::Sell)?.present_value();
    let new_price = Discounting::for_side(&bumped, Side::Sell)?.present_value();

    Ok(((new_price - initial_price) / basis_point_change).round_dp(DV01_DP))
}

/// All five metrics for one side, sharing a single discounting schedule.
///
/// Either every metric is produced or the whole set fails.
pub fn calculate_bond_metrics(
    terms: &BondTerms,
    side: Side,
    basis_point_change: Decimal,
) -> BondRiskResult<BondMetrics> {
    let schedule = Discounting::for_side(terms, side)?;
    let quote = terms.quoted_yield(side)?;

    let price = schedule.present_value().round_dp(PRICE_DP);
    let macaulay_duration = macaulay(terms, &schedule)?;
    let modified_duration = modified(macaulay_duration, &schedule)?;
    let convexity = convexity(terms, &schedule)?;
    let dv01 = calculate_dv01(
        terms.face_value,
        terms.coupon_rate,
        terms.years_to_maturity,
        quote.ytm,
        basis_point_change,
        terms.periods_per_year,
    )?;

    Ok(BondMetrics {
        ytm: quote.ytm,
        price,
        macaulay_duration,
        modified_duration,
        convexity,
        dv01,
    })
}

/// Analyse both sides of a bond.
///
/// Crossed or missing quotes are reported as warnings; they never stop the
/// computation.
pub fn analyze_bond(
    terms: &BondTerms,
    basis_point_change: Decimal,
) -> BondRiskResult<ComputationOutput<BondAnalysis>> {
    let start = Instant::now();
    let warnings = terms.quality_warnings();
    for w in &warnings {
        tracing::warn!(warning = %w, "bond quote anomaly");
    }

    let total_periods = terms.total_periods()?;
    let buy = calculate_bond_metrics(terms, Side::Buy, basis_point_change)?;
    let sell = calculate_bond_metrics(terms, Side::Sell, basis_point_change)?;
    let (buy_sell_spread, percentage_spread) = price_spread(buy.price, sell.price)?;

    let output = BondAnalysis {
        total_periods,
        buy,
        sell,
        buy_sell_spread,
        percentage_spread,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "periods_per_year": terms.periods_per_year,
        "basis_point_change": basis_point_change.to_string(),
        "buy_side_yield": "ask",
        "sell_side_yield": "bid",
        "settlement": "assumed on coupon date (no accrued interest)",
    });

    Ok(with_metadata(
        "Bullet Bond Price, Duration, Convexity & DV01 (periodic compounding)",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

/// Buy-sell price spread and that spread as a percentage of the buy price.
pub fn price_spread(buy_price: Money, sell_price: Money) -> BondRiskResult<(Money, Percent)> {
    if buy_price.is_zero() {
        return Err(BondRiskError::DivisionByZero {
            context: "percentage spread: buy price is zero".to_string(),
        });
    }
    let spread = buy_price - sell_price;
    Ok((spread, spread / buy_price * dec!(100)))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

impl Discounting {
    fn for_side(terms: &BondTerms, side: Side) -> BondRiskResult<Self> {
        let periods = terms.total_periods()?;
        let quote = terms.quoted_yield(side)?;
        if quote.fell_back {
            log_fallback(&quote);
        }
        Self::at_yield(terms, quote.ytm, periods)
    }

    fn at_yield(terms: &BondTerms, ytm: Percent, periods: u32) -> BondRiskResult<Self> {
        let freq = Decimal::from(terms.periods_per_year);
        let coupon = if terms.is_zero_coupon() {
            Decimal::ZERO
        } else {
            terms.face_value * terms.coupon_rate.unwrap_or_default() / dec!(100) / freq
        };
        let one_plus_y = Decimal::ONE + ytm / (dec!(100) * freq);
        if one_plus_y <= Decimal::ZERO {
            return Err(BondRiskError::DivisionByZero {
                context: "discounting: (1 + periodic yield) is not positive".to_string(),
            });
        }

        // df(k) = df(k-1) / (1 + y): high yields shrink toward zero instead of
        // overflowing, yields near the floor grow until checked_mul refuses.
        let step = Decimal::ONE
            .checked_div(one_plus_y)
            .ok_or_else(|| BondRiskError::Overflow {
                context: "one-period discount factor".to_string(),
            })?;
        let mut discount_factors = Vec::with_capacity(periods as usize);
        let mut df = Decimal::ONE;
        for k in 1..=periods {
            df = df.checked_mul(step).ok_or_else(|| BondRiskError::Overflow {
                context: format!("discount factor at period {k}"),
            })?;
            discount_factors.push(df);
        }
        check_weighted_sums(&discount_factors, coupon, terms.face_value)?;

        Ok(Self {
            coupon,
            face_value: terms.face_value,
            one_plus_y,
            periods,
            freq,
            discount_factors,
        })
    }

    /// df(N)
    fn final_df(&self) -> Decimal {
        self.discount_factors
            .last()
            .copied()
            .unwrap_or(Decimal::ONE)
    }

    fn present_value(&self) -> Money {
        let coupons: Money = self
            .discount_factors
            .iter()
            .map(|df| self.coupon * df)
            .sum();
        coupons + self.face_value * self.final_df()
    }
}

/// Every duration and convexity sum is bounded by
/// `N × N(N+1) × max df × max cash flow`; reject schedules where that bound
/// is not representable so the sums can use plain arithmetic.
fn check_weighted_sums(
    discount_factors: &[Decimal],
    coupon: Money,
    face_value: Money,
) -> BondRiskResult<()> {
    let (Some(&first), Some(&last)) = (discount_factors.first(), discount_factors.last()) else {
        return Ok(());
    };
    let n = Decimal::from(discount_factors.len() as u64);
    first
        .max(last)
        .checked_mul(coupon.abs().max(face_value.abs()))
        .and_then(|v| v.checked_mul(n * (n + Decimal::ONE)))
        .and_then(|v| v.checked_mul(n + Decimal::ONE))
        .map(|_| ())
        .ok_or_else(|| BondRiskError::Overflow {
            context: "discounted cash flows exceed decimal range".to_string(),
        })
}

fn macaulay(terms: &BondTerms, schedule: &Discounting) -> BondRiskResult<Years> {
    if terms.is_zero_coupon() {
        // Zero-coupon duration is reported as T / (1 + y)^N, not T. This
        // does not agree with the coupon branch at a zero coupon.
        return Ok((terms.years_to_maturity * schedule.final_df()).round_dp(DURATION_DP));
    }

    let price = schedule.present_value();
    if price.is_zero() {
        return Err(BondRiskError::DivisionByZero {
            context: "Macaulay duration: bond price is zero".to_string(),
        });
    }

    let n = Decimal::from(schedule.periods);
    let weighted: Decimal = schedule
        .discount_factors
        .iter()
        .zip(1u32..)
        .map(|(df, k)| Decimal::from(k) * schedule.coupon * df)
        .sum::<Decimal>()
        + n * schedule.face_value * schedule.final_df();

    let duration = weighted
        .checked_div(price)
        .ok_or_else(|| BondRiskError::Overflow {
            context: "Macaulay duration: weighted cash flows over price".to_string(),
        })?;
    Ok((duration / schedule.freq).round_dp(DURATION_DP))
}

fn modified(macaulay_duration: Years, schedule: &Discounting) -> BondRiskResult<Decimal> {
    macaulay_duration
        .checked_div(schedule.one_plus_y)
        .map(|d| d.round_dp(DURATION_DP))
        .ok_or_else(|| BondRiskError::Overflow {
            context: "modified duration: Macaulay over (1 + y)".to_string(),
        })
}

fn convexity(terms: &BondTerms, schedule: &Discounting) -> BondRiskResult<Decimal> {
    let n = Decimal::from(schedule.periods);
    let n_term = n * (n + Decimal::ONE);

    if terms.is_zero_coupon() {
        return Ok((n_term * schedule.final_df()).round_dp(CONVEXITY_DP));
    }

    let coupon_term: Decimal = schedule
        .discount_factors
        .iter()
        .zip(1u32..)
        .map(|(df, k)| {
            let k = Decimal::from(k);
            schedule.coupon * k * (k + Decimal::ONE) * df
        })
        .sum();
    let numerator = coupon_term + n_term * schedule.face_value * schedule.final_df();
    let growth_sq = schedule.one_plus_y * schedule.one_plus_y;
    let scaled = numerator
        .checked_div(growth_sq)
        .ok_or_else(|| BondRiskError::Overflow {
            context: "convexity: numerator over (1 + y)^2".to_string(),
        })?;

    Ok((scaled / schedule.face_value).round_dp(CONVEXITY_DP))
}

fn log_fallback(quote: &QuotedYield) {
    tracing::warn!(
        side = quote.side.label(),
        ytm = %quote.ytm,
        "quote missing for side; using the opposite side's yield"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// 10-year 5% semi-annual bond quoted 3.9 bid / 4.0 ask.
    fn premium_bond() -> BondTerms {
        BondTerms {
            face_value: dec!(1000),
            coupon_rate: Some(dec!(5)),
            years_to_maturity: dec!(10),
            periods_per_year: 2,
            ytm_bid: Some(dec!(3.9)),
            ytm_ask: Some(dec!(4)),
        }
    }

    /// 5-year annual zero-coupon bond at 5%.
    fn zero_coupon() -> BondTerms {
        BondTerms {
            face_value: dec!(1000),
            coupon_rate: None,
            years_to_maturity: dec!(5),
            periods_per_year: 1,
            ytm_bid: Some(dec!(5)),
            ytm_ask: Some(dec!(5)),
        }
    }

    fn assert_close(actual: Decimal, expected: Decimal, tolerance: Decimal, label: &str) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tolerance,
            "{label}: expected ~{expected}, got {actual} (diff {diff} > tolerance {tolerance})"
        );
    }

    #[test]
    fn test_premium_bond_buy_price() {
        let price = calculate_bond_price(&premium_bond(), Side::Buy).unwrap();
        assert!(price > dec!(1000), "Premium bond should price above par, got {price}");
        assert_eq!(price, dec!(1081.757));
    }

    #[test]
    fn test_sell_price_uses_bid() {
        let price = calculate_bond_price(&premium_bond(), Side::Sell).unwrap();
        assert_eq!(price, dec!(1090.368));
    }

    #[test]
    fn test_zero_coupon_price() {
        let price = calculate_bond_price(&zero_coupon(), Side::Buy).unwrap();
        assert_eq!(price, dec!(783.526));
    }

    #[test]
    fn test_zero_coupon_zero_rate_matches_none() {
        let mut explicit_zero = zero_coupon();
        explicit_zero.coupon_rate = Some(Decimal::ZERO);
        let a = calculate_bond_metrics(&zero_coupon(), Side::Buy, Decimal::ONE).unwrap();
        let b = calculate_bond_metrics(&explicit_zero, Side::Buy, Decimal::ONE).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_par_bond_prices_at_par() {
        let mut terms = premium_bond();
        terms.ytm_ask = Some(dec!(5));
        let price = calculate_bond_price(&terms, Side::Buy).unwrap();
        assert_eq!(price, dec!(1000.000));
    }

    #[test]
    fn test_macaulay_coupon_bond() {
        let d = calculate_macaulay_duration(&premium_bond(), Side::Buy).unwrap();
        assert_eq!(d, dec!(8.081));
        assert!(d < dec!(10));
    }

    #[test]
    fn test_macaulay_annual_textbook() {
        // 3-year 6% annual bond at 5%
        let terms = BondTerms::at_yield(dec!(1000), Some(dec!(6)), dec!(3), dec!(5), 1);
        let d = calculate_macaulay_duration(&terms, Side::Buy).unwrap();
        assert_eq!(d, dec!(2.836));
    }

    #[test]
    fn test_zero_coupon_macaulay_is_discounted_maturity() {
        // T / (1 + y)^T, not T: 5 / 1.05^5
        let d = calculate_macaulay_duration(&zero_coupon(), Side::Buy).unwrap();
        assert_eq!(d, dec!(3.918));
    }

    #[test]
    fn test_modified_duration_relationship() {
        let terms = premium_bond();
        let mac = calculate_macaulay_duration(&terms, Side::Buy).unwrap();
        let modified = calculate_modified_duration(&terms, Side::Buy).unwrap();
        let expected = mac / (Decimal::ONE + dec!(4) / dec!(200));
        assert_close(modified, expected, dec!(0.0005), "modified = macaulay / (1 + y/f)");
        assert_eq!(modified, dec!(7.923));
    }

    #[test]
    fn test_convexity_values() {
        assert_eq!(
            calculate_bond_convexity(&premium_bond(), Side::Buy).unwrap(),
            dec!(326.57)
        );
        assert_eq!(
            calculate_bond_convexity(&zero_coupon(), Side::Buy).unwrap(),
            dec!(23.51)
        );
    }

    #[test]
    fn test_short_bond_keeps_one_period() {
        let terms = BondTerms::at_yield(dec!(1000), Some(dec!(5)), dec!(0.4), dec!(4), 2);
        assert_eq!(terms.total_periods().unwrap(), 1);
        let metrics = calculate_bond_metrics(&terms, Side::Buy, Decimal::ONE).unwrap();
        assert_eq!(metrics.price, dec!(1004.902));
        assert_eq!(metrics.macaulay_duration, dec!(0.5));
        assert_eq!(metrics.convexity, dec!(1.93));
    }

    #[test]
    fn test_dv01_negative_for_yield_increase() {
        let dv01 = calculate_dv01(dec!(1000), Some(dec!(5)), dec!(10), dec!(3.9), Decimal::ONE, 2)
            .unwrap();
        assert!(dv01 < Decimal::ZERO, "DV01 should be negative, got {dv01}");
        assert_close(dv01, dec!(-0.864815), dec!(0.000002), "DV01");
    }

    #[test]
    fn test_dv01_scales_per_basis_point() {
        let one = calculate_dv01(dec!(1000), Some(dec!(5)), dec!(10), dec!(4), Decimal::ONE, 2)
            .unwrap();
        let ten = calculate_dv01(dec!(1000), Some(dec!(5)), dec!(10), dec!(4), dec!(10), 2)
            .unwrap();
        // Per-bp sensitivity shrinks slightly over a wider bump (convexity)
        assert!(ten > one);
        assert_close(ten, one, dec!(0.01), "per-bp DV01 over 10bp");
    }

    #[test]
    fn test_dv01_zero_bump_rejected() {
        assert!(
            calculate_dv01(dec!(1000), Some(dec!(5)), dec!(10), dec!(4), Decimal::ZERO, 2)
                .is_err()
        );
    }

    #[test]
    fn test_long_monthly_bond_no_overflow() {
        let terms = BondTerms::at_yield(dec!(1000), Some(dec!(4.5)), dec!(30.5), dec!(6), 12);
        assert_eq!(terms.total_periods().unwrap(), 366);
        let metrics = calculate_bond_metrics(&terms, Side::Buy, Decimal::ONE).unwrap();
        assert!(metrics.price > Decimal::ZERO && metrics.price < dec!(1000));
        assert!(metrics.macaulay_duration < dec!(30.5));
    }

    #[test]
    fn test_distressed_long_bond_prices_finitely() {
        // 30y semi-annual at 500%: growth 3.5^60 is out of range, df is not
        let terms = BondTerms::at_yield(dec!(1000), Some(dec!(5)), dec!(30), dec!(500), 2);
        let metrics = calculate_bond_metrics(&terms, Side::Buy, Decimal::ONE).unwrap();
        // Coupon annuity 25 / 2.5 dominates; redemption discounts to nothing
        assert_close(metrics.price, dec!(10), dec!(0.001), "distressed price");
        assert!(metrics.macaulay_duration > Decimal::ZERO && metrics.macaulay_duration < Decimal::ONE);
        assert!(metrics.dv01 < Decimal::ZERO);
    }

    #[test]
    fn test_yield_near_floor_is_error_not_panic() {
        // 1 + y/2 = 0.005, so df grows by 200 each period
        let terms = BondTerms::at_yield(dec!(1000), Some(dec!(5)), dec!(30), dec!(-199), 2);
        let err = calculate_bond_metrics(&terms, Side::Buy, Decimal::ONE).unwrap_err();
        assert!(matches!(err, BondRiskError::Overflow { .. }), "got {err:?}");
        assert!(calculate_bond_price(&terms, Side::Sell).is_err());
    }

    #[test]
    fn test_invalid_terms_fail_every_metric() {
        let mut terms = premium_bond();
        terms.years_to_maturity = Decimal::ZERO;
        assert!(calculate_bond_price(&terms, Side::Buy).is_err());
        assert!(calculate_macaulay_duration(&terms, Side::Buy).is_err());
        assert!(calculate_modified_duration(&terms, Side::Buy).is_err());
        assert!(calculate_bond_convexity(&terms, Side::Buy).is_err());
        assert!(calculate_bond_metrics(&terms, Side::Buy, Decimal::ONE).is_err());
    }

    #[test]
    fn test_analyze_bond_spread() {
        let out = analyze_bond(&premium_bond(), Decimal::ONE).unwrap();
        let r = &out.result;
        assert_eq!(r.total_periods, 20);
        assert_eq!(r.buy_sell_spread, r.buy.price - r.sell.price);
        assert!(r.buy_sell_spread < Decimal::ZERO);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_analyze_bond_warns_on_crossed_quotes() {
        let mut terms = premium_bond();
        terms.ytm_bid = Some(dec!(4.5));
        let out = analyze_bond(&terms, Decimal::ONE).unwrap();
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_price_spread_zero_buy_price() {
        assert!(price_spread(Decimal::ZERO, dec!(1)).is_err());
    }
}
