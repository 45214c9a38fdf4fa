//! Implied spot rates and pairwise forward rates.
//!
//! Rates here are decimals (0.05 = 5%); coupons stay in percent to match the
//! bond terms they come from. Fractional exponents go through
//! `checked_powd` so an overflow surfaces as an error instead of a panic.

use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::BondRiskError;
use crate::types::{with_metadata, ComputationOutput, Money, Percent, Rate, Years};
use crate::BondRiskResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A single spot (zero) rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotRate {
    pub maturity: Years,
    pub rate: Rate,
}

/// A single forward rate between two tenors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardRate {
    pub start: Years,
    pub end: Years,
    pub rate: Rate,
}

/// Observed bonds to derive a spot and forward curve from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateCurveInput {
    /// Yields to maturity as decimals, one per bond
    pub ytms: Vec<Rate>,
    /// Annual coupons in percent, one per bond
    pub coupon_rates: Vec<Percent>,
    /// Years to maturity, one per bond
    pub maturities: Vec<Years>,
    /// Face value shared by every bond
    pub face_value: Money,
}

/// Spot curve plus the full upper-triangular forward grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateCurveOutput {
    pub spot_rates: Vec<SpotRate>,
    pub forward_rates: Vec<ForwardRate>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Spot rate implied by a bond's own yield, coupon and maturity.
///
/// `s = (C / (1 - (1+ytm)^-T) + FV / (1+ytm)^T)^(1/T) - 1` with
/// `C = FV × coupon/100`. The bond's YTM is substituted into the annuity term
/// rather than solving a full bootstrap.
///
/// The root `value^(1/T)` is taken on the discounted cash flows in currency
/// units, so short fractional tenors on a large face value (for example
/// `T = 0.1` with `FV = 1000`, i.e. `value^10`) leave the decimal range and
/// return [`BondRiskError::Overflow`].
pub fn calculate_spot_rate(
    ytm: Rate,
    coupon_rate: Percent,
    time_to_maturity: Years,
    face_value: Money,
) -> BondRiskResult<Rate> {
    if time_to_maturity <= Decimal::ZERO {
        return Err(BondRiskError::InvalidInput {
            field: "time_to_maturity".into(),
            reason: "Time to maturity must be positive.".into(),
        });
    }
    if ytm <= -Decimal::ONE {
        return Err(BondRiskError::InvalidInput {
            field: "ytm".into(),
            reason: "YTM must be greater than -1 (i.e. > -100%).".into(),
        });
    }

    let coupon = face_value * coupon_rate / Decimal::ONE_HUNDRED;
    let growth = pow(Decimal::ONE + ytm, time_to_maturity, "spot rate growth factor")?;
    let annuity_denominator = Decimal::ONE - Decimal::ONE / growth;
    if annuity_denominator.is_zero() {
        return Err(BondRiskError::DivisionByZero {
            context: "spot rate: 1 - (1 + ytm)^-T is zero".to_string(),
        });
    }

    let value = coupon / annuity_denominator + face_value / growth;
    if value <= Decimal::ZERO {
        return Err(BondRiskError::InvalidInput {
            field: "face_value".into(),
            reason: "Discounted cash flows must be positive to take a root.".into(),
        });
    }

    Ok(pow(value, Decimal::ONE / time_to_maturity, "spot rate root")? - Decimal::ONE)
}

/// Element-wise [`calculate_spot_rate`] over three parallel sequences.
pub fn create_spot_rate_curve(
    ytms: &[Rate],
    coupon_rates: &[Percent],
    maturities: &[Years],
    face_value: Money,
) -> BondRiskResult<Vec<Rate>> {
    check_len("spot curve coupon_rates", ytms.len(), coupon_rates.len())?;
    check_len("spot curve maturities", ytms.len(), maturities.len())?;

    ytms.iter()
        .zip(coupon_rates)
        .zip(maturities)
        .map(|((&ytm, &coupon), &maturity)| calculate_spot_rate(ytm, coupon, maturity, face_value))
        .collect()
}

/// Forward rate from `time_i` to `time_j`: `(1+s_j)^t_j / (1+s_i)^t_i - 1`.
///
/// `time_j <= time_i` is accepted and yields the inverted rate; it is logged
/// as a warning.
pub fn calculate_forward_rate(
    spot_i: Rate,
    spot_j: Rate,
    time_i: Years,
    time_j: Years,
) -> BondRiskResult<Rate> {
    if time_j <= time_i {
        tracing::warn!(%time_i, %time_j, "forward rate requested out of chronological order");
    }
    for (field, spot) in [("spot_i", spot_i), ("spot_j", spot_j)] {
        if spot <= -Decimal::ONE {
            return Err(BondRiskError::InvalidInput {
                field: field.into(),
                reason: "Spot rate must be greater than -1 (i.e. > -100%).".into(),
            });
        }
    }

    let far = pow(Decimal::ONE + spot_j, time_j, "forward rate far leg")?;
    let near = pow(Decimal::ONE + spot_i, time_i, "forward rate near leg")?;
    Ok(far / near - Decimal::ONE)
}

/// Every forward rate `f(i, j)` with `i < j`, in lexicographic `(i, j)` order.
///
/// `n` spot points give `n(n-1)/2` forwards.
pub fn create_forward_rate_curve(
    spot_rates: &[Rate],
    maturities: &[Years],
) -> BondRiskResult<Vec<Rate>> {
    check_len("forward curve maturities", spot_rates.len(), maturities.len())?;

    let n = spot_rates.len();
    let mut forwards = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            forwards.push(calculate_forward_rate(
                spot_rates[i],
                spot_rates[j],
                maturities[i],
                maturities[j],
            )?);
        }
    }
    Ok(forwards)
}

/// Spot and forward curves for a set of observed bonds.
pub fn build_rate_curves(
    input: &RateCurveInput,
) -> BondRiskResult<ComputationOutput<RateCurveOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.ytms.is_empty() {
        return Err(BondRiskError::InsufficientData(
            "At least one bond is required to build a rate curve".into(),
        ));
    }

    let spots = create_spot_rate_curve(
        &input.ytms,
        &input.coupon_rates,
        &input.maturities,
        input.face_value,
    )?;
    let forwards = create_forward_rate_curve(&spots, &input.maturities)?;

    if let Some(pos) = input.maturities.windows(2).position(|w| w[1] <= w[0]) {
        warnings.push(format!(
            "Maturities are not strictly increasing (index {} -> {}); some forward rates run backwards in time",
            pos,
            pos + 1
        ));
    }

    let spot_rates: Vec<SpotRate> = input
        .maturities
        .iter()
        .zip(&spots)
        .map(|(&maturity, &rate)| SpotRate { maturity, rate })
        .collect();

    let n = spots.len();
    let pairs = (0..n).flat_map(|i| ((i + 1)..n).map(move |j| (i, j)));
    let forward_rates: Vec<ForwardRate> = pairs
        .zip(forwards)
        .map(|((i, j), rate)| ForwardRate {
            start: input.maturities[i],
            end: input.maturities[j],
            rate,
        })
        .collect();

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "face_value": input.face_value.to_string(),
        "spot_method": "closed-form approximation using each bond's own YTM",
        "forward_pairs": "all i < j",
    });

    Ok(with_metadata(
        "Implied Spot Rates & Pairwise Forward Rates",
        &assumptions,
        warnings,
        elapsed,
        RateCurveOutput {
            spot_rates,
            forward_rates,
        },
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn pow(base: Decimal, exponent: Decimal, context: &str) -> BondRiskResult<Decimal> {
    base.checked_powd(exponent)
        .ok_or_else(|| BondRiskError::Overflow {
            context: context.to_string(),
        })
}

fn check_len(context: &str, expected: usize, actual: usize) -> BondRiskResult<()> {
    if expected != actual {
        return Err(BondRiskError::LengthMismatch {
            context: context.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
