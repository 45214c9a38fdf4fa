pub mod bond_math;
pub mod terms;

#[cfg(feature = "rate_curve")]
pub mod rate_curve;
