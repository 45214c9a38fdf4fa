pub mod config;
pub mod error;
pub mod fixed_income;
pub mod table;
pub mod types;

#[cfg(feature = "portfolio")]
pub mod portfolio;

#[cfg(feature = "dataset")]
pub mod dataset;

pub use config::AnalysisConfig;
pub use error::BondRiskError;
pub use types::*;

/// Standard result type for all bond-risk operations
pub type BondRiskResult<T> = Result<T, BondRiskError>;
