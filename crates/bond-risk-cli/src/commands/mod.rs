pub mod analyze;
pub mod bond;
pub mod clean;
pub mod curve;
pub mod portfolio;
