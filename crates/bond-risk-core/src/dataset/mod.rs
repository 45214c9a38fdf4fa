pub mod analysis;
pub mod cleaning;
pub mod countries;
pub mod curve;
