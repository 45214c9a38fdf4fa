pub mod aggregator;
pub mod weights;
