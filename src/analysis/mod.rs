//! Analysis modules.
//!
//! Aggregation of normalized equipment rows into dataset statistics.

pub mod aggregator;

pub use aggregator::*;
