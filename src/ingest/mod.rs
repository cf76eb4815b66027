//! Upload ingestion.
//!
//! Turns raw uploaded bytes into typed equipment rows. Validation happens
//! once here; everything downstream consumes only [`crate::models::EquipmentRow`].

pub mod normalizer;

pub use normalizer::*;
