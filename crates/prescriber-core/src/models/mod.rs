//! Domain models for the prescriber system.

mod prescription;
mod record;

pub use prescription::*;
pub use record::*;
