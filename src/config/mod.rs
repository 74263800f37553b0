//! Configuration surface for the delivery engine.

mod constants;
mod types;

pub use constants::*;
pub use types::{ConfigUpdate, ReporterConfig};
