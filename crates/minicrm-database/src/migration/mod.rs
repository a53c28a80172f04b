//! Version-tracked schema upgrades.

mod runner;
mod scripts;
mod types;

pub use runner::*;
pub use scripts::{baseline, BASELINE_VERSION};
pub use types::*;
