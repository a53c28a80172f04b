//! Configuration for MiniCRM.
//!
//! Settings live in `.minicrm/config.yaml` under the project directory.
//! Every section is optional; missing keys fall back to the defaults in
//! [`types`], and `MINICRM_*` environment variables override the file.

pub mod env;
pub mod loader;
pub mod types;

pub use env::*;
pub use loader::*;
pub use types::*;
