//! CLI command implementations.

mod config;
mod curate;
mod doctor;
mod serve;

pub use config::run_config;
pub use curate::run_curate;
pub use doctor::run_doctor;
pub use serve::run_serve;
