//! Merging of the system file, `--set` overrides, command-line flags and built-in defaults
//! into one validated application configuration.

mod builder;
mod defaults;
mod file;
mod models;

pub use builder::build_config;
pub use models::AppConfig;
