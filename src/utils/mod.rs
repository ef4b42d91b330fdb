/// TOML-based configuration (`feyna.toml`).
pub mod config;
