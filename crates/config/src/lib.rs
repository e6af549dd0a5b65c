//! Configuration module for wp-bootstrap
//!
//! Loads installation settings from TOML files, `.env` files and environment
//! variables, validates them, and exposes a single immutable `InstallationConfig`.

pub mod base_path;
pub mod config;
pub mod secret;

pub use base_path::BasePath;
pub use config::*;
pub use secret::{generate_secret, Secret, DEFAULT_SECRET_LENGTH, SECRET_ALPHABET};
