//! Shared types, error model, and configuration for geofill.
//!
//! This crate is the foundation depended on by all other geofill crates.
//! It provides:
//! - [`GeofillError`]: the unified error type
//! - Domain types ([`AddressKey`], [`Coordinate`], [`Resolution`], [`RunId`])
//! - Configuration ([`AppConfig`], [`EnrichmentConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, EnrichmentConfig, NetworkErrorPolicy, ProviderConfig,
    RateLimitConfig, RetryConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, resolve_api_key,
};
pub use error::{GeofillError, Result};
pub use types::{AddressKey, Coordinate, Resolution, RunId};
