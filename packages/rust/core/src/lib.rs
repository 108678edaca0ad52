//! Core enrichment orchestration for geofill.
//!
//! This crate ties record reading, filtering, rate-limited geocoding, and
//! result persistence into the end-to-end `run` workflow the CLI drives.

pub mod engine;
pub mod pipeline;
