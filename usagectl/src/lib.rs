//! # usagectl: usage analytics and pricing for an LLM gateway admin console
//!
//! `usagectl` holds the computation behind a gateway console's usage and pricing screens. The
//! gateway backend owns all state; this crate fetches raw records from it and turns them into
//! what the console displays.
//!
//! ## Overview
//!
//! - [`analytics`] buckets per-request usage records by time and model, fills in empty buckets
//!   so a chart always spans at least [`analytics::MIN_BUCKETS`] intervals, and projects the
//!   result into series, distribution and caption tables.
//! - [`pricing`] resolves the price of a request from the gateway's rate tables: a fixed per-model
//!   price when one is configured, otherwise token counts scaled by model, completion, audio and
//!   group ratios. [`pricing::RateTableStore`] swaps rate tables atomically and rejects malformed
//!   updates without touching the previous snapshot.
//! - [`channels`] collapses upstream channels sharing a tag into one parent row whose fields
//!   summarise the children.
//! - [`query`] and [`dashboard`] make sure only the newest of several overlapping refreshes ever
//!   reaches the screen.
//! - [`colors`] assigns stable chart colors to model names.
//!
//! ## Backend
//!
//! [`backend::Backend`] is the seam to the gateway. [`backend::HttpBackend`] talks to its JSON
//! API with `reqwest`; tests substitute scripted implementations.
//!
//! ## Binary
//!
//! The `usagectl` binary exposes the same operations as subcommands (see [`cli`]), configured by
//! [`config::Config`] from a YAML file and `USAGECTL_` environment variables.

pub mod analytics;
pub mod backend;
pub mod channels;
pub mod cli;
pub mod colors;
pub mod config;
pub mod dashboard;
pub mod display;
pub mod errors;
pub mod pricing;
pub mod query;
pub mod telemetry;
pub mod types;

pub use config::Config;
pub use errors::{Error, Result};

/// Install the aws-lc-rs rustls provider for TLS clients.
///
/// reqwest is built without a default provider. Installing twice is harmless; the second attempt
/// is ignored.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}
