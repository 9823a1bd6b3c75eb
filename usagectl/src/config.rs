//! Configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The file path
//! defaults to `config.yaml` and can be changed with `-f` or the `USAGECTL_CONFIG` environment
//! variable. Every field has a default, so a missing file is not an error.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - base configuration (default: `config.yaml`)
//! 2. **Environment variables** - variables prefixed with `USAGECTL_` override YAML values
//!
//! Nested values use double underscores: `USAGECTL_BACKEND__URL=https://gateway.example.com`
//! sets `backend.url`.
//!
//! ## Example
//!
//! ```yaml
//! backend:
//!   url: https://gateway.example.com
//!   request_timeout: 10s
//!   access_token: sk-admin
//! display:
//!   quota_per_unit: 500000
//!   display_in_currency: true
//! charts:
//!   default_granularity: day
//!   utc_offset_minutes: 480
//! pricing:
//!   default_model_ratio: 30
//!   rate_table: rates.json
//! ```

use crate::analytics::{AggregateOptions, MIN_BUCKETS, TimeGranularity};
use crate::cli::Command;
use crate::display::QuotaDisplay;
use crate::errors::Error;
use crate::pricing::{DEFAULT_MODEL_RATIO, PricingDefaults, RateConfig};
use chrono::{FixedOffset, Offset, Utc};
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

/// Largest accepted UTC offset, in minutes
const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "USAGECTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub backend: BackendConfig,
    pub display: QuotaDisplay,
    pub charts: ChartsConfig,
    pub pricing: PricingConfig,
    /// Export traces over OTLP (endpoint and headers from the standard `OTEL_*` variables)
    pub enable_otel_export: bool,
}

/// Where the gateway's admin API lives and how to authenticate against it
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    pub url: Url,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Sent as `{auth_header_prefix}{access_token}` in `auth_header_name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub auth_header_name: String,
    pub auth_header_prefix: String,
}

impl BackendConfig {
    const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://localhost:3000").expect("default backend url is valid"),
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            access_token: None,
            auth_header_name: "Authorization".to_string(),
            auth_header_prefix: "Bearer ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChartsConfig {
    pub default_granularity: TimeGranularity,
    /// Charts are padded backwards to at least this many buckets
    pub min_buckets: usize,
    /// Offset in which buckets are cut and labelled, east of UTC
    pub utc_offset_minutes: i32,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            default_granularity: TimeGranularity::default(),
            min_buckets: MIN_BUCKETS,
            utc_offset_minutes: 0,
        }
    }
}

impl ChartsConfig {
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions::builder().min_buckets(self.min_buckets).offset(self.offset()).build()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PricingConfig {
    /// Model ratio used for models missing from the ratio table
    pub default_model_ratio: Decimal,
    /// JSON file with the rate tables, keyed by option name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_table: Option<PathBuf>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            default_model_ratio: DEFAULT_MODEL_RATIO,
            rate_table: None,
        }
    }
}

impl PricingConfig {
    pub fn defaults(&self) -> PricingDefaults {
        PricingDefaults {
            model_ratio: self.default_model_ratio,
        }
    }

    /// Read and validate the configured rate table file, if any
    pub fn load_rates(&self) -> Result<Option<RateConfig>, Error> {
        let Some(path) = &self.rate_table else {
            return Ok(None);
        };
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Failed to read rate table {}: {e}", path.display()),
        })?;
        RateConfig::from_json(&text).map(Some)
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<(), Error> {
        if !matches!(self.backend.url.scheme(), "http" | "https") {
            return Err(Error::Config {
                message: format!("backend.url must be an http(s) URL, got '{}'", self.backend.url),
            });
        }
        if self.backend.request_timeout.is_zero() {
            return Err(Error::Config {
                message: "backend.request_timeout must be greater than zero".to_string(),
            });
        }
        if self.display.quota_per_unit <= Decimal::ZERO {
            return Err(Error::Config {
                message: format!("display.quota_per_unit must be positive, got {}", self.display.quota_per_unit),
            });
        }
        if self.charts.min_buckets == 0 {
            return Err(Error::Config {
                message: "charts.min_buckets must be at least 1".to_string(),
            });
        }
        if self.charts.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(Error::Config {
                message: format!(
                    "charts.utc_offset_minutes must be within +/-{MAX_UTC_OFFSET_MINUTES}, got {}",
                    self.charts.utc_offset_minutes
                ),
            });
        }
        if self.pricing.default_model_ratio < Decimal::ZERO {
            return Err(Error::Config {
                message: format!("pricing.default_model_ratio must not be negative, got {}", self.pricing.default_model_ratio),
            });
        }
        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            // USAGECTL_CONFIG names the file itself, it is not a config key
            .merge(Env::prefixed("USAGECTL_").ignore(&["config"]).split("__"))
    }
}
