//! Subcommands of the `usagectl` binary.
//!
//! Every command reads its input either from a JSON file (a bare payload or the backend's
//! `{success, message, data}` envelope) or from the configured backend, and prints pretty JSON on
//! stdout.

use crate::analytics::{TimeGranularity, UsageRecord, aggregate_with, build_projection};
use crate::backend::{ApiResponse, Backend, ChannelQuery, HttpBackend, UsageQuery, UsageScope};
use crate::channels::{ChannelRow, group_by_tag};
use crate::config::Config;
use crate::dashboard::{ChannelBoard, UsageDashboard};
use crate::errors::{Error, Result};
use crate::pricing::{AudioTokens, PriceQuery, PricingResponse, RateConfig, RateTableStore};
use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{Args as ClapArgs, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Aggregate usage records into chart tables
    Usage(UsageArgs),
    /// Resolve the price of a request
    Price(PriceArgs),
    /// List channels, optionally grouped by tag
    Channels(ChannelArgs),
    /// Show the model catalog as seen by one group
    Catalog(CatalogArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct UsageArgs {
    /// Read records from this file instead of the backend
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Bucket width, defaults to `charts.default_granularity`
    #[arg(long, value_enum)]
    pub granularity: Option<TimeGranularity>,
    /// Length of the query window ending now
    #[arg(long, default_value_t = 7)]
    pub days: u32,
    /// Query all users (admin), optionally one username
    #[arg(long)]
    pub all: bool,
    #[arg(long, requires = "all")]
    pub username: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PriceArgs {
    pub model: String,
    #[arg(long, default_value_t = 0)]
    pub input_tokens: u64,
    #[arg(long, default_value_t = 0)]
    pub completion_tokens: u64,
    #[arg(long)]
    pub audio_input_tokens: Option<u64>,
    #[arg(long)]
    pub audio_completion_tokens: Option<u64>,
    /// Look the group ratio up in the rate tables
    #[arg(long, conflicts_with = "group_ratio")]
    pub group: Option<String>,
    /// Use this group ratio directly
    #[arg(long)]
    pub group_ratio: Option<Decimal>,
    /// Rate tables file, defaults to `pricing.rate_table`
    #[arg(long, conflicts_with = "from_backend")]
    pub rates: Option<PathBuf>,
    /// Derive the rate tables from the backend's model catalog
    #[arg(long)]
    pub from_backend: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ChannelArgs {
    /// Read channels from this file instead of the backend
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Collapse channels sharing a tag
    #[arg(long)]
    pub tag_mode: bool,
    #[arg(long, default_value_t = 0)]
    pub page: u32,
    #[arg(long, default_value_t = 100)]
    pub page_size: u32,
    #[arg(long)]
    pub id_sort: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CatalogArgs {
    /// Read the catalog from this file instead of the backend
    #[arg(long)]
    pub file: Option<PathBuf>,
    #[arg(long, default_value = "default")]
    pub group: String,
}

/// Run one command and print its result
pub async fn run(command: Command, config: &Config) -> anyhow::Result<()> {
    let output = match command {
        Command::Usage(args) => usage(args, config).await?,
        Command::Price(args) => price(args, config).await?,
        Command::Channels(args) => channels(args, config).await?,
        Command::Catalog(args) => catalog(args, config).await?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn backend(config: &Config) -> Result<Arc<dyn Backend>> {
    Ok(Arc::new(HttpBackend::new(&config.backend)?))
}

async fn usage(args: UsageArgs, config: &Config) -> anyhow::Result<Value> {
    let granularity = args.granularity.unwrap_or(config.charts.default_granularity);
    let options = config.charts.aggregate_options();

    if let Some(path) = &args.file {
        let records: Vec<UsageRecord> = read_payload(path)?;
        let aggregation = aggregate_with(&records, granularity, &options);
        let projection = build_projection(&aggregation, &config.display);
        return Ok(json!({ "aggregation": aggregation, "projection": projection }));
    }

    let end = Utc::now();
    let query = UsageQuery {
        scope: if args.all {
            UsageScope::All { username: args.username }
        } else {
            UsageScope::Own
        },
        start: end - Duration::days(i64::from(args.days)),
        end,
        granularity,
    };

    let dashboard = UsageDashboard::new(backend(config)?, config.display, options);
    dashboard.refresh(query).await?;
    let view = dashboard.current().context("usage view was not applied")?;
    Ok(serde_json::to_value(&view.value)?)
}

async fn price(args: PriceArgs, config: &Config) -> anyhow::Result<Value> {
    let rates = if args.from_backend {
        backend(config)?.pricing().await?.rate_config()
    } else if let Some(path) = &args.rates {
        RateConfig::from_json(&read_text(path)?)?
    } else {
        config.pricing.load_rates()?.unwrap_or_default()
    };
    let store = RateTableStore::new(rates, config.pricing.defaults())?;

    let group_ratio = match (&args.group, args.group_ratio) {
        (_, Some(ratio)) => Some(ratio),
        (Some(group), None) => {
            let ratio = store.current().rates.group_ratio(group);
            if ratio.is_none() {
                info!(group = %group, "Group has no configured ratio, using the default");
            }
            ratio
        }
        (None, None) => None,
    };

    let audio = (args.audio_input_tokens.is_some() || args.audio_completion_tokens.is_some()).then(|| AudioTokens {
        input: args.audio_input_tokens.unwrap_or_default(),
        completion: args.audio_completion_tokens.unwrap_or_default(),
    });

    let query = PriceQuery {
        model: args.model,
        input_tokens: args.input_tokens,
        completion_tokens: args.completion_tokens,
        group_ratio,
        audio,
    };
    let resolution = store.resolve(&query)?;
    Ok(json!({ "derivation": resolution.describe(), "resolution": resolution }))
}

async fn channels(args: ChannelArgs, config: &Config) -> anyhow::Result<Value> {
    if let Some(path) = &args.file {
        let rows: Vec<ChannelRow> = read_payload(path)?;
        return to_value(&group_by_tag(rows, args.tag_mode));
    }

    let query = ChannelQuery {
        page: args.page,
        page_size: args.page_size,
        id_sort: args.id_sort,
        tag_mode: args.tag_mode,
    };
    let board = ChannelBoard::new(backend(config)?);
    board.refresh(query).await?;
    let view = board.current().context("channel view was not applied")?;
    to_value(&view.value)
}

async fn catalog(args: CatalogArgs, config: &Config) -> anyhow::Result<Value> {
    let pricing: PricingResponse = match &args.file {
        Some(path) => serde_json::from_str(&read_text(path)?)?,
        None => backend(config)?.pricing().await?,
    };
    to_value(&pricing.rows(&args.group))
}

fn to_value<T: Serialize>(value: &T) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read {}: {e}", path.display()),
    })
}

/// Decode a file holding either a bare payload or a `{success, message, data}` envelope
fn read_payload<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    let value: Value = serde_json::from_str(&read_text(path)?)?;
    if value.get("success").is_some() {
        let envelope: ApiResponse<T> = serde_json::from_value(value)?;
        return envelope.into_result();
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file_with(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_payload_bare_and_envelope() {
        let bare = file_with(r#"[{"created_at": 1, "model_name": "a", "quota": 1, "count": 1}]"#);
        let records: Vec<UsageRecord> = read_payload(bare.path()).unwrap();
        assert_eq!(records.len(), 1);

        let wrapped = file_with(r#"{"success": true, "message": "", "data": [{"id": 1}, {"id": 2}]}"#);
        let rows: Vec<ChannelRow> = read_payload(wrapped.path()).unwrap();
        assert_eq!(rows.len(), 2);

        let failed = file_with(r#"{"success": false, "message": "expired session"}"#);
        let err = read_payload::<Vec<ChannelRow>>(failed.path()).unwrap_err();
        assert_eq!(err.user_message(), "expired session");
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_text(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_usage_from_file() {
        let file = file_with(r#"[{"created_at": 1717200000, "model_name": "gpt-4", "quota": 250000, "count": 2}]"#);
        let args = UsageArgs {
            file: Some(file.path().to_path_buf()),
            granularity: Some(TimeGranularity::Day),
            days: 7,
            all: false,
            username: None,
        };

        let output = usage(args, &Config::default()).await.unwrap();

        assert_eq!(output["aggregation"]["buckets"].as_array().unwrap().len(), 7);
        assert_eq!(output["projection"]["captions"]["total_quota"], "$0.50");
        assert_eq!(output["projection"]["distribution"][0]["type"], "gpt-4");
    }

    #[tokio::test]
    async fn test_price_from_rates_file() {
        let rates = file_with(r#"{"ModelRatio": {"m": 0.5}, "CompletionRatio": {"m": 2}, "GroupRatio": {"vip": 2}}"#);
        let args = PriceArgs {
            model: "m".into(),
            input_tokens: 1_000_000,
            completion_tokens: 500_000,
            audio_input_tokens: None,
            audio_completion_tokens: None,
            group: Some("vip".into()),
            group_ratio: None,
            rates: Some(rates.path().to_path_buf()),
            from_backend: false,
        };

        let output = price(args, &Config::default()).await.unwrap();

        assert_eq!(output["resolution"]["mode"], "ratio");
        assert_eq!(output["resolution"]["group_ratio"]["source"], "configured");
        let total: Decimal = serde_json::from_value(output["resolution"]["total"].clone()).unwrap();
        assert_eq!(total, Decimal::from(4));
        assert_eq!(output["derivation"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_channels_from_file() {
        let file = file_with(
            r#"[
                {"id": 1, "tag": "east", "priority": 1, "status": 1},
                {"id": 2, "tag": "", "priority": 1, "status": 2},
                {"id": 3, "tag": "east", "priority": 2, "status": 3}
            ]"#,
        );
        let args = ChannelArgs {
            file: Some(file.path().to_path_buf()),
            tag_mode: true,
            page: 0,
            page_size: 100,
            id_sort: false,
        };

        let output = channels(args, &Config::default()).await.unwrap();

        let rows = output.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["tag"], "east");
        assert_eq!(rows[0]["priority"], "mixed");
        assert_eq!(rows[0]["status"], 1);
        assert_eq!(rows[1]["id"], 2);
    }
}
