//! The public model catalog served by `/api/pricing`.
//!
//! The catalog lists every model with its billing mode and enabled groups, alongside the group
//! ratio table and the set of groups the caller may use. It can be turned into a [`RateConfig`]
//! for the resolver, or into per-group rows with prices per million tokens.

use crate::display::ratio_color;
use crate::pricing::rates::RateConfig;
use crate::pricing::resolver::{DEFAULT_GROUP_RATIO, unit_prices};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::warn;

/// Billing mode of a catalog entry, `0` or `1` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum QuotaType {
    /// Priced per token from the ratio tables
    Ratio,
    /// Priced per call
    FixedPrice,
    Unknown(u8),
}

impl From<u8> for QuotaType {
    fn from(value: u8) -> Self {
        match value {
            0 => QuotaType::Ratio,
            1 => QuotaType::FixedPrice,
            other => QuotaType::Unknown(other),
        }
    }
}

impl From<QuotaType> for u8 {
    fn from(value: QuotaType) -> Self {
        match value {
            QuotaType::Ratio => 0,
            QuotaType::FixedPrice => 1,
            QuotaType::Unknown(other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub model_name: String,
    pub quota_type: QuotaType,
    #[serde(default)]
    pub model_ratio: Decimal,
    #[serde(default)]
    pub completion_ratio: Decimal,
    #[serde(default)]
    pub model_price: Decimal,
    #[serde(default)]
    pub enable_groups: Vec<String>,
}

/// Body of `GET /api/pricing`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Vec<ModelEntry>,
    #[serde(default)]
    pub group_ratio: BTreeMap<String, Decimal>,
    /// Group name to a description or flag; a group is usable when its value is truthy
    #[serde(default)]
    pub usable_group: BTreeMap<String, Value>,
}

/// One model as seen by one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogRow {
    pub model_name: String,
    pub quota_type: QuotaType,
    /// The group is enabled for the model and usable by the caller
    pub available: bool,
    /// Enabled groups the caller may use
    pub usable_groups: Vec<String>,
    pub model_ratio: Option<Decimal>,
    pub completion_ratio: Option<Decimal>,
    pub group_ratio: Decimal,
    /// Prompt price per 1M tokens, group ratio included
    pub input_price: Option<Decimal>,
    /// Completion price per 1M tokens, group ratio included
    pub completion_price: Option<Decimal>,
    /// Per-call price, group ratio included
    pub fixed_price: Option<Decimal>,
    pub ratio_color: &'static str,
}

impl PricingResponse {
    pub fn is_usable(&self, group: &str) -> bool {
        self.usable_group.get(group).is_some_and(truthy)
    }

    /// Multiplier for `group`, one when the catalog does not list it
    pub fn group_ratio_of(&self, group: &str) -> Decimal {
        self.group_ratio.get(group).copied().unwrap_or(DEFAULT_GROUP_RATIO)
    }

    /// Rate tables implied by the catalog
    pub fn rate_config(&self) -> RateConfig {
        let mut config = RateConfig {
            group_ratio: self.group_ratio.clone(),
            ..RateConfig::default()
        };
        for entry in &self.data {
            match entry.quota_type {
                QuotaType::FixedPrice => {
                    config.fixed_price.insert(entry.model_name.clone(), entry.model_price);
                }
                QuotaType::Ratio => {
                    config.model_ratio.insert(entry.model_name.clone(), entry.model_ratio);
                    config.completion_ratio.insert(entry.model_name.clone(), entry.completion_ratio);
                }
                QuotaType::Unknown(kind) => {
                    warn!(model = %entry.model_name, quota_type = kind, "Skipping catalog entry with unknown quota type");
                }
            }
        }
        config
    }

    /// Catalog rows for `group`, `gpt*` models first, then by name
    pub fn rows(&self, group: &str) -> Vec<CatalogRow> {
        let group_ratio = self.group_ratio_of(group);
        let available_to_caller = self.is_usable(group);

        let mut rows: Vec<CatalogRow> = self
            .data
            .iter()
            .map(|entry| {
                let is_ratio = entry.quota_type == QuotaType::Ratio;
                let prices = is_ratio
                    .then(|| unit_prices(entry.model_ratio, entry.completion_ratio, group_ratio))
                    .flatten();
                let fixed_price = (entry.quota_type == QuotaType::FixedPrice)
                    .then(|| entry.model_price.checked_mul(group_ratio))
                    .flatten();

                CatalogRow {
                    model_name: entry.model_name.clone(),
                    quota_type: entry.quota_type,
                    available: available_to_caller && entry.enable_groups.iter().any(|g| g == group),
                    usable_groups: entry.enable_groups.iter().filter(|g| self.is_usable(g)).cloned().collect(),
                    model_ratio: is_ratio.then_some(entry.model_ratio),
                    completion_ratio: is_ratio.then_some(entry.completion_ratio),
                    group_ratio,
                    input_price: prices.map(|(input, _)| input),
                    completion_price: prices.map(|(_, completion)| completion),
                    fixed_price,
                    ratio_color: ratio_color(group_ratio),
                }
            })
            .collect();

        rows.sort_by(|a, b| catalog_order(&a.model_name, &b.model_name));
        rows
    }
}

fn catalog_order(a: &str, b: &str) -> Ordering {
    match (a.starts_with("gpt"), b.starts_with("gpt")) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.cmp(b),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::resolver::{PriceQuery, PricingDefaults, PricingMode, resolve_price};
    use serde_json::json;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn catalog() -> PricingResponse {
        serde_json::from_value(json!({
            "success": true,
            "data": [
                {"model_name": "claude-3-haiku", "quota_type": 0, "model_ratio": 0.125, "completion_ratio": 5,
                 "model_price": 0, "enable_groups": ["default", "vip"]},
                {"model_name": "midjourney", "quota_type": 1, "model_ratio": 0, "completion_ratio": 0,
                 "model_price": 0.1, "enable_groups": ["vip"]},
                {"model_name": "gpt-4o", "quota_type": 0, "model_ratio": 1.25, "completion_ratio": 4,
                 "model_price": 0, "enable_groups": ["default", "internal"]},
                {"model_name": "legacy", "quota_type": 7, "enable_groups": []}
            ],
            "group_ratio": {"default": 1, "vip": 0.5, "internal": 0},
            "usable_group": {"default": "Default group", "vip": "VIP", "internal": ""}
        }))
        .unwrap()
    }

    #[test]
    fn test_rows_sorted_gpt_first() {
        let names: Vec<_> = catalog().rows("default").into_iter().map(|r| r.model_name).collect();
        assert_eq!(names, vec!["gpt-4o", "claude-3-haiku", "legacy", "midjourney"]);
    }

    #[test]
    fn test_rows_prices_and_availability() {
        let rows = catalog().rows("vip");

        let gpt = &rows[0];
        assert!(!gpt.available);
        assert_eq!(gpt.usable_groups, vec!["default"]);
        // 1.25 * 2 * 0.5, then * 4
        assert_eq!(gpt.input_price, Some(d("1.25")));
        assert_eq!(gpt.completion_price, Some(d("5")));
        assert_eq!(gpt.fixed_price, None);
        assert_eq!(gpt.ratio_color, "green");

        let mj = rows.iter().find(|r| r.model_name == "midjourney").unwrap();
        assert!(mj.available);
        assert_eq!(mj.fixed_price, Some(d("0.05")));
        assert_eq!(mj.input_price, None);
        assert_eq!(mj.model_ratio, None);
    }

    #[test]
    fn test_unusable_group_is_never_available() {
        let rows = catalog().rows("internal");
        assert!(rows.iter().all(|r| !r.available));
    }

    #[test]
    fn test_unknown_group_uses_default_ratio() {
        let catalog = catalog();
        assert_eq!(catalog.group_ratio_of("nobody"), DEFAULT_GROUP_RATIO);
        assert!(!catalog.is_usable("nobody"));
    }

    #[test]
    fn test_rate_config_from_catalog() {
        let catalog = catalog();
        let rates = catalog.rate_config();

        assert_eq!(rates.fixed_price.get("midjourney"), Some(&d("0.1")));
        assert!(!rates.model_ratio.contains_key("midjourney"));
        assert_eq!(rates.model_ratio.get("gpt-4o"), Some(&d("1.25")));
        assert_eq!(rates.completion_ratio.get("claude-3-haiku"), Some(&d("5")));
        assert!(!rates.model_ratio.contains_key("legacy"));
        assert_eq!(rates.group_ratio("vip"), Some(d("0.5")));

        let query = PriceQuery::builder()
            .model("midjourney")
            .group_ratio(catalog.group_ratio_of("vip"))
            .build();
        let resolution = resolve_price(&query, &rates, &PricingDefaults::default()).unwrap();
        assert_eq!(resolution.mode, PricingMode::FixedPrice);
        assert_eq!(resolution.total, d("0.05"));
    }

    #[test]
    fn test_quota_type_round_trips_unknown() {
        assert_eq!(serde_json::to_value(QuotaType::Unknown(9)).unwrap(), json!(9));
        assert_eq!(serde_json::from_value::<QuotaType>(json!(1)).unwrap(), QuotaType::FixedPrice);
    }
}
