//! Chart projections over an [`Aggregation`]: a stacked time series and a per-model distribution.
//!
//! Both tables keep the raw integer quota next to the currency value so a renderer can sort,
//! stack, or re-format without going back to the records.

use crate::analytics::aggregate::{Aggregation, UsageTotals};
use crate::colors::color_of;
use crate::display::{QuotaDisplay, render_number};
use crate::types::{Color, NO_DATA_LABEL, Quota};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::instrument;

/// Fractional digits of the currency values in the series table
pub const USAGE_DIGITS: u32 = 4;

/// One stacked bar segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "rawQuota")]
    pub raw_quota: Quota,
    /// Quota in currency units
    #[serde(rename = "Usage", with = "rust_decimal::serde::float")]
    pub usage: Decimal,
    /// Raw quota of every model in the same bucket
    #[serde(rename = "TimeSum")]
    pub time_sum: Quota,
}

/// Call count of one model over the whole range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionSlice {
    #[serde(rename = "type")]
    pub model: String,
    pub value: i64,
}

/// Pre-rendered headline numbers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captions {
    pub total_quota: String,
    pub total_tokens: String,
    pub total_count: String,
}

/// Everything a chart renderer needs for one usage query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartProjection {
    pub series: Vec<SeriesPoint>,
    /// Descending by count, ties by model name
    pub distribution: Vec<DistributionSlice>,
    pub colors: BTreeMap<String, Color>,
    pub totals: UsageTotals,
    pub captions: Captions,
}

/// Project an aggregation into renderer-ready tables
#[instrument(skip_all, fields(cells = aggregation.cells.len()))]
pub fn build_projection(aggregation: &Aggregation, display: &QuotaDisplay) -> ChartProjection {
    let mut time_sums: HashMap<i64, Quota> = HashMap::new();
    for cell in &aggregation.cells {
        let sum = time_sums.entry(cell.bucket.start).or_default();
        *sum = sum.saturating_add(cell.quota_sum);
    }

    let series = aggregation
        .cells
        .iter()
        .map(|cell| SeriesPoint {
            time: cell.bucket.label.clone(),
            model: cell.model_name.clone(),
            raw_quota: cell.quota_sum,
            usage: display.quota_with_unit(cell.quota_sum, USAGE_DIGITS),
            time_sum: time_sums.get(&cell.bucket.start).copied().unwrap_or_default(),
        })
        .collect();

    let colors = aggregation.models.iter().map(|model| (model.clone(), color_of(model))).collect();

    ChartProjection {
        series,
        distribution: distribution(aggregation),
        colors,
        totals: aggregation.totals,
        captions: Captions {
            total_quota: display.render_quota(aggregation.totals.quota, 2),
            total_tokens: render_number(aggregation.totals.tokens),
            total_count: render_number(aggregation.totals.count),
        },
    }
}

fn distribution(aggregation: &Aggregation) -> Vec<DistributionSlice> {
    if aggregation.is_placeholder() {
        return vec![DistributionSlice {
            model: NO_DATA_LABEL.to_string(),
            value: 0,
        }];
    }

    let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
    for cell in &aggregation.cells {
        let count = counts.entry(cell.model_name.as_str()).or_default();
        *count = count.saturating_add(cell.count_sum);
    }

    let mut slices: Vec<_> = counts
        .into_iter()
        .map(|(model, value)| DistributionSlice {
            model: model.to_string(),
            value,
        })
        .collect();
    slices.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.model.cmp(&b.model)));
    slices
}
