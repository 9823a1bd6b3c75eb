//! Time-bucket aggregation of usage records, with bucket-range completion.
//!
//! Records are folded into one cell per `(bucket, model)` pair. The result is always a complete
//! grid: every bucket has a cell for every model, zero-valued where nothing was observed. When
//! fewer than [`MIN_BUCKETS`] distinct buckets were observed, earlier buckets are synthesized by
//! stepping back from the most recent one, so a chart never collapses to a single point.

use crate::analytics::buckets::{BucketKey, TimeGranularity};
use crate::analytics::records::UsageRecord;
use crate::types::{NO_DATA_LABEL, Quota};
use bon::Builder;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

/// Minimum number of buckets in a chart
pub const MIN_BUCKETS: usize = 7;

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

/// Knobs for [`aggregate_with`]
#[derive(Debug, Clone, Builder)]
pub struct AggregateOptions {
    /// Pad the result to at least this many buckets
    #[builder(default = MIN_BUCKETS)]
    pub min_buckets: usize,
    /// Offset in which bucket boundaries and labels are computed
    #[builder(default = utc_offset())]
    pub offset: FixedOffset,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Summed usage for one model within one bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateCell {
    pub bucket: BucketKey,
    pub model_name: String,
    pub quota_sum: Quota,
    pub count_sum: i64,
    pub token_sum: i64,
}

/// Totals over every record that made it into a bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub quota: Quota,
    pub tokens: i64,
    pub count: i64,
}

/// Requests and tokens per minute over a query window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Throughput {
    pub requests_per_minute: f64,
    pub tokens_per_minute: f64,
}

impl UsageTotals {
    /// Sums saturate at the `i64` bounds instead of wrapping
    fn add(&mut self, record: &UsageRecord) {
        self.quota = self.quota.saturating_add(record.quota_or_zero());
        self.tokens = self.tokens.saturating_add(record.tokens_or_zero());
        self.count = self.count.saturating_add(record.count_or_zero());
    }

    /// Average throughput between `start` and `end`. An empty or inverted window yields zero.
    pub fn throughput(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Throughput {
        let minutes = (end - start).num_milliseconds() as f64 / 60_000.0;
        if minutes <= 0.0 {
            return Throughput::default();
        }
        Throughput {
            requests_per_minute: self.count as f64 / minutes,
            tokens_per_minute: self.tokens as f64 / minutes,
        }
    }
}

/// Full aggregation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub granularity: TimeGranularity,
    /// Chronologically ascending, observed and synthesized
    pub buckets: Vec<BucketKey>,
    /// Every model seen in an aggregated record, by name
    pub models: Vec<String>,
    /// Bucket ascending, then `quota_sum` descending, then model name ascending
    pub cells: Vec<AggregateCell>,
    pub totals: UsageTotals,
    /// Records dropped for a missing or unusable `created_at`
    pub skipped: usize,
}

impl Aggregation {
    /// True when no record could be placed in a bucket
    pub fn is_placeholder(&self) -> bool {
        self.models.is_empty()
    }

    /// Cells of one bucket, in display order
    pub fn cells_in<'a>(&'a self, bucket: &'a BucketKey) -> impl Iterator<Item = &'a AggregateCell> + 'a {
        self.cells.iter().filter(move |cell| &cell.bucket == bucket)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Sums {
    quota: Quota,
    count: i64,
    tokens: i64,
}

/// Aggregate with default options (UTC, seven buckets minimum)
pub fn aggregate(records: &[UsageRecord], granularity: TimeGranularity) -> Vec<AggregateCell> {
    aggregate_with(records, granularity, &AggregateOptions::default()).cells
}

/// Group records by bucket and model, complete the bucket range, and lay out the grid
#[instrument(skip_all, fields(records = records.len(), granularity = %granularity))]
pub fn aggregate_with(records: &[UsageRecord], granularity: TimeGranularity, options: &AggregateOptions) -> Aggregation {
    let mut groups: BTreeMap<BucketKey, BTreeMap<&str, Sums>> = BTreeMap::new();
    let mut models: BTreeSet<&str> = BTreeSet::new();
    let mut totals = UsageTotals::default();
    let mut skipped = 0;

    for record in records {
        let Some(bucket) = record
            .created_at
            .and_then(|created_at| BucketKey::for_timestamp(created_at, granularity, options.offset))
        else {
            skipped += 1;
            continue;
        };

        let sums = groups.entry(bucket).or_default().entry(record.model_name.as_str()).or_default();
        sums.quota = sums.quota.saturating_add(record.quota_or_zero());
        sums.count = sums.count.saturating_add(record.count_or_zero());
        sums.tokens = sums.tokens.saturating_add(record.tokens_or_zero());

        models.insert(record.model_name.as_str());
        totals.add(record);
    }

    if skipped > 0 {
        debug!(skipped, "Skipped usage records without a usable created_at");
    }

    if groups.is_empty() {
        return placeholder(granularity, skipped);
    }

    let observed = groups.len();
    let buckets = complete_range(groups.keys().cloned().collect(), granularity, options);
    debug!(observed, total = buckets.len(), "Aggregated usage into buckets");

    let mut cells = Vec::with_capacity(buckets.len() * models.len());
    for bucket in &buckets {
        let observed = groups.get(bucket);
        let mut row: Vec<AggregateCell> = models
            .iter()
            .map(|model| {
                let sums = observed.and_then(|by_model| by_model.get(model)).copied().unwrap_or_default();
                AggregateCell {
                    bucket: bucket.clone(),
                    model_name: (*model).to_string(),
                    quota_sum: sums.quota,
                    count_sum: sums.count,
                    token_sum: sums.tokens,
                }
            })
            .collect();
        row.sort_by(|a, b| b.quota_sum.cmp(&a.quota_sum).then_with(|| a.model_name.cmp(&b.model_name)));
        cells.extend(row);
    }

    Aggregation {
        granularity,
        buckets,
        models: models.into_iter().map(str::to_string).collect(),
        cells,
        totals,
        skipped,
    }
}

/// Pad `observed` backwards from its most recent bucket until `min_buckets` are present.
/// Observed buckets are always kept; only missing ones are added.
fn complete_range(observed: BTreeSet<BucketKey>, granularity: TimeGranularity, options: &AggregateOptions) -> Vec<BucketKey> {
    let mut buckets = observed;
    let mut cursor = buckets.last().cloned();

    while buckets.len() < options.min_buckets {
        let Some(previous) = cursor.and_then(|bucket| bucket.previous(granularity, options.offset)) else {
            break;
        };
        buckets.insert(previous.clone());
        cursor = Some(previous);
    }

    buckets.into_iter().collect()
}

fn placeholder(granularity: TimeGranularity, skipped: usize) -> Aggregation {
    let bucket = BucketKey::no_data();
    Aggregation {
        granularity,
        buckets: vec![bucket.clone()],
        models: Vec::new(),
        cells: vec![AggregateCell {
            bucket,
            model_name: NO_DATA_LABEL.to_string(),
            quota_sum: 0,
            count_sum: 0,
            token_sum: 0,
        }],
        totals: UsageTotals::default(),
        skipped,
    }
}
