//! Usage analytics: lenient record decoding, time bucketing, aggregation, and chart projection.

pub mod aggregate;
pub mod buckets;
pub mod charts;
pub mod records;

pub use aggregate::{AggregateCell, AggregateOptions, Aggregation, MIN_BUCKETS, Throughput, UsageTotals, aggregate, aggregate_with};
pub use buckets::{BucketKey, TimeGranularity};
pub use charts::{ChartProjection, DistributionSlice, SeriesPoint, build_projection};
pub use records::UsageRecord;
