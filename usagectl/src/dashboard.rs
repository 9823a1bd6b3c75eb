//! Query-driven views: the usage dashboard and the channel board.
//!
//! Each `refresh` fetches from the [`Backend`], computes the view, and applies it only if no newer
//! refresh started in the meantime. A failed fetch returns the error and leaves the previously
//! applied view untouched.

use crate::analytics::{AggregateOptions, Aggregation, ChartProjection, Throughput, aggregate_with, build_projection};
use crate::backend::{Backend, ChannelQuery, UsageQuery};
use crate::channels::{DisplayRow, group_by_tag};
use crate::display::QuotaDisplay;
use crate::errors::Result;
use crate::query::{Applied, Latest};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// What happened to a refresh that completed without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied { generation: u64 },
    /// A newer refresh was started; this result was dropped
    Stale { generation: u64 },
}

impl RefreshOutcome {
    fn of(applied: bool, generation: u64) -> Self {
        if applied {
            RefreshOutcome::Applied { generation }
        } else {
            RefreshOutcome::Stale { generation }
        }
    }

    pub fn is_applied(self) -> bool {
        matches!(self, RefreshOutcome::Applied { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageView {
    pub query: UsageQuery,
    pub aggregation: Aggregation,
    pub projection: ChartProjection,
    pub throughput: Throughput,
}

pub struct UsageDashboard {
    backend: Arc<dyn Backend>,
    display: QuotaDisplay,
    options: AggregateOptions,
    view: Latest<UsageView>,
}

impl UsageDashboard {
    pub fn new(backend: Arc<dyn Backend>, display: QuotaDisplay, options: AggregateOptions) -> Self {
        Self {
            backend,
            display,
            options,
            view: Latest::new(),
        }
    }

    #[instrument(skip(self), fields(granularity = %query.granularity))]
    pub async fn refresh(&self, query: UsageQuery) -> Result<RefreshOutcome> {
        let ticket = self.view.begin();
        let records = self.backend.usage(&query).await?;

        let aggregation = aggregate_with(&records, query.granularity, &self.options);
        let projection = build_projection(&aggregation, &self.display);
        let throughput = aggregation.totals.throughput(query.start, query.end);

        let applied = self.view.apply(
            ticket,
            UsageView {
                query,
                aggregation,
                projection,
                throughput,
            },
        );
        if applied {
            info!(generation = ticket.generation(), records = records.len(), "Applied usage view");
        }
        Ok(RefreshOutcome::of(applied, ticket.generation()))
    }

    pub fn current(&self) -> Option<Arc<Applied<UsageView>>> {
        self.view.get()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelView {
    pub query: ChannelQuery,
    pub rows: Vec<DisplayRow>,
}

pub struct ChannelBoard {
    backend: Arc<dyn Backend>,
    view: Latest<ChannelView>,
}

impl ChannelBoard {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            view: Latest::new(),
        }
    }

    /// Fetch a page of channels and group it by tag when the query asks for tag mode
    #[instrument(skip(self))]
    pub async fn refresh(&self, query: ChannelQuery) -> Result<RefreshOutcome> {
        let ticket = self.view.begin();
        let channels = self.backend.channels(&query).await?;
        let rows = group_by_tag(channels, query.tag_mode);

        let applied = self.view.apply(ticket, ChannelView { query, rows });
        Ok(RefreshOutcome::of(applied, ticket.generation()))
    }

    pub fn current(&self) -> Option<Arc<Applied<ChannelView>>> {
        self.view.get()
    }
}
