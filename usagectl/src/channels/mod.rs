//! Channel list rows and tag-mode grouping.

pub mod models;
pub mod tags;

pub use models::{ChannelRow, ChannelStatus, GroupSet};
pub use tags::{AggregateChannelRow, DisplayRow, MergedValue, group_by_tag};
