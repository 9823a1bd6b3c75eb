//! Tag mode for the channel list: channels sharing a tag collapse into one expandable parent row.
//!
//! The parent is rebuilt from scratch on every pass and owns its members as `children`. Its
//! scalar fields are folded member by member in input order:
//!
//! | field           | rule                                                               |
//! |-----------------|--------------------------------------------------------------------|
//! | `priority`      | first member's value; [`MergedValue::Mixed`] once any member differs |
//! | `weight`        | same as `priority`                                                 |
//! | `group`         | union of member groups, first-seen order                           |
//! | `used_quota`    | sum                                                                |
//! | `response_time` | `(running + member) / 2`, seeded at zero                           |
//! | `status`        | enabled if any member is; else the common status, else unknown     |
//!
//! The response-time rule is a pairwise running average, not a mean. It depends on member order
//! and is kept that way because the console displays exactly this number.

use crate::channels::models::{ChannelRow, ChannelStatus, GroupSet};
use crate::types::Quota;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// A scalar merged across several rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergedValue {
    /// No member folded yet
    #[default]
    Unset,
    /// Members disagree
    Mixed,
    Value(i64),
}

impl MergedValue {
    pub fn merge(self, value: i64) -> Self {
        match self {
            MergedValue::Unset => MergedValue::Value(value),
            MergedValue::Value(current) if current == value => self,
            MergedValue::Value(_) | MergedValue::Mixed => MergedValue::Mixed,
        }
    }

    pub fn value(self) -> Option<i64> {
        match self {
            MergedValue::Value(value) => Some(value),
            _ => None,
        }
    }
}

/// `null` while unset, `"mixed"` when members disagree, the number otherwise
impl Serialize for MergedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MergedValue::Unset => serializer.serialize_none(),
            MergedValue::Mixed => serializer.serialize_str("mixed"),
            MergedValue::Value(value) => serializer.serialize_i64(*value),
        }
    }
}

/// Synthetic parent row for one tag
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateChannelRow {
    pub tag: String,
    pub name: String,
    pub priority: MergedValue,
    pub weight: MergedValue,
    pub group: GroupSet,
    pub used_quota: Quota,
    pub response_time: f64,
    pub status: ChannelStatus,
    pub children: Vec<ChannelRow>,
}

impl AggregateChannelRow {
    fn new(tag: String) -> Self {
        Self {
            name: format!("Tag: {tag}"),
            tag,
            priority: MergedValue::Unset,
            weight: MergedValue::Unset,
            group: GroupSet::default(),
            used_quota: 0,
            response_time: 0.0,
            status: ChannelStatus::default(),
            children: Vec::new(),
        }
    }

    fn fold(&mut self, row: ChannelRow) {
        self.priority = self.priority.merge(row.priority);
        self.weight = self.weight.merge(row.weight);
        self.group.union_with(&row.group);
        self.used_quota = self.used_quota.saturating_add(row.used_quota);
        self.response_time = (self.response_time + row.response_time as f64) / 2.0;
        self.status = match (self.children.is_empty(), self.status, row.status) {
            (true, _, status) => status,
            (false, ChannelStatus::Enabled, _) | (false, _, ChannelStatus::Enabled) => ChannelStatus::Enabled,
            (false, current, status) if current == status => current,
            (false, _, _) => ChannelStatus::Unknown(0),
        };
        self.children.push(row);
    }
}

/// A row of the channel table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DisplayRow {
    Channel(ChannelRow),
    Tag(AggregateChannelRow),
}

/// Collapse rows sharing a non-empty tag into one parent each. Untagged rows stay where they are;
/// a parent takes the position of its first member. With `tag_mode` off the rows pass through.
#[instrument(skip(rows), fields(rows = rows.len()))]
pub fn group_by_tag(rows: Vec<ChannelRow>, tag_mode: bool) -> Vec<DisplayRow> {
    if !tag_mode {
        return rows.into_iter().map(DisplayRow::Channel).collect();
    }

    let mut table: Vec<DisplayRow> = Vec::with_capacity(rows.len());
    let mut parents: HashMap<String, usize> = HashMap::new();

    for row in rows {
        if !row.is_tagged() {
            table.push(DisplayRow::Channel(row));
            continue;
        }

        let index = *parents.entry(row.tag.clone()).or_insert_with(|| {
            table.push(DisplayRow::Tag(AggregateChannelRow::new(row.tag.clone())));
            table.len() - 1
        });
        if let DisplayRow::Tag(parent) = &mut table[index] {
            parent.fold(row);
        }
    }

    debug!(tags = parents.len(), rows = table.len(), "Grouped channels by tag");
    table
}
