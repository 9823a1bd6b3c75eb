//! Channel rows as listed by `/api/channel/`.

use crate::colors::group_tag_color;
use crate::display::ResponseTimeBand;
use crate::types::{ChannelId, Color, Quota};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DefaultOnNull, DeserializeFromStr, SerializeDisplay, serde_as};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ChannelStatus {
    Enabled,
    ManuallyDisabled,
    AutoDisabled,
    /// Any other wire value
    Unknown(i64),
}

impl From<i64> for ChannelStatus {
    fn from(value: i64) -> Self {
        match value {
            1 => ChannelStatus::Enabled,
            2 => ChannelStatus::ManuallyDisabled,
            3 => ChannelStatus::AutoDisabled,
            other => ChannelStatus::Unknown(other),
        }
    }
}

impl From<ChannelStatus> for i64 {
    fn from(value: ChannelStatus) -> Self {
        match value {
            ChannelStatus::Enabled => 1,
            ChannelStatus::ManuallyDisabled => 2,
            ChannelStatus::AutoDisabled => 3,
            ChannelStatus::Unknown(other) => other,
        }
    }
}

impl Default for ChannelStatus {
    fn default() -> Self {
        ChannelStatus::Unknown(0)
    }
}

/// An ordered, de-duplicated set of group names, comma-joined on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, SerializeDisplay, DeserializeFromStr)]
pub struct GroupSet(Vec<String>);

impl GroupSet {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, group: &str) -> bool {
        self.0.iter().any(|g| g == group)
    }

    /// Add a group unless already present
    pub fn insert(&mut self, group: impl Into<String>) {
        let group = group.into();
        if !group.is_empty() && !self.contains(&group) {
            self.0.push(group);
        }
    }

    /// Add every group of `other` not yet present, keeping first-seen order
    pub fn union_with(&mut self, other: &GroupSet) {
        for group in other.iter() {
            self.insert(group);
        }
    }
}

impl FromStr for GroupSet {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.split(',').map(str::trim).collect())
    }
}

impl<S: Into<String>> FromIterator<S> for GroupSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = GroupSet::default();
        for group in iter {
            set.insert(group);
        }
        set
    }
}

impl fmt::Display for GroupSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

/// One configured upstream channel
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelRow {
    pub id: ChannelId,
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub name: String,
    /// Empty when the channel is untagged
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub tag: String,
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub priority: i64,
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub weight: i64,
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub group: GroupSet,
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub used_quota: Quota,
    /// Milliseconds of the last test, zero if never tested
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub response_time: i64,
    #[serde(default)]
    pub status: ChannelStatus,
    /// Fields this crate does not interpret, passed through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ChannelRow {
    pub fn is_tagged(&self) -> bool {
        !self.tag.is_empty()
    }

    pub fn response_time_band(&self) -> ResponseTimeBand {
        ResponseTimeBand::of(self.response_time as f64)
    }

    /// Each group with its badge color, in listing order
    pub fn group_badges(&self) -> Vec<(&str, Color)> {
        self.group.iter().map(|group| (group, group_tag_color(group))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_group_set_parsing() {
        let set: GroupSet = "default, vip,default,,svip".parse().unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["default", "vip", "svip"]);
        assert_eq!(set.to_string(), "default,vip,svip");
        assert!("".parse::<GroupSet>().unwrap().is_empty());
    }

    #[test]
    fn test_group_set_union_keeps_first_seen_order() {
        let mut a: GroupSet = "vip,default".parse().unwrap();
        let b: GroupSet = "default,pro,vip,free".parse().unwrap();
        a.union_with(&b);
        assert_eq!(a.to_string(), "vip,default,pro,free");
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn test_group_set_membership_is_exact() {
        // "vip" must not match inside "svip"
        let set: GroupSet = "svip".parse().unwrap();
        assert!(!set.contains("vip"));
    }

    #[test]
    fn test_channel_row_decoding() {
        let row: ChannelRow = serde_json::from_value(json!({
            "id": 7,
            "name": "azure-east",
            "tag": null,
            "priority": 10,
            "weight": null,
            "group": "default,vip",
            "used_quota": 123456,
            "response_time": 850,
            "status": 3,
            "models": "gpt-4,gpt-4o",
            "type": 3
        }))
        .unwrap();

        assert_eq!(row.id, 7);
        assert!(!row.is_tagged());
        assert_eq!(row.weight, 0);
        assert!(row.group.contains("vip"));
        assert_eq!(row.status, ChannelStatus::AutoDisabled);
        assert_eq!(row.extra.get("models"), Some(&json!("gpt-4,gpt-4o")));

        let back = serde_json::to_value(&row).unwrap();
        assert_eq!(back["group"], json!("default,vip"));
        assert_eq!(back["status"], json!(3));
        assert_eq!(back["type"], json!(3));
    }

    #[test]
    fn test_badges() {
        let row = ChannelRow {
            group: "vip,default".parse().unwrap(),
            response_time: 2500,
            ..ChannelRow::default()
        };
        assert_eq!(row.response_time_band(), ResponseTimeBand::Moderate);
        assert_eq!(row.group_badges(), vec![("vip", "yellow"), ("default", "light-blue")]);
    }

    #[test]
    fn test_unknown_status_round_trips() {
        let status: ChannelStatus = serde_json::from_value(json!(9)).unwrap();
        assert_eq!(status, ChannelStatus::Unknown(9));
        assert_eq!(serde_json::to_value(status).unwrap(), json!(9));
    }
}
