//! Access to the gateway's admin API.
//!
//! Three endpoints are consumed: usage data (`/api/data/`), the public model catalog
//! (`/api/pricing`) and the channel list (`/api/channel/`). The [`Backend`] trait is the seam
//! used by the dashboards; [`http::HttpBackend`] is the reqwest implementation.

pub mod http;

use crate::analytics::{TimeGranularity, UsageRecord};
use crate::channels::ChannelRow;
use crate::errors::{Error, Result};
use crate::pricing::PricingResponse;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use http::HttpBackend;

/// The backend's common response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T: Default> ApiResponse<T> {
    /// Unwrap the payload, turning `success: false` into [`Error::Backend`]. A missing or null
    /// `data` on success is treated as empty.
    pub fn into_result(self) -> Result<T> {
        if !self.success {
            return Err(Error::backend(self.message));
        }
        Ok(self.data.unwrap_or_default())
    }
}

/// Whose usage to fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageScope {
    /// The calling user only
    Own,
    /// All users, optionally narrowed to one username (admin only)
    All { username: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageQuery {
    pub scope: UsageScope,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub granularity: TimeGranularity,
}

impl UsageQuery {
    pub(crate) fn path(&self) -> &'static str {
        match self.scope {
            UsageScope::Own => "api/data/self/",
            UsageScope::All { .. } => "api/data/",
        }
    }

    pub(crate) fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(4);
        if let UsageScope::All { username } = &self.scope {
            params.push(("username", username.clone().unwrap_or_default()));
        }
        params.push(("start_timestamp", self.start.timestamp().to_string()));
        params.push(("end_timestamp", self.end.timestamp().to_string()));
        params.push(("default_time", self.granularity.as_str().to_string()));
        params
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelQuery {
    /// Zero-based page
    pub page: u32,
    pub page_size: u32,
    pub id_sort: bool,
    pub tag_mode: bool,
}

impl Default for ChannelQuery {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: 100,
            id_sort: false,
            tag_mode: false,
        }
    }
}

impl ChannelQuery {
    pub(crate) fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("p", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
            ("id_sort", self.id_sort.to_string()),
            ("tag_mode", self.tag_mode.to_string()),
        ]
    }
}

/// Source of usage, pricing and channel data
#[async_trait]
pub trait Backend: Send + Sync {
    async fn usage(&self, query: &UsageQuery) -> Result<Vec<UsageRecord>>;

    async fn pricing(&self) -> Result<PricingResponse>;

    async fn channels(&self, query: &ChannelQuery) -> Result<Vec<ChannelRow>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_into_result() {
        let ok: ApiResponse<Vec<i64>> = serde_json::from_value(json!({"success": true, "message": "", "data": [1, 2]})).unwrap();
        assert_eq!(ok.into_result().unwrap(), vec![1, 2]);

        let null: ApiResponse<Vec<i64>> = serde_json::from_value(json!({"success": true, "data": null})).unwrap();
        assert!(null.into_result().unwrap().is_empty());

        let failed: ApiResponse<Vec<i64>> = serde_json::from_value(json!({"success": false, "message": "no permission"})).unwrap();
        let err = failed.into_result().unwrap_err();
        assert_eq!(err.user_message(), "no permission");
    }

    #[test]
    fn test_usage_query_params() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

        let own = UsageQuery {
            scope: UsageScope::Own,
            start,
            end,
            granularity: TimeGranularity::Day,
        };
        assert_eq!(own.path(), "api/data/self/");
        assert_eq!(
            own.params(),
            vec![
                ("start_timestamp", "1704067200".to_string()),
                ("end_timestamp", "1704153600".to_string()),
                ("default_time", "day".to_string()),
            ]
        );

        let admin = UsageQuery {
            scope: UsageScope::All {
                username: Some("alice".into()),
            },
            ..own
        };
        assert_eq!(admin.path(), "api/data/");
        assert_eq!(admin.params()[0], ("username", "alice".to_string()));
    }
}
