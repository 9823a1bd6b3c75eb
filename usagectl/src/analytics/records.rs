//! Raw usage records as returned by the backend's `/api/data` endpoints.
//!
//! The payload is consumed as-is and may be sparse or malformed. Every numeric field decodes
//! leniently: integers, floats (truncated toward zero) and integer strings are accepted, anything
//! else becomes `None` rather than failing the whole response. Whether a `None` drops the record or counts as zero is decided by
//! the aggregator, not here.

use crate::types::Quota;
use bon::Builder;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{DefaultOnError, DeserializeAs, DisplayFromStr, PickFirst, SerializeAs, serde_as};

/// One logged billing event (or a backend pre-aggregated row)
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct UsageRecord {
    /// Unix seconds
    #[serde(default)]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, TruncatedFloat, DisplayFromStr)>>>")]
    pub created_at: Option<i64>,
    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    #[builder(into, default)]
    pub model_name: String,
    #[serde(default)]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, TruncatedFloat, DisplayFromStr)>>>")]
    pub quota: Option<Quota>,
    #[serde(default)]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, TruncatedFloat, DisplayFromStr)>>>")]
    pub token_used: Option<i64>,
    #[serde(default)]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, TruncatedFloat, DisplayFromStr)>>>")]
    pub count: Option<i64>,
}

/// Reads a JSON float into an `i64`, truncating toward zero. NaN, infinities and values outside
/// the `i64` range are rejected.
pub struct TruncatedFloat;

impl<'de> DeserializeAs<'de, i64> for TruncatedFloat {
    fn deserialize_as<D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let value = f64::deserialize(deserializer)?;
        // i64::MAX as f64 rounds up to 2^63, which is already out of range
        if value.is_finite() && value >= i64::MIN as f64 && value < i64::MAX as f64 {
            Ok(value.trunc() as i64)
        } else {
            Err(serde::de::Error::custom(format!("{value} is not representable as an integer")))
        }
    }
}

impl SerializeAs<i64> for TruncatedFloat {
    fn serialize_as<S: Serializer>(source: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(*source)
    }
}

impl UsageRecord {
    /// Quota, with malformed or missing values counted as zero
    pub fn quota_or_zero(&self) -> Quota {
        self.quota.unwrap_or(0)
    }

    pub fn tokens_or_zero(&self) -> i64 {
        self.token_used.unwrap_or(0)
    }

    pub fn count_or_zero(&self) -> i64 {
        self.count.unwrap_or(0)
    }
}
