//! Rate tables: per-model prices and multipliers, per-group multipliers.
//!
//! Tables arrive as JSON objects mapping a name to a number, one object per option key
//! (`ModelPrice`, `ModelRatio`, ...). A table is validated as a whole before it is used: any
//! non-object payload, non-numeric value or negative value rejects the entire table.

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A named table of non-negative decimals
pub type RateTable = BTreeMap<String, Decimal>;

/// Identifies one rate table. Displays as the backend option key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateTableKind {
    /// Fixed per-call price, wins over every ratio
    ModelPrice,
    ModelRatio,
    CompletionRatio,
    AudioRatio,
    AudioCompletionRatio,
    GroupRatio,
}

impl RateTableKind {
    pub const ALL: [RateTableKind; 6] = [
        RateTableKind::ModelPrice,
        RateTableKind::ModelRatio,
        RateTableKind::CompletionRatio,
        RateTableKind::AudioRatio,
        RateTableKind::AudioCompletionRatio,
        RateTableKind::GroupRatio,
    ];

    /// Backend option key
    pub fn key(self) -> &'static str {
        match self {
            RateTableKind::ModelPrice => "ModelPrice",
            RateTableKind::ModelRatio => "ModelRatio",
            RateTableKind::CompletionRatio => "CompletionRatio",
            RateTableKind::AudioRatio => "AudioRatio",
            RateTableKind::AudioCompletionRatio => "AudioCompletionRatio",
            RateTableKind::GroupRatio => "GroupRatio",
        }
    }

    /// Field name in a serialized [`RateConfig`]
    pub fn field(self) -> &'static str {
        match self {
            RateTableKind::ModelPrice => "fixed_price",
            RateTableKind::ModelRatio => "model_ratio",
            RateTableKind::CompletionRatio => "completion_ratio",
            RateTableKind::AudioRatio => "audio_ratio",
            RateTableKind::AudioCompletionRatio => "audio_completion_ratio",
            RateTableKind::GroupRatio => "group_ratio",
        }
    }

    /// Accepts either the option key or the field name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == name || kind.field() == name)
    }
}

impl fmt::Display for RateTableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for RateTableKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown rate table '{s}'"))
    }
}

/// Complete pricing configuration. Only ever constructed from validated tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RateConfig {
    pub fixed_price: RateTable,
    pub model_ratio: RateTable,
    pub completion_ratio: RateTable,
    pub audio_ratio: RateTable,
    pub audio_completion_ratio: RateTable,
    pub group_ratio: RateTable,
}

impl RateConfig {
    /// Parse a full configuration: a JSON object whose keys are table names (option keys or
    /// field names) and whose values are table objects. Missing tables are empty.
    pub fn from_json(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text).map_err(|e| Error::InvalidRateConfig { reason: e.to_string() })?;
        let Value::Object(tables) = root else {
            return Err(Error::InvalidRateConfig {
                reason: "expected a JSON object of tables".to_string(),
            });
        };

        let mut config = RateConfig::default();
        for (name, value) in tables {
            let kind = RateTableKind::from_name(&name).ok_or_else(|| Error::InvalidRateConfig {
                reason: format!("unknown rate table '{name}'"),
            })?;
            *config.table_mut(kind) = table_from_value(kind, value)?;
        }
        Ok(config)
    }

    /// Parse and validate a single table from its JSON text
    pub fn parse_table(kind: RateTableKind, text: &str) -> Result<RateTable> {
        let value: Value = serde_json::from_str(text).map_err(|e| invalid(kind, e.to_string()))?;
        table_from_value(kind, value)
    }

    pub fn table(&self, kind: RateTableKind) -> &RateTable {
        match kind {
            RateTableKind::ModelPrice => &self.fixed_price,
            RateTableKind::ModelRatio => &self.model_ratio,
            RateTableKind::CompletionRatio => &self.completion_ratio,
            RateTableKind::AudioRatio => &self.audio_ratio,
            RateTableKind::AudioCompletionRatio => &self.audio_completion_ratio,
            RateTableKind::GroupRatio => &self.group_ratio,
        }
    }

    pub fn table_mut(&mut self, kind: RateTableKind) -> &mut RateTable {
        match kind {
            RateTableKind::ModelPrice => &mut self.fixed_price,
            RateTableKind::ModelRatio => &mut self.model_ratio,
            RateTableKind::CompletionRatio => &mut self.completion_ratio,
            RateTableKind::AudioRatio => &mut self.audio_ratio,
            RateTableKind::AudioCompletionRatio => &mut self.audio_completion_ratio,
            RateTableKind::GroupRatio => &mut self.group_ratio,
        }
    }

    /// Multiplier configured for a user group, if any
    pub fn group_ratio(&self, group: &str) -> Option<Decimal> {
        self.group_ratio.get(group).copied()
    }

    /// Check every table. Used for configs assembled in code rather than parsed.
    pub fn validate(&self) -> Result<()> {
        for kind in RateTableKind::ALL {
            if let Some((name, value)) = self.table(kind).iter().find(|(_, value)| value.is_sign_negative() && !value.is_zero()) {
                return Err(invalid(kind, format!("'{name}' has negative value {value}")));
            }
        }
        Ok(())
    }
}

fn invalid(kind: RateTableKind, reason: impl Into<String>) -> Error {
    Error::InvalidRateTable {
        table: kind,
        reason: reason.into(),
    }
}

fn table_from_value(kind: RateTableKind, value: Value) -> Result<RateTable> {
    let Value::Object(entries) = value else {
        return Err(invalid(kind, "expected an object mapping names to numbers"));
    };
    table_from_map(kind, entries)
}

fn table_from_map(kind: RateTableKind, entries: Map<String, Value>) -> Result<RateTable> {
    let mut table = RateTable::new();
    for (name, value) in entries {
        let Value::Number(number) = &value else {
            return Err(invalid(kind, format!("'{name}' is not a number: {value}")));
        };
        let rate = decimal_from_number(number).ok_or_else(|| invalid(kind, format!("'{name}' is out of range: {number}")))?;
        if rate.is_sign_negative() && !rate.is_zero() {
            return Err(invalid(kind, format!("'{name}' has negative value {rate}")));
        }
        table.insert(name, rate);
    }
    Ok(table)
}

fn decimal_from_number(number: &Number) -> Option<Decimal> {
    if let Some(i) = number.as_i64() {
        return Some(Decimal::from(i));
    }
    if let Some(u) = number.as_u64() {
        return Some(Decimal::from(u));
    }
    let text = number.to_string();
    Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text)).ok()
}
