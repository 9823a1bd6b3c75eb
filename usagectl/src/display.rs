//! Display-boundary formatting: quota to currency, compact numbers, and coarse bands used to pick
//! badge colors for response times and ratios.
//!
//! Quota is only ever converted here. The aggregation and pricing modules keep raw integers and
//! decimals so callers can re-render with different settings.

use crate::types::Quota;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Default number of quota units per one currency unit
pub const DEFAULT_QUOTA_PER_UNIT: Decimal = Decimal::from_parts(500_000, 0, 0, false, 0);

/// How quota values are turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuotaDisplay {
    /// Quota units per currency unit
    pub quota_per_unit: Decimal,
    /// Render as `$x.yy` instead of a compact raw number
    pub display_in_currency: bool,
}

impl Default for QuotaDisplay {
    fn default() -> Self {
        Self {
            quota_per_unit: DEFAULT_QUOTA_PER_UNIT,
            display_in_currency: true,
        }
    }
}

impl QuotaDisplay {
    /// Quota expressed in currency units, rounded to `digits` places
    pub fn quota_with_unit(&self, quota: Quota, digits: u32) -> Decimal {
        if self.quota_per_unit.is_zero() {
            return Decimal::ZERO;
        }
        (Decimal::from(quota) / self.quota_per_unit).round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero)
    }

    /// [`Self::quota_with_unit`] padded to exactly `digits` places
    pub fn format_with_unit(&self, quota: Quota, digits: u32) -> String {
        fixed(self.quota_with_unit(quota, digits), digits)
    }

    /// `$1.23` in currency mode, otherwise the compact raw quota (`12.3k`)
    pub fn render_quota(&self, quota: Quota, digits: u32) -> String {
        if self.display_in_currency {
            format!("${}", self.format_with_unit(quota, digits))
        } else {
            render_number(quota)
        }
    }
}

/// Format a decimal with exactly `digits` fractional digits
pub fn fixed(value: Decimal, digits: u32) -> String {
    let rounded = value.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", digits as usize, rounded)
}

/// Compact rendering: `1.2B`, `3.4M`, `12.3k`, or the plain number below ten thousand
pub fn render_number(n: i64) -> String {
    let scaled = |divisor: i64, suffix: &str| format!("{}{suffix}", fixed(Decimal::from(n) / Decimal::from(divisor), 1));
    match n {
        n if n >= 1_000_000_000 => scaled(1_000_000_000, "B"),
        n if n >= 1_000_000 => scaled(1_000_000, "M"),
        n if n >= 10_000 => scaled(1_000, "k"),
        n => n.to_string(),
    }
}

/// Latency band of a channel's last measured response time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseTimeBand {
    /// Never tested (a response time of exactly zero)
    Untested,
    Fast,
    Moderate,
    Slow,
    VerySlow,
}

impl ResponseTimeBand {
    pub fn of(response_time_ms: f64) -> Self {
        match response_time_ms {
            ms if ms == 0.0 => Self::Untested,
            ms if ms <= 1000.0 => Self::Fast,
            ms if ms <= 3000.0 => Self::Moderate,
            ms if ms <= 5000.0 => Self::Slow,
            _ => Self::VerySlow,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Untested => "grey",
            Self::Fast => "green",
            Self::Moderate => "lime",
            Self::Slow => "yellow",
            Self::VerySlow => "red",
        }
    }
}

/// `1.23 s` for a millisecond response time
pub fn render_response_time(response_time_ms: f64) -> String {
    format!("{:.2} s", response_time_ms / 1000.0)
}

/// Badge color for a group or model multiplier: cheap is green, expensive is red
pub fn ratio_color(ratio: Decimal) -> &'static str {
    match ratio.to_f64().unwrap_or_default() {
        r if r > 5.0 => "red",
        r if r > 3.0 => "orange",
        r if r > 1.0 => "blue",
        _ => "green",
    }
}
