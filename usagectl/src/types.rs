//! Common type definitions shared by the aggregation, pricing and channel modules.
//!
//! - [`Quota`]: the gateway's internal monetary unit, always an integer
//! - [`ChannelId`]: backend identifier of a channel row
//! - [`Color`]: a CSS color string taken from one of the static palettes

/// Smallest monetary unit used by the gateway. Converted to currency only for display.
pub type Quota = i64;

/// Backend channel identifier
pub type ChannelId = i64;

/// A display color (`#RRGGBB`, `rgb(...)` or a named tag color)
pub type Color = &'static str;

/// Placeholder label used when a query returns no usable rows
pub const NO_DATA_LABEL: &str = "no data";
