//! Rate tables, price resolution, and the public model catalog.

pub mod catalog;
pub mod rates;
pub mod resolver;
pub mod store;

pub use catalog::{CatalogRow, ModelEntry, PricingResponse, QuotaType};
pub use rates::{RateConfig, RateTable, RateTableKind};
pub use resolver::{
    AudioTokens, DEFAULT_GROUP_RATIO, DEFAULT_MODEL_RATIO, LineItem, PriceComponent, PriceQuery, PriceResolution, PricingDefaults,
    PricingMode, RATIO_TO_UNIT_PRICE, RateSource, resolve_price,
};
pub use store::{RateTableStore, VersionedRates};
