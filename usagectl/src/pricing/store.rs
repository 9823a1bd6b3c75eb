//! Shared, versioned rate configuration.
//!
//! Readers take a consistent snapshot without locking. Writers validate before swapping, so a
//! malformed update never replaces the last good configuration.

use crate::errors::Result;
use crate::pricing::rates::{RateConfig, RateTableKind};
use crate::pricing::resolver::{PriceQuery, PriceResolution, PricingDefaults, resolve_price};
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::{info, warn};

/// A rate configuration together with the version it was installed as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedRates {
    pub version: u64,
    pub rates: RateConfig,
}

#[derive(Debug)]
pub struct RateTableStore {
    current: ArcSwap<VersionedRates>,
    defaults: PricingDefaults,
}

impl RateTableStore {
    /// Starts at version 1. Fails if `rates` contains negative values.
    pub fn new(rates: RateConfig, defaults: PricingDefaults) -> Result<Self> {
        rates.validate()?;
        Ok(Self {
            current: ArcSwap::from_pointee(VersionedRates { version: 1, rates }),
            defaults,
        })
    }

    pub fn current(&self) -> Arc<VersionedRates> {
        self.current.load_full()
    }

    pub fn version(&self) -> u64 {
        self.current.load().version
    }

    pub fn defaults(&self) -> &PricingDefaults {
        &self.defaults
    }

    /// Install a whole new configuration. Returns the new version.
    pub fn replace(&self, rates: RateConfig) -> Result<u64> {
        if let Err(e) = rates.validate() {
            warn!(error = %e, version = self.version(), "Rejected rate configuration, keeping current");
            return Err(e);
        }
        let installed = self.current.rcu(|current| VersionedRates {
            version: current.version + 1,
            rates: rates.clone(),
        });
        let version = installed.version + 1;
        info!(version, "Installed rate configuration");
        Ok(version)
    }

    /// Parse and install a full configuration from JSON
    pub fn replace_from_json(&self, text: &str) -> Result<u64> {
        match RateConfig::from_json(text) {
            Ok(rates) => self.replace(rates),
            Err(e) => {
                warn!(error = %e, version = self.version(), "Rejected rate configuration, keeping current");
                Err(e)
            }
        }
    }

    /// Parse one table and swap it into the current configuration, leaving the others as they are
    pub fn update_table(&self, kind: RateTableKind, text: &str) -> Result<u64> {
        let table = match RateConfig::parse_table(kind, text) {
            Ok(table) => table,
            Err(e) => {
                warn!(error = %e, table = %kind, version = self.version(), "Rejected rate table, keeping current");
                return Err(e);
            }
        };

        let previous = self.current.rcu(|current| {
            let mut rates = current.rates.clone();
            *rates.table_mut(kind) = table.clone();
            VersionedRates {
                version: current.version + 1,
                rates,
            }
        });
        let version = previous.version + 1;
        info!(version, table = %kind, entries = table.len(), "Updated rate table");
        Ok(version)
    }

    /// Resolve against a single snapshot, even if an update lands concurrently
    pub fn resolve(&self, query: &PriceQuery) -> Result<PriceResolution> {
        let snapshot = self.current.load();
        resolve_price(query, &snapshot.rates, &self.defaults)
    }
}
