use std::collections::HashMap;
use std::sync::Arc;

use error_stack::Report;

use crate::error::AdapterError;

use super::provider::BidAdapter;

/// Bid adapters available to the host, keyed by bidder code.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<&'static str, Arc<dyn BidAdapter>>,
    aliases: HashMap<&'static str, &'static str>,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bid adapter and its aliases.
    pub fn register_adapter(&mut self, adapter: Arc<dyn BidAdapter>) {
        let code = adapter.code();
        log::info!("Registering bid adapter: {}", code);
        for alias in adapter.aliases() {
            log::debug!("Bid adapter {} answers to alias {}", code, alias);
            self.aliases.insert(*alias, code);
        }
        self.adapters.insert(code, adapter);
    }

    /// Look up an adapter by bidder code or alias.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<Arc<dyn BidAdapter>> {
        let code = self.aliases.get(code).copied().unwrap_or(code);
        self.adapters.get(code).cloned()
    }

    /// Look up an adapter that the host expects to be registered.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if no adapter answers to `code`.
    pub fn require(&self, code: &str) -> Result<Arc<dyn BidAdapter>, Report<AdapterError>> {
        self.get(code).ok_or_else(|| {
            log::warn!(
                "Bidder '{}' requested but not registered. Available bidders: {:?}",
                code,
                self.codes()
            );
            Report::new(AdapterError::Configuration {
                message: format!("Bidder '{code}' not registered"),
            })
        })
    }

    /// Registered bidder codes, sorted.
    #[must_use]
    pub fn codes(&self) -> Vec<&'static str> {
        let mut codes: Vec<_> = self.adapters.keys().copied().collect();
        codes.sort_unstable();
        codes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
