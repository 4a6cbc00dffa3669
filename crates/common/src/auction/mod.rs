//! Bid adapter framework shared by the exchange integrations.
//!
//! The host scheduler owns the auction round. This module defines what it
//! exchanges with adapters (bid requests, wire requests, bid results), the
//! per-page [`AuctionSession`], and the registry adapters are discovered into.
//!
//! Note: the adapters themselves live in the `integrations` module
//! (`crate::integrations::targetinggates`, `crate::integrations::tg`).

use crate::settings::Settings;
use std::sync::Arc;

pub mod context;
pub mod provider;
pub mod registry;
pub mod session;
pub mod types;

pub use context::QueryParams;
pub use provider::BidAdapter;
pub use registry::AdapterRegistry;
pub use session::{AuctionSession, BeaconLatch, RegisteredSync, UserSyncRegistrar};
pub use types::{
    AdSize, BidRequest, BidResponse, BidderRequest, MediaType, ServerRequest, ServerResponse,
    SyncOptions, SyncType, UserSync,
};

/// Type alias for adapter builder functions.
type AdapterBuilder = fn(&Settings) -> Vec<Arc<dyn BidAdapter>>;

/// Returns the list of all available adapter builder functions.
///
/// Each builder checks the settings for its adapter's configuration and
/// returns the adapter when it is enabled.
fn adapter_builders() -> &'static [AdapterBuilder] {
    &[
        crate::integrations::targetinggates::register_adapter,
        crate::integrations::tg::register_adapter,
    ]
}

/// Build the adapter registry for the current settings.
///
/// Callers can reuse the returned [`AdapterRegistry`] across auctions.
#[must_use]
pub fn build_registry(settings: &Settings) -> AdapterRegistry {
    log::info!("Building bid adapter registry");

    let mut registry = AdapterRegistry::new();
    for builder in adapter_builders() {
        for adapter in builder(settings) {
            registry.register_adapter(adapter);
        }
    }

    log::info!("Bid adapter registry built with {} adapters", registry.len());

    registry
}
