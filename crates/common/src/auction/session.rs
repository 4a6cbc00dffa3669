//! Per-page auction session state.
//!
//! A session is created when a page load starts its auction, is passed by
//! mutable reference into response interpretation, and is reset (or dropped)
//! when the page goes away. It owns the outcome-beacon latch and the user-sync
//! registrations the beacon produces.

use super::types::{BidderRequest, SyncType};

/// Latch guaranteeing at most one outcome beacon per session.
#[derive(Debug, Clone, Default)]
pub struct BeaconLatch {
    fired: bool,
}

impl BeaconLatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` exactly once until the latch is reset.
    pub fn try_consume(&mut self) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;
        true
    }

    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn reset(&mut self) {
        self.fired = false;
    }
}

/// A sync registered with the host's user-sync subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredSync {
    pub sync_type: SyncType,
    pub bidder: String,
    pub url: String,
}

/// Host user-sync subsystem.
pub trait UserSyncRegistrar {
    fn register_sync(&mut self, sync_type: SyncType, bidder: &str, url: &str);
}

/// Auction state scoped to one page load.
#[derive(Debug, Clone)]
pub struct AuctionSession {
    beacon: BeaconLatch,
    page_hostname: String,
    bidder_timeout_ms: u32,
    page_timeout_ms: Option<u32>,
    registered: Vec<RegisteredSync>,
}

impl AuctionSession {
    /// Start a session for the page at `page_hostname`.
    ///
    /// `bidder_timeout_ms` is the host's configured bidder timeout.
    pub fn new(page_hostname: impl Into<String>, bidder_timeout_ms: u32) -> Self {
        Self {
            beacon: BeaconLatch::new(),
            page_hostname: page_hostname.into(),
            bidder_timeout_ms,
            page_timeout_ms: None,
            registered: Vec::new(),
        }
    }

    /// Start a session from the auction context the host hands the adapters.
    ///
    /// The hostname comes from the page URL and the auction's global timeout,
    /// when set, caps `bidder_timeout_ms`.
    #[must_use]
    pub fn from_bidder_request(bidder_request: &BidderRequest, bidder_timeout_ms: u32) -> Self {
        let session = Self::new(bidder_request.page.hostname(), bidder_timeout_ms);
        match bidder_request.timeout_ms {
            Some(timeout_ms) => session.with_page_timeout(timeout_ms),
            None => session,
        }
    }

    /// Apply a page-level Prebid timeout, which caps the bidder timeout.
    #[must_use]
    pub fn with_page_timeout(mut self, page_timeout_ms: u32) -> Self {
        self.page_timeout_ms = Some(page_timeout_ms);
        self
    }

    #[must_use]
    pub fn page_hostname(&self) -> &str {
        &self.page_hostname
    }

    /// Timeout budget reported on beacons.
    #[must_use]
    pub fn timeout_budget_ms(&self) -> u32 {
        match self.page_timeout_ms {
            Some(page) => page.min(self.bidder_timeout_ms),
            None => self.bidder_timeout_ms,
        }
    }

    /// Claim the right to fire this session's beacon.
    pub fn try_consume_beacon(&mut self) -> bool {
        self.beacon.try_consume()
    }

    #[must_use]
    pub fn beacon_fired(&self) -> bool {
        self.beacon.has_fired()
    }

    #[must_use]
    pub fn registered_syncs(&self) -> &[RegisteredSync] {
        &self.registered
    }

    /// Hand the registered syncs to the host, leaving the session empty.
    pub fn take_registered_syncs(&mut self) -> Vec<RegisteredSync> {
        std::mem::take(&mut self.registered)
    }

    /// Start over for a new page load.
    pub fn reset(&mut self) {
        log::debug!("Resetting auction session for {}", self.page_hostname);
        self.beacon.reset();
        self.registered.clear();
    }
}

impl UserSyncRegistrar for AuctionSession {
    fn register_sync(&mut self, sync_type: SyncType, bidder: &str, url: &str) {
        self.registered.push(RegisteredSync {
            sync_type,
            bidder: bidder.to_string(),
            url: url.to_string(),
        });
    }
}
