//! Trait definition for bid adapters.

use error_stack::Report;

use crate::error::AdapterError;

use super::session::AuctionSession;
use super::types::{
    BidRequest, BidResponse, BidderRequest, MediaType, ServerRequest, ServerResponse, SyncOptions,
    UserSync,
};

/// Trait implemented by every exchange adapter (`targetinggates`, `tg`).
///
/// Adapters are stateless. The host drives them through one auction round:
/// filter with [`BidAdapter::is_bid_request_valid`], build wire requests, send
/// them, then hand each reply to [`BidAdapter::interpret_response`].
pub trait BidAdapter: Send + Sync {
    /// Bidder code the host registers this adapter under.
    fn code(&self) -> &'static str;

    /// Alternative bidder codes resolving to this adapter.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    fn supported_media_types(&self) -> &'static [MediaType];

    /// Check if this adapter supports a specific media type.
    fn supports_media_type(&self, media_type: MediaType) -> bool {
        self.supported_media_types().contains(&media_type)
    }

    /// Whether `bid` carries every parameter the exchange requires.
    fn is_bid_request_valid(&self, bid: &BidRequest) -> bool;

    /// Translate validated bid requests into outbound wire requests.
    ///
    /// Every bid in `bids` is carried by exactly one returned request.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidBidParams`] when a bid that should have
    /// been filtered out is missing required parameters, or
    /// [`AdapterError::RequestBuild`] when a body cannot be encoded.
    fn build_requests(
        &self,
        bids: &[BidRequest],
        bidder_request: &BidderRequest,
    ) -> Result<Vec<ServerRequest>, Report<AdapterError>>;

    /// Turn an exchange reply into bid results.
    ///
    /// Malformed replies are logged and yield no bids; nothing is raised to the host.
    fn interpret_response(
        &self,
        response: &ServerResponse,
        request: &ServerRequest,
        session: &mut AuctionSession,
    ) -> Vec<BidResponse>;

    /// User syncs the host should load after the auction.
    fn user_syncs(&self, options: &SyncOptions, responses: &[ServerResponse]) -> Vec<UserSync>;
}
