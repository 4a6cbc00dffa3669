/// Bidder code of the legacy query-string adapter.
pub const TARGETINGGATES_BIDDER_CODE: &str = "targetinggates";

/// Bidder code of the `OpenRTB` adapter.
pub const TG_BIDDER_CODE: &str = "tg";
pub const TG_BIDDER_ALIASES: &[&str] = &["targetinggate"];

/// Display request path on the delivery domain.
pub const DISPLAY_PATH: &str = "/w/1.0/arj";
/// Video request path on the delivery domain.
pub const VIDEO_PATH: &str = "/v/1.0/avjp";
/// Suffix identifying video wire requests when interpreting responses.
pub const VIDEO_PATH_SUFFIX: &str = "avjp";
/// Beacon path on the video colo host.
pub const BEACON_PATH: &str = "/w/1.0/bo";

/// `vos` value sent for outstream video.
pub const OUTSTREAM_VOS: &str = "101";
