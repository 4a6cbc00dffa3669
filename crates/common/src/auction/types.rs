//! Core types exchanged with the host bidding runtime.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt};
use http::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as Json;

use crate::error::AdapterError;

use super::context::QueryParams;

/// Media type enumeration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum MediaType {
    #[default]
    Banner,
    Video,
    Native,
    NativeVideo,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaType::Banner => "banner",
            MediaType::Video => "video",
            MediaType::Native => "native",
            MediaType::NativeVideo => "nativeVideo",
        };
        f.write_str(name)
    }
}

/// Creative size, serialized as `[width, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct AdSize {
    pub width: u32,
    pub height: u32,
}

impl AdSize {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for AdSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<[u32; 2]> for AdSize {
    fn from([width, height]: [u32; 2]) -> Self {
        Self { width, height }
    }
}

impl From<AdSize> for [u32; 2] {
    fn from(size: AdSize) -> Self {
        [size.width, size.height]
    }
}

/// Accept either a single `[w, h]` pair or a list of pairs.
fn sizes_from_flat_or_nested<'de, D>(deserializer: D) -> Result<Vec<AdSize>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizesInput {
        Flat([u32; 2]),
        Nested(Vec<[u32; 2]>),
    }

    Ok(match Option::<SizesInput>::deserialize(deserializer)? {
        Some(SizesInput::Flat(size)) => vec![size.into()],
        Some(SizesInput::Nested(sizes)) => sizes.into_iter().map(AdSize::from).collect(),
        None => Vec::new(),
    })
}

/// Deserialize an identifier that may arrive as a JSON string or number.
///
/// `null` and a missing field both map to `None`.
pub(crate) fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct IdVisitor;

    impl<'de> Visitor<'de> for IdVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(format_number(value)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_any(IdVisitor)
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

/// Deserialize `null` as the type's default instead of failing.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Format a number the way a browser stringifies it (`1500`, not `1500.0`).
pub(crate) fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Stringify a JSON parameter value for a query string.
///
/// Arrays are joined with commas, objects are JSON-encoded, `null` is empty.
pub(crate) fn json_to_param(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        Json::Number(n) if n.is_f64() => n.as_f64().map(format_number).unwrap_or_default(),
        Json::Number(n) => n.to_string(),
        Json::Bool(b) => b.to_string(),
        Json::Array(items) => items
            .iter()
            .map(json_to_param)
            .collect::<Vec<_>>()
            .join(","),
        Json::Object(_) => value.to_string(),
        Json::Null => String::new(),
    }
}

/// Per-slot media type configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaTypes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<BannerMediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoMediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native: Option<Json>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerMediaType {
    #[serde(default, deserialize_with = "sizes_from_flat_or_nested")]
    pub sizes: Vec<AdSize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMediaType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<VideoContext>,
    #[serde(default, deserialize_with = "sizes_from_flat_or_nested")]
    pub player_size: Vec<AdSize>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VideoContext {
    Instream,
    Outstream,
    #[serde(other)]
    Other,
}

/// Requirements for one native asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NativeAssetParams {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub len: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wmin: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmin: Option<u32>,
}

/// Native assets requested by an ad slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<NativeAssetParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<NativeAssetParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsored_by: Option<NativeAssetParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<NativeAssetParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<NativeAssetParams>,
}

/// One ad slot's parameters submitted to an exchange for pricing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRequest {
    pub bid_id: String,
    #[serde(default)]
    pub bidder_request_id: String,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub ad_unit_code: String,
    #[serde(default, deserialize_with = "sizes_from_flat_or_nested")]
    pub sizes: Vec<AdSize>,
    /// Legacy single media type tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default)]
    pub media_types: MediaTypes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_params: Option<NativeParams>,
    /// Exchange-specific parameters, decoded by each adapter.
    #[serde(default)]
    pub params: Json,
}

impl BidRequest {
    /// Video and native-video slots are requested one at a time.
    #[must_use]
    pub fn is_video(&self) -> bool {
        self.media_types.video.is_some()
            || matches!(
                self.media_type,
                Some(MediaType::Video | MediaType::NativeVideo)
            )
    }

    #[must_use]
    pub fn is_native(&self) -> bool {
        self.native_params.is_some()
            || self.media_types.native.is_some()
            || self.media_type == Some(MediaType::Native)
    }

    #[must_use]
    pub fn is_native_video(&self) -> bool {
        self.media_type == Some(MediaType::NativeVideo)
    }

    /// Slot sizes, falling back to the banner media type sizes.
    #[must_use]
    pub fn effective_sizes(&self) -> &[AdSize] {
        if !self.sizes.is_empty() {
            return &self.sizes;
        }
        self.media_types
            .banner
            .as_ref()
            .map_or(&[][..], |banner| banner.sizes.as_slice())
    }

    /// Video player size, if the slot declares one.
    #[must_use]
    pub fn player_size(&self) -> Option<AdSize> {
        self.media_types
            .video
            .as_ref()
            .and_then(|video| video.player_size.first().copied())
    }

    #[must_use]
    pub fn video_context(&self) -> Option<VideoContext> {
        self.media_types.video.as_ref().and_then(|video| video.context)
    }

    /// Decode the exchange-specific parameters into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidBidParams`] if the parameters do not match `T`.
    pub fn decode_params<T: DeserializeOwned>(
        &self,
        bidder: &str,
    ) -> Result<T, Report<AdapterError>> {
        serde_json::from_value(self.params.clone()).change_context(
            AdapterError::InvalidBidParams {
                bidder: bidder.to_string(),
                message: format!("bid {} has malformed params", self.bid_id),
            },
        )
    }
}

/// Consent information the host's consent module resolved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GdprConsent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gdpr_applies: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_string: Option<String>,
}

/// Page-level information for the current auction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    /// Top window URL as seen by the host.
    pub url: String,
    #[serde(default)]
    pub referrer: String,
    /// Publisher-configured page URL, which wins over `url` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configured_url: Option<String>,
}

impl PageContext {
    #[must_use]
    pub fn effective_url(&self) -> &str {
        self.configured_url.as_deref().unwrap_or(&self.url)
    }

    /// Hostname of the top window URL, empty when it cannot be parsed.
    #[must_use]
    pub fn hostname(&self) -> String {
        crate::http_util::parse_url_lenient(&self.url)
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenInfo {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub color_depth: u32,
}

/// Browser snapshot collected by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceContext {
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub screen: ScreenInfo,
    /// Viewport of the top window, when it is reachable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<AdSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub do_not_track: bool,
    #[serde(default = "default_charset")]
    pub charset: String,
    #[serde(default)]
    pub in_iframe: bool,
    /// `Date#getTimezoneOffset` of the browser, in minutes.
    #[serde(default)]
    pub timezone_offset_minutes: i32,
}

fn default_charset() -> String {
    "UTF-8".to_string()
}

impl Default for DeviceContext {
    fn default() -> Self {
        Self {
            user_agent: String::new(),
            screen: ScreenInfo::default(),
            viewport: None,
            language: None,
            do_not_track: false,
            charset: default_charset(),
            in_iframe: false,
            timezone_offset_minutes: 0,
        }
    }
}

/// Auction-wide context passed alongside the bid requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidderRequest {
    #[serde(default)]
    pub bidder_request_id: String,
    #[serde(default)]
    pub page: PageContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gdpr_consent: Option<GdprConsent>,
    /// Global auction timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u32>,
    #[serde(default)]
    pub device: DeviceContext,
}

/// Body of an outbound request.
#[derive(Debug, Clone)]
pub enum RequestData {
    /// Query parameters appended to the URL of a GET.
    Query(QueryParams),
    /// JSON-encoded POST body.
    Json(String),
}

/// Adapter state carried from request building to response interpretation.
#[derive(Debug, Clone)]
pub struct RequestPayload {
    /// Bids carried by the request, in wire order.
    pub bids: Vec<BidRequest>,
    pub start_time: DateTime<Utc>,
}

/// An outbound wire request the host sends on the adapter's behalf.
#[derive(Debug, Clone)]
pub struct ServerRequest {
    pub method: Method,
    pub url: String,
    pub data: RequestData,
    pub payload: RequestPayload,
}

impl ServerRequest {
    /// URL with GET parameters appended; POST requests keep their URL.
    #[must_use]
    pub fn url_with_query(&self) -> String {
        match &self.data {
            RequestData::Query(params) => {
                crate::http_util::append_query_params(&self.url, &params.to_query_string())
            }
            RequestData::Json(_) => self.url.clone(),
        }
    }

    #[must_use]
    pub fn query(&self) -> Option<&QueryParams> {
        match &self.data {
            RequestData::Query(params) => Some(params),
            RequestData::Json(_) => None,
        }
    }

    #[must_use]
    pub fn json_body(&self) -> Option<&str> {
        match &self.data {
            RequestData::Json(body) => Some(body),
            RequestData::Query(_) => None,
        }
    }
}

/// Raw exchange reply delivered by the host.
#[derive(Debug, Clone, Default)]
pub struct ServerResponse {
    pub body: Bytes,
}

impl ServerResponse {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { body: body.into() }
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::ResponseParse`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Report<AdapterError>> {
        serde_json::from_slice(&self.body).change_context(AdapterError::ResponseParse {
            message: "Response body is not valid JSON".to_string(),
        })
    }
}

/// Native creative fields reassembled from an exchange response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeAd {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsored_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub impression_trackers: Vec<String>,
}

/// Normalized bid handed back to the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidResponse {
    /// Bid id of the submitted request this bid answers.
    pub request_id: String,
    pub cpm: f64,
    pub currency: String,
    /// Time to live in seconds.
    pub ttl: u32,
    /// `true` for net prices, `false` for gross.
    pub net_revenue: bool,
    pub creative_id: String,
    pub media_type: MediaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_id: Option<String>,
    /// Creative markup for display bids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vast_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<NativeAd>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidder_code: Option<String>,
    /// Exchange-specific extension carried through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tbd: Option<Json>,
    /// Exchange server timestamp token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    Iframe,
    Image,
}

/// A user-sync pixel or iframe the host should load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSync {
    #[serde(rename = "type")]
    pub sync_type: SyncType,
    pub url: String,
}

impl UserSync {
    pub fn iframe(url: impl Into<String>) -> Self {
        Self {
            sync_type: SyncType::Iframe,
            url: url.into(),
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self {
            sync_type: SyncType::Image,
            url: url.into(),
        }
    }
}

/// Which sync kinds the publisher allows.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    #[serde(default)]
    pub iframe_enabled: bool,
    #[serde(default)]
    pub pixel_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bid_request_accepts_flat_sizes() {
        let bid: BidRequest = serde_json::from_value(json!({
            "bidId": "b1",
            "sizes": [300, 250],
            "mediaTypes": { "video": { "playerSize": [640, 480], "context": "outstream" } }
        }))
        .expect("should deserialize bid request");

        assert_eq!(bid.sizes, vec![AdSize::new(300, 250)]);
        assert_eq!(bid.player_size(), Some(AdSize::new(640, 480)));
        assert_eq!(bid.video_context(), Some(VideoContext::Outstream));
        assert!(bid.is_video());
    }

    #[test]
    fn bid_request_accepts_nested_sizes() {
        let bid: BidRequest = serde_json::from_value(json!({
            "bidId": "b1",
            "sizes": [[300, 250], [728, 90]],
            "mediaTypes": { "video": { "playerSize": [[640, 480]], "context": "adpod" } }
        }))
        .expect("should deserialize bid request");

        assert_eq!(
            bid.sizes,
            vec![AdSize::new(300, 250), AdSize::new(728, 90)]
        );
        assert_eq!(bid.player_size(), Some(AdSize::new(640, 480)));
        assert_eq!(bid.video_context(), Some(VideoContext::Other));
    }

    #[test]
    fn effective_sizes_fall_back_to_banner_media_type() {
        let bid: BidRequest = serde_json::from_value(json!({
            "bidId": "b1",
            "mediaTypes": { "banner": { "sizes": [[320, 50]] } }
        }))
        .expect("should deserialize bid request");

        assert!(bid.sizes.is_empty());
        assert_eq!(bid.effective_sizes(), &[AdSize::new(320, 50)]);
        assert!(!bid.is_video());
        assert!(!bid.is_native());
    }

    #[test]
    fn legacy_media_type_tag_drives_classification() {
        let mut bid = BidRequest {
            bid_id: "b1".to_string(),
            media_type: Some(MediaType::NativeVideo),
            ..BidRequest::default()
        };
        assert!(bid.is_video());
        assert!(bid.is_native_video());

        bid.media_type = Some(MediaType::Native);
        assert!(!bid.is_video());
        assert!(bid.is_native());
    }

    #[test]
    fn optional_id_accepts_strings_and_numbers() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default, deserialize_with = "optional_id")]
            id: Option<String>,
        }

        let cases = [
            (json!({ "id": "abc" }), Some("abc")),
            (json!({ "id": 42 }), Some("42")),
            (json!({ "id": 1.5 }), Some("1.5")),
            (json!({ "id": null }), None),
            (json!({}), None),
        ];
        for (input, expected) in cases {
            let holder: Holder = serde_json::from_value(input).expect("should deserialize id");
            assert_eq!(holder.id.as_deref(), expected);
        }
    }

    #[test]
    fn null_as_default_accepts_null_lists() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default, deserialize_with = "null_as_default")]
            items: Vec<u32>,
        }

        let cases = [
            (json!({ "items": [1, 2] }), vec![1, 2]),
            (json!({ "items": null }), Vec::new()),
            (json!({}), Vec::new()),
        ];
        for (input, expected) in cases {
            let holder: Holder = serde_json::from_value(input).expect("should deserialize items");
            assert_eq!(holder.items, expected);
        }
    }

    #[test]
    fn json_to_param_matches_browser_stringification() {
        assert_eq!(json_to_param(&json!("Sports")), "Sports");
        assert_eq!(json_to_param(&json!(1500.0)), "1500");
        assert_eq!(json_to_param(&json!(0.25)), "0.25");
        assert_eq!(json_to_param(&json!(["a", "b", 3])), "a,b,3");
        assert_eq!(json_to_param(&json!(true)), "true");
        assert_eq!(json_to_param(&json!(null)), "");
    }

    #[test]
    fn page_context_prefers_configured_url() {
        let page = PageContext {
            url: "https://news.example.com/article?id=1".to_string(),
            referrer: String::new(),
            configured_url: Some("https://canonical.example.com/article".to_string()),
        };
        assert_eq!(page.effective_url(), "https://canonical.example.com/article");
        assert_eq!(page.hostname(), "news.example.com");
    }

    #[test]
    fn server_response_json_reports_parse_errors() {
        let response = ServerResponse::new("not json");
        let err = response
            .json::<Json>()
            .expect_err("should reject malformed body");
        assert!(matches!(
            err.current_context(),
            AdapterError::ResponseParse { .. }
        ));
    }

    #[test]
    fn bid_response_serializes_camel_case_and_skips_empty_fields() {
        let bid = BidResponse {
            request_id: "b1".to_string(),
            cpm: 1.5,
            currency: "USD".to_string(),
            ttl: 300,
            net_revenue: true,
            creative_id: "cr1".to_string(),
            media_type: MediaType::Video,
            vast_url: Some("https://vast.example/v".to_string()),
            ..BidResponse::default()
        };

        let value = serde_json::to_value(&bid).expect("should serialize bid response");
        assert_eq!(value["requestId"], "b1");
        assert_eq!(value["netRevenue"], true);
        assert_eq!(value["mediaType"], "video");
        assert_eq!(value["vastUrl"], "https://vast.example/v");
        assert!(value.get("ad").is_none());
        assert!(value.get("dealId").is_none());
    }

    #[test]
    fn user_sync_serializes_type_tag() {
        let sync = UserSync::iframe("//sync.example/frame");
        let value = serde_json::to_value(&sync).expect("should serialize sync");
        assert_eq!(value, json!({ "type": "iframe", "url": "//sync.example/frame" }));
    }
}
