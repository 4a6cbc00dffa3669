//! TargetingGates legacy exchange integration.
//!
//! Display and native slots are batched into one `GET /w/1.0/arj` request on
//! the publisher's delivery domain; each video slot gets its own
//! `GET /v/1.0/avjp` request. Prices come back in thousandths of the CPM.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use error_stack::Report;
use http::Method;
use serde::Deserialize;
use serde_json::{Map, Value as Json};

use crate::auction::context::QueryParams;
use crate::auction::provider::BidAdapter;
use crate::auction::session::AuctionSession;
use crate::auction::types::{
    format_number, json_to_param, null_as_default, optional_id, AdSize, BidRequest, BidResponse,
    BidderRequest, MediaType, RequestData, RequestPayload, ServerRequest, ServerResponse,
    SyncOptions, UserSync, VideoContext,
};
use crate::beacon::{register_beacon, BeaconReport, BeaconSource};
use crate::constants::{
    DISPLAY_PATH, OUTSTREAM_VOS, TARGETINGGATES_BIDDER_CODE, VIDEO_PATH, VIDEO_PATH_SUFFIX,
};
use crate::error::AdapterError;
use crate::http_util::query_param;
use crate::settings::{ConsentManagement, Settings, TargetingGatesConfig};

const SUPPORTED_MEDIA_TYPES: &[MediaType] = &[
    MediaType::Banner,
    MediaType::Video,
    MediaType::Native,
    MediaType::NativeVideo,
];

// ============================================================================
// Bid params
// ============================================================================

/// Publisher parameters of a `targetinggates` ad unit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetingGatesParams {
    #[serde(default, deserialize_with = "optional_id")]
    unit: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    del_domain: Option<String>,
    #[serde(default)]
    bc: Option<String>,
    /// Key-values forwarded as custom targeting.
    #[serde(default)]
    custom_params: Option<Map<String, Json>>,
    /// Floor price in CPM.
    #[serde(default)]
    custom_floor: Option<f64>,
    /// Video settings passed through to the exchange.
    #[serde(default)]
    video: Option<Map<String, Json>>,
}

/// A bid whose required params have been checked.
struct Slot<'a> {
    bid: &'a BidRequest,
    unit: String,
    del_domain: String,
    params: TargetingGatesParams,
}

impl<'a> Slot<'a> {
    fn from_bid(bid: &'a BidRequest) -> Result<Self, Report<AdapterError>> {
        let params: TargetingGatesParams = bid.decode_params(TARGETINGGATES_BIDDER_CODE)?;
        let missing = |field: &str| {
            Report::new(AdapterError::InvalidBidParams {
                bidder: TARGETINGGATES_BIDDER_CODE.to_string(),
                message: format!("bid {} is missing params.{field}", bid.bid_id),
            })
        };

        let unit = non_empty(params.unit.as_deref()).ok_or_else(|| missing("unit"))?;
        let del_domain =
            non_empty(params.del_domain.as_deref()).ok_or_else(|| missing("delDomain"))?;

        Ok(Self {
            bid,
            unit: unit.to_string(),
            del_domain: del_domain.to_string(),
            params,
        })
    }

    /// Custom targeting encoded as base64 `key=value&key=value`.
    fn encoded_custom_params(&self) -> Option<String> {
        let custom = self.params.custom_params.as_ref()?;
        let pairs = custom
            .iter()
            .map(|(key, value)| format_custom_param(key, value))
            .collect::<Vec<_>>()
            .join("&");
        Some(STANDARD.encode(pairs))
    }

    fn custom_floor(&self) -> Option<f64> {
        self.params.custom_floor.filter(|floor| *floor != 0.0)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Lowercase `key=value` with the first `+` escaped to `.` and the first `/` to `_`.
fn format_custom_param(key: &str, value: &Json) -> String {
    format!(
        "{}={}",
        key.to_lowercase(),
        json_to_param(value).to_lowercase()
    )
    .replacen('+', ".", 1)
    .replacen('/', "_", 1)
}

// ============================================================================
// Exchange response types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct DisplayResponse {
    #[serde(default)]
    ads: Option<DisplayAds>,
}

#[derive(Debug, Default, Deserialize)]
struct DisplayAds {
    /// Entries are decoded one by one so a malformed no-fill entry does not
    /// take its siblings down with it.
    #[serde(default, deserialize_with = "null_as_default")]
    ad: Vec<Json>,
}

#[derive(Debug, Default, Deserialize)]
struct DisplayAdUnit {
    #[serde(default, deserialize_with = "optional_id")]
    idx: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub_rev: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    creative: Vec<Creative>,
    #[serde(default)]
    html: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    deal_id: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    tbd: Option<Json>,
    #[serde(default, deserialize_with = "optional_id")]
    ts: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Creative {
    #[serde(default, deserialize_with = "optional_id")]
    id: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    width: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    height: Option<String>,
    #[serde(default)]
    tracking: Option<Tracking>,
}

#[derive(Debug, Default, Deserialize)]
struct Tracking {
    #[serde(default)]
    impression: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResponse {
    #[serde(default)]
    vast_url: Option<String>,
    #[serde(default, rename = "pub_rev", deserialize_with = "optional_id")]
    pub_rev: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    width: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    height: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    adid: Option<String>,
}

/// Parse a price in thousandths of the CPM; no-fill and garbage yield `None`.
fn parse_price(raw: Option<&str>) -> Option<f64> {
    let price: f64 = raw?.trim().parse().ok()?;
    (price.is_finite() && price > 0.0).then_some(price)
}

fn parse_dimension(raw: Option<&str>) -> Option<u32> {
    raw?.trim().parse().ok()
}

/// Which parser a wire request's response needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseKind {
    Banner,
    Native,
    Video,
    NativeVideo,
}

impl ResponseKind {
    fn from_request(request: &ServerRequest) -> Self {
        let bids = &request.payload.bids;
        if request.url.ends_with(VIDEO_PATH_SUFFIX) {
            if bids.first().is_some_and(BidRequest::is_native_video) {
                Self::NativeVideo
            } else {
                Self::Video
            }
        } else if !bids.is_empty() && bids.iter().all(BidRequest::is_native) {
            Self::Native
        } else {
            Self::Banner
        }
    }

    fn reported_media_type(self) -> MediaType {
        match self {
            Self::Banner => MediaType::Banner,
            Self::Native => MediaType::Native,
            Self::Video | Self::NativeVideo => MediaType::Video,
        }
    }
}

// ============================================================================
// Adapter
// ============================================================================

pub struct TargetingGatesAdapter {
    config: TargetingGatesConfig,
    consent: ConsentManagement,
}

impl TargetingGatesAdapter {
    #[must_use]
    pub fn new(config: TargetingGatesConfig, consent: ConsentManagement) -> Self {
        Self { config, consent }
    }

    fn build_requests_at(
        &self,
        bids: &[BidRequest],
        bidder_request: &BidderRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<ServerRequest>, Report<AdapterError>> {
        if bids.is_empty() {
            return Ok(Vec::new());
        }

        let slots = bids
            .iter()
            .map(Slot::from_bid)
            .collect::<Result<Vec<_>, _>>()?;
        let (video, display): (Vec<_>, Vec<_>) =
            slots.into_iter().partition(|slot| slot.bid.is_video());

        log::info!(
            "{}: building {} display and {} video bids",
            TARGETINGGATES_BIDDER_CODE,
            display.len(),
            video.len()
        );

        let mut requests = Vec::with_capacity(video.len() + 1);
        if !display.is_empty() {
            requests.push(self.display_request(&display, bidder_request, now));
        }
        for slot in &video {
            requests.push(self.video_request(slot, bidder_request, now));
        }
        Ok(requests)
    }

    /// Parameters shared by display and video requests.
    fn common_params(
        &self,
        slots: &[&Slot<'_>],
        bidder_request: &BidderRequest,
        now: DateTime<Utc>,
    ) -> QueryParams {
        let device = &bidder_request.device;
        let mut params = QueryParams::new();

        params.set("ju", bidder_request.page.effective_url());
        params.set("jr", &bidder_request.page.referrer);
        params.set("ch", &device.charset);
        params.set(
            "res",
            format!(
                "{}x{}x{}",
                device.screen.width, device.screen.height, device.screen.color_depth
            ),
        );
        params.set("ifr", device.in_iframe);
        params.set("tz", device.timezone_offset_minutes);
        params.set_opt("tws", device.viewport);
        params.set("be", 1);
        params.set(
            "dddid",
            slots
                .iter()
                .map(|slot| slot.bid.transaction_id.as_str())
                .collect::<Vec<_>>()
                .join(","),
        );
        params.set("nocache", now.timestamp_millis());

        if let Some(consent) = &bidder_request.gdpr_consent {
            params.set_opt("gdpr_consent", consent.consent_string.as_deref());
            params.set_opt("gdpr", consent.gdpr_applies.map(u8::from));
            if self.consent.is_iab() {
                params.set("x_gdpr_f", 1);
            }
        }

        params
    }

    fn display_request(
        &self,
        slots: &[Slot<'_>],
        bidder_request: &BidderRequest,
        now: DateTime<Utc>,
    ) -> ServerRequest {
        let refs: Vec<&Slot<'_>> = slots.iter().collect();
        let mut params = self.common_params(&refs, bidder_request, now);

        params.set(
            "auid",
            slots
                .iter()
                .map(|slot| slot.unit.as_str())
                .collect::<Vec<_>>()
                .join(","),
        );
        params.set(
            "aus",
            slots
                .iter()
                .map(|slot| {
                    slot.bid
                        .effective_sizes()
                        .iter()
                        .map(AdSize::to_string)
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .collect::<Vec<_>>()
                .join("|"),
        );

        let first = &slots[0];
        let bc = non_empty(first.params.bc.as_deref())
            .map_or_else(|| self.config.default_bc(), str::to_string);
        params.set("bc", bc);

        let custom: Vec<Option<String>> = slots.iter().map(Slot::encoded_custom_params).collect();
        if custom.iter().any(Option::is_some) {
            params.set(
                "tps",
                custom
                    .into_iter()
                    .map(Option::unwrap_or_default)
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }

        let floors: Vec<Option<f64>> = slots.iter().map(Slot::custom_floor).collect();
        if floors.iter().any(Option::is_some) {
            params.set(
                "aumfs",
                floors
                    .into_iter()
                    .map(|floor| floor.map_or_else(|| "0".to_string(), |f| format_number(f * 1000.0)))
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }

        ServerRequest {
            method: Method::GET,
            url: format!("//{}{}", first.del_domain, DISPLAY_PATH),
            data: RequestData::Query(params),
            payload: RequestPayload {
                bids: slots.iter().map(|slot| slot.bid.clone()).collect(),
                start_time: now,
            },
        }
    }

    fn video_request(
        &self,
        slot: &Slot<'_>,
        bidder_request: &BidderRequest,
        now: DateTime<Utc>,
    ) -> ServerRequest {
        let mut params = self.common_params(&[slot], bidder_request, now);
        let video_config = slot.params.video.clone().unwrap_or_default();
        let size = slot.bid.sizes.first().copied().or_else(|| slot.bid.player_size());

        for (key, value) in &video_config {
            if key == "openrtb" {
                let mut openrtb = value.clone();
                if let (Some(size), Some(object)) = (size, openrtb.as_object_mut()) {
                    object.insert("w".to_string(), Json::from(size.width));
                    object.insert("h".to_string(), Json::from(size.height));
                }
                params.set(key.as_str(), openrtb);
            } else if key != "url" && !params.contains(key) {
                params.set(key.as_str(), json_to_param(value));
            }
        }

        params.set("auid", &slot.unit);
        params.set_opt(
            "vwd",
            size.map(|s| s.width.to_string())
                .or_else(|| video_config.get("vwd").map(json_to_param)),
        );
        params.set_opt(
            "vht",
            size.map(|s| s.height.to_string())
                .or_else(|| video_config.get("vht").map(json_to_param)),
        );

        if slot.bid.video_context() == Some(VideoContext::Outstream) {
            params.set("vos", OUTSTREAM_VOS);
        }
        params.set_opt("vmimes", video_config.get("mimes").map(json_to_param));

        ServerRequest {
            method: Method::GET,
            url: format!("//{}{}", slot.del_domain, VIDEO_PATH),
            data: RequestData::Query(params),
            payload: RequestPayload {
                bids: vec![slot.bid.clone()],
                start_time: now,
            },
        }
    }

    fn try_interpret(
        &self,
        response: &ServerResponse,
        request: &ServerRequest,
        session: &mut AuctionSession,
    ) -> Result<Vec<BidResponse>, Report<AdapterError>> {
        if response.body.is_empty() {
            log::debug!("{}: empty response, no bids", TARGETINGGATES_BIDDER_CODE);
            return Ok(Vec::new());
        }

        let kind = ResponseKind::from_request(request);
        log::debug!(
            "{}: interpreting {:?} response for {}",
            TARGETINGGATES_BIDDER_CODE,
            kind,
            request.url
        );

        match kind {
            ResponseKind::Banner | ResponseKind::Native => {
                let body: DisplayResponse = response.json()?;
                Ok(self.display_bids(kind, body, request, session))
            }
            ResponseKind::Video | ResponseKind::NativeVideo => {
                let body: VideoResponse = response.json()?;
                Ok(self.video_bids(kind, &body, request, session))
            }
        }
    }

    /// Parser for the display family (banner and native).
    fn display_bids(
        &self,
        kind: ResponseKind,
        body: DisplayResponse,
        request: &ServerRequest,
        session: &mut AuctionSession,
    ) -> Vec<BidResponse> {
        let bids = &request.payload.bids;
        let ad_units = body.ads.map(|ads| ads.ad).unwrap_or_default();
        let mut responses = Vec::with_capacity(ad_units.len());

        for entry in ad_units {
            let ad_unit: DisplayAdUnit = match serde_json::from_value(entry) {
                Ok(ad_unit) => ad_unit,
                Err(err) => {
                    log::warn!(
                        "{}: skipping malformed ad entry: {}",
                        TARGETINGGATES_BIDDER_CODE,
                        err
                    );
                    continue;
                }
            };
            let Some(bid) = ad_unit
                .idx
                .as_deref()
                .and_then(|idx| idx.trim().parse::<usize>().ok())
                .and_then(|idx| bids.get(idx))
            else {
                log::warn!(
                    "{}: dropping ad with unknown idx {:?}",
                    TARGETINGGATES_BIDDER_CODE,
                    ad_unit.idx
                );
                continue;
            };

            let Some(price) = parse_price(ad_unit.pub_rev.as_deref()) else {
                log::debug!(
                    "{}: no fill for bid {}",
                    TARGETINGGATES_BIDDER_CODE,
                    bid.bid_id
                );
                continue;
            };

            let creative = ad_unit.creative.first();
            responses.push(BidResponse {
                request_id: bid.bid_id.clone(),
                cpm: price / 1000.0,
                currency: self.currency(ad_unit.currency.as_deref()),
                ttl: self.config.ttl_secs,
                net_revenue: self.config.net_revenue,
                creative_id: creative.and_then(|c| c.id.clone()).unwrap_or_default(),
                media_type: kind.reported_media_type(),
                ad: ad_unit.html.clone(),
                width: creative.and_then(|c| parse_dimension(c.width.as_deref())),
                height: creative.and_then(|c| parse_dimension(c.height.as_deref())),
                deal_id: ad_unit.deal_id.clone().filter(|d| !d.is_empty()),
                tbd: ad_unit.tbd.clone().filter(|tbd| !tbd.is_null()),
                ts: ad_unit.ts.clone(),
                ..BidResponse::default()
            });

            let report = BeaconReport {
                source: BeaconSource::Display {
                    impression_tracker: creative
                        .and_then(|c| c.tracking.as_ref())
                        .and_then(|t| t.impression.as_deref()),
                },
                price: ad_unit.pub_rev.as_deref().unwrap_or_default(),
                ts: ad_unit.ts.as_deref(),
            };
            register_beacon(
                session,
                TARGETINGGATES_BIDDER_CODE,
                &report,
                request.payload.start_time,
                Utc::now(),
            );
        }

        responses
    }

    /// Parser for the video family (video and native video).
    fn video_bids(
        &self,
        kind: ResponseKind,
        body: &VideoResponse,
        request: &ServerRequest,
        session: &mut AuctionSession,
    ) -> Vec<BidResponse> {
        let Some(bid) = request.payload.bids.first() else {
            log::warn!(
                "{}: video request carries no bid",
                TARGETINGGATES_BIDDER_CODE
            );
            return Vec::new();
        };
        let Some(vast_url) = non_empty(body.vast_url.as_deref()) else {
            log::debug!("{}: no VAST for bid {}", TARGETINGGATES_BIDDER_CODE, bid.bid_id);
            return Vec::new();
        };
        let Some(price) = parse_price(body.pub_rev.as_deref()) else {
            log::debug!("{}: no fill for bid {}", TARGETINGGATES_BIDDER_CODE, bid.bid_id);
            return Vec::new();
        };

        let response = BidResponse {
            request_id: bid.bid_id.clone(),
            cpm: price / 1000.0,
            currency: self.currency(body.currency.as_deref()),
            ttl: self.config.ttl_secs,
            net_revenue: self.config.net_revenue,
            creative_id: body.adid.clone().unwrap_or_default(),
            media_type: kind.reported_media_type(),
            vast_url: Some(vast_url.to_string()),
            width: parse_dimension(body.width.as_deref()),
            height: parse_dimension(body.height.as_deref()),
            bidder_code: Some(TARGETINGGATES_BIDDER_CODE.to_string()),
            ..BidResponse::default()
        };

        let colo = query_param(vast_url, "colo");
        let ph = query_param(vast_url, "ph");
        let ts = query_param(vast_url, "ts");
        let report = BeaconReport {
            source: BeaconSource::Video {
                colo: colo.as_deref(),
                ph: ph.as_deref(),
            },
            price: body.pub_rev.as_deref().unwrap_or_default(),
            ts: ts.as_deref(),
        };
        register_beacon(
            session,
            TARGETINGGATES_BIDDER_CODE,
            &report,
            request.payload.start_time,
            Utc::now(),
        );

        vec![response]
    }

    fn currency(&self, currency: Option<&str>) -> String {
        non_empty(currency).map_or_else(|| self.config.default_currency.clone(), str::to_string)
    }
}

impl BidAdapter for TargetingGatesAdapter {
    fn code(&self) -> &'static str {
        TARGETINGGATES_BIDDER_CODE
    }

    fn supported_media_types(&self) -> &'static [MediaType] {
        SUPPORTED_MEDIA_TYPES
    }

    fn is_bid_request_valid(&self, bid: &BidRequest) -> bool {
        Slot::from_bid(bid).is_ok()
    }

    fn build_requests(
        &self,
        bids: &[BidRequest],
        bidder_request: &BidderRequest,
    ) -> Result<Vec<ServerRequest>, Report<AdapterError>> {
        self.build_requests_at(bids, bidder_request, Utc::now())
    }

    fn interpret_response(
        &self,
        response: &ServerResponse,
        request: &ServerRequest,
        session: &mut AuctionSession,
    ) -> Vec<BidResponse> {
        match self.try_interpret(response, request, session) {
            Ok(bids) => bids,
            Err(err) => {
                log::warn!(
                    "{}: discarding malformed response: {:?}",
                    TARGETINGGATES_BIDDER_CODE,
                    err
                );
                Vec::new()
            }
        }
    }

    fn user_syncs(&self, options: &SyncOptions, responses: &[ServerResponse]) -> Vec<UserSync> {
        if !options.iframe_enabled {
            return Vec::new();
        }

        let body = responses
            .first()
            .and_then(|response| response.json::<Json>().ok());
        let pixels = body.as_ref().and_then(|body| {
            ["/ads/pixels", "/pixels"]
                .iter()
                .find_map(|pointer| body.pointer(pointer).and_then(Json::as_str))
                .filter(|url| !url.is_empty())
        });

        vec![UserSync::iframe(
            pixels.map_or_else(|| self.config.sync_url.clone(), str::to_string),
        )]
    }
}

/// Register the `targetinggates` adapter when it is enabled.
#[must_use]
pub fn register_adapter(settings: &Settings) -> Vec<Arc<dyn BidAdapter>> {
    if !settings.targetinggates.enabled {
        log::debug!("{} adapter is disabled", TARGETINGGATES_BIDDER_CODE);
        return Vec::new();
    }

    log::info!(
        "Registering {} adapter (bc: {})",
        TARGETINGGATES_BIDDER_CODE,
        settings.targetinggates.default_bc()
    );
    vec![Arc::new(TargetingGatesAdapter::new(
        settings.targetinggates.clone(),
        settings.consent_management.clone(),
    ))]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::session::UserSyncRegistrar as _;
    use crate::auction::types::SyncType;
    use crate::test_support::tests::{
        banner_bid, create_test_bidder_request, create_test_session, create_test_settings,
        native_bid, video_bid, with_gdpr, PAGE_URL, REFERRER,
    };
    use serde_json::json;

    const TRACKER: &str = "https://rtb.example.net/w/1.0/ri?ts=abc&id=1";

    fn adapter() -> TargetingGatesAdapter {
        let settings = create_test_settings();
        TargetingGatesAdapter::new(settings.targetinggates, settings.consent_management)
    }

    fn iab_adapter() -> TargetingGatesAdapter {
        let settings = create_test_settings();
        TargetingGatesAdapter::new(
            settings.targetinggates,
            ConsentManagement {
                cmp_api: Some("iab".to_string()),
            },
        )
    }

    fn unit_params(unit: &str) -> Json {
        json!({ "unit": unit, "delDomain": "pub-d.example.net" })
    }

    fn query(request: &ServerRequest) -> &QueryParams {
        request.query().expect("should be a GET request")
    }

    fn build(adapter: &TargetingGatesAdapter, bids: &[BidRequest]) -> Vec<ServerRequest> {
        adapter
            .build_requests(bids, &create_test_bidder_request())
            .expect("should build requests")
    }

    #[test]
    fn validity_requires_unit_and_del_domain() {
        let adapter = adapter();

        assert!(adapter.is_bid_request_valid(&banner_bid("b1", unit_params("5401"))));
        assert!(adapter.is_bid_request_valid(&banner_bid(
            "b1",
            json!({ "unit": 5401, "delDomain": "pub-d.example.net" })
        )));
        assert!(!adapter.is_bid_request_valid(&banner_bid(
            "b1",
            json!({ "delDomain": "pub-d.example.net" })
        )));
        assert!(!adapter.is_bid_request_valid(&banner_bid(
            "b1",
            json!({ "unit": "5401", "delDomain": "" })
        )));
        assert!(!adapter.is_bid_request_valid(&banner_bid("b1", json!(null))));
    }

    #[test]
    fn every_bid_lands_in_exactly_one_request() {
        let bids = vec![
            banner_bid("b1", unit_params("1")),
            video_bid("v1", "instream", unit_params("2")),
            native_bid("n1", unit_params("3")),
            video_bid("v2", "outstream", unit_params("4")),
        ];
        let requests = build(&adapter(), &bids);

        assert_eq!(requests.len(), 3);
        let mut carried: Vec<&str> = requests
            .iter()
            .flat_map(|r| r.payload.bids.iter().map(|b| b.bid_id.as_str()))
            .collect();
        carried.sort_unstable();
        assert_eq!(carried, vec!["b1", "n1", "v1", "v2"]);

        assert_eq!(requests[0].url, "//pub-d.example.net/w/1.0/arj");
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(requests[1].url, "//pub-d.example.net/v/1.0/avjp");
        assert_eq!(requests[2].url, "//pub-d.example.net/v/1.0/avjp");
    }

    #[test]
    fn empty_input_builds_no_requests() {
        assert!(build(&adapter(), &[]).is_empty());
    }

    #[test]
    fn missing_required_params_is_an_error() {
        let err = adapter()
            .build_requests(
                &[banner_bid("b1", json!({ "unit": "1" }))],
                &create_test_bidder_request(),
            )
            .expect_err("should reject bid without delDomain");
        assert!(matches!(
            err.current_context(),
            AdapterError::InvalidBidParams { bidder, .. } if bidder == "targetinggates"
        ));
    }

    #[test]
    fn display_request_carries_common_and_slot_params() {
        let bids = vec![
            banner_bid("b1", unit_params("5401")),
            banner_bid("b2", unit_params("5402")),
        ];
        let requests = build(&adapter(), &bids);
        let params = query(&requests[0]);

        assert_eq!(params.get("ju"), Some(PAGE_URL));
        assert_eq!(params.get("jr"), Some(REFERRER));
        assert_eq!(params.get("ch"), Some("UTF-8"));
        assert_eq!(params.get("res"), Some("1920x1080x24"));
        assert_eq!(params.get("ifr"), Some("false"));
        assert_eq!(params.get("tz"), Some("-540"));
        assert_eq!(params.get("tws"), Some("1280x720"));
        assert_eq!(params.get("be"), Some("1"));
        assert_eq!(params.get("dddid"), Some("tx-b1,tx-b2"));
        assert!(params.get("nocache").is_some());
        assert_eq!(params.get("auid"), Some("5401,5402"));
        assert_eq!(params.get("aus"), Some("300x250,300x600|300x250,300x600"));
        assert_eq!(params.get("bc"), Some("hb_pb_1.0.0"));
        assert!(!params.contains("tps"));
        assert!(!params.contains("aumfs"));
        assert!(!params.contains("gdpr"));
        assert!(!params.contains("gdpr_consent"));
    }

    #[test]
    fn display_request_prefers_configured_page_url_and_first_bid_bc() {
        let mut bidder_request = create_test_bidder_request();
        bidder_request.page.configured_url = Some("https://canonical.example.com/a".to_string());
        bidder_request.device.viewport = None;
        let bids = vec![
            banner_bid(
                "b1",
                json!({ "unit": "1", "delDomain": "first.example.net", "bc": "custom_bc" }),
            ),
            banner_bid(
                "b2",
                json!({ "unit": "2", "delDomain": "second.example.net", "bc": "ignored" }),
            ),
        ];

        let requests = adapter()
            .build_requests(&bids, &bidder_request)
            .expect("should build requests");
        let params = query(&requests[0]);

        assert_eq!(requests[0].url, "//first.example.net/w/1.0/arj");
        assert_eq!(params.get("ju"), Some("https://canonical.example.com/a"));
        assert_eq!(params.get("bc"), Some("custom_bc"));
        assert!(!params.contains("tws"));
    }

    #[test]
    fn custom_params_and_floors_align_with_units() {
        let bids = vec![
            banner_bid(
                "b1",
                json!({
                    "unit": "1",
                    "delDomain": "pub-d.example.net",
                    "customParams": { "Gender": "M+F/x", "kw": ["A", "b"] }
                }),
            ),
            banner_bid(
                "b2",
                json!({ "unit": "2", "delDomain": "pub-d.example.net", "customFloor": 1.5 }),
            ),
        ];
        let requests = build(&adapter(), &bids);
        let params = query(&requests[0]);

        assert_eq!(params.get("tps"), Some("Z2VuZGVyPW0uZl94Jmt3PWEsYg==,"));
        assert_eq!(params.get("aumfs"), Some("0,1500"));
    }

    #[test]
    fn custom_param_formatting_escapes_first_occurrence_only() {
        assert_eq!(
            format_custom_param("Path", &json!("A/B/C+D+E")),
            "path=a_b/c.d+e"
        );
    }

    #[test]
    fn gdpr_consent_goes_on_the_wire_verbatim() {
        let bidder_request = with_gdpr(
            create_test_bidder_request(),
            true,
            "BOJ/P2HOJ/P2HABABMAAAAAZ+A==",
        );
        let requests = iab_adapter()
            .build_requests(&[banner_bid("b1", unit_params("1"))], &bidder_request)
            .expect("should build requests");
        let params = query(&requests[0]);

        assert_eq!(params.get("gdpr"), Some("1"));
        assert_eq!(params.get("gdpr_consent"), Some("BOJ/P2HOJ/P2HABABMAAAAAZ+A=="));
        assert_eq!(params.get("x_gdpr_f"), Some("1"));
        assert!(requests[0]
            .url_with_query()
            .contains("gdpr_consent=BOJ%2FP2HOJ%2FP2HABABMAAAAAZ%2BA%3D%3D"));
    }

    #[test]
    fn gdpr_not_applying_sends_zero_without_iab_flag() {
        let bidder_request = with_gdpr(create_test_bidder_request(), false, "");
        let requests = adapter()
            .build_requests(&[banner_bid("b1", unit_params("1"))], &bidder_request)
            .expect("should build requests");
        let params = query(&requests[0]);

        assert_eq!(params.get("gdpr"), Some("0"));
        assert!(!params.contains("x_gdpr_f"));
    }

    #[test]
    fn video_size_falls_back_to_player_size() {
        let bid = video_bid(
            "v1",
            "outstream",
            json!({
                "unit": "77",
                "delDomain": "pub-d.example.net",
                "video": {
                    "url": "https://ignored.example",
                    "be": "9",
                    "mimes": ["video/mp4", "video/webm"],
                    "vwd": 300,
                    "openrtb": { "w": 1, "h": 1, "skippable": true }
                }
            }),
        );
        let requests = build(&adapter(), &[bid]);
        let params = query(&requests[0]);

        assert_eq!(params.get("vwd"), Some("640"));
        assert_eq!(params.get("vht"), Some("480"));
        assert_eq!(params.get("auid"), Some("77"));
        assert_eq!(params.get("vos"), Some("101"));
        assert_eq!(params.get("vmimes"), Some("video/mp4,video/webm"));
        assert_eq!(params.get("be"), Some("1"));
        assert!(!params.contains("url"));
        assert_eq!(params.get("dddid"), Some("tx-v1"));

        let openrtb: Json = serde_json::from_str(params.get("openrtb").expect("should have openrtb"))
            .expect("should be JSON");
        assert_eq!(openrtb, json!({ "w": 640, "h": 480, "skippable": true }));
    }

    #[test]
    fn slot_sizes_win_over_player_size() {
        let mut bid = video_bid("v1", "instream", unit_params("77"));
        bid.sizes = vec![AdSize::new(400, 300)];
        let requests = build(&adapter(), &[bid]);
        let params = query(&requests[0]);

        assert_eq!(params.get("vwd"), Some("400"));
        assert_eq!(params.get("vht"), Some("300"));
        assert!(!params.contains("vos"));
    }

    #[test]
    fn video_config_size_used_when_no_size_resolves() {
        let bid: BidRequest = serde_json::from_value(json!({
            "bidId": "v1",
            "mediaType": "video",
            "params": {
                "unit": "77",
                "delDomain": "pub-d.example.net",
                "video": { "vwd": 320, "vht": 180, "openrtb": { "w": 320, "h": 180 } }
            }
        }))
        .expect("should deserialize bid");
        let requests = build(&adapter(), &[bid]);
        let params = query(&requests[0]);

        assert_eq!(params.get("vwd"), Some("320"));
        assert_eq!(params.get("vht"), Some("180"));
        assert_eq!(params.get("openrtb"), Some(r#"{"w":320,"h":180}"#));
    }

    fn display_request_for(bids: Vec<BidRequest>) -> ServerRequest {
        build(&adapter(), &bids).remove(0)
    }

    fn display_body(ads: Json) -> ServerResponse {
        ServerResponse::new(json!({ "ads": { "ad": ads, "pixels": "//sync.example/px" } }).to_string())
    }

    fn display_ad(idx: &str, pub_rev: Json) -> Json {
        json!({
            "idx": idx,
            "pub_rev": pub_rev,
            "currency": "USD",
            "html": "<div>ad</div>",
            "deal_id": "deal-9",
            "tbd": { "k": "v" },
            "ts": "tsv",
            "creative": [{
                "id": "cr-1",
                "width": "300",
                "height": "250",
                "tracking": { "impression": TRACKER }
            }]
        })
    }

    #[test]
    fn no_fill_entry_with_null_creative_keeps_siblings() {
        let request = display_request_for(vec![
            banner_bid("b1", unit_params("1")),
            banner_bid("b2", unit_params("2")),
        ]);
        let mut session = create_test_session();
        let bids = adapter().interpret_response(
            &display_body(json!([
                { "idx": "0", "pub_rev": "", "creative": null },
                { "idx": 1, "pub_rev": "900", "creative": { "id": "not-a-list" } },
                display_ad("1", json!("1500"))
            ])),
            &request,
            &mut session,
        );

        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].request_id, "b2");
        assert!((bids[0].cpm - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn display_price_is_divided_by_thousand() {
        let request = display_request_for(vec![
            banner_bid("b1", unit_params("1")),
            banner_bid("b2", unit_params("2")),
        ]);
        let mut session = create_test_session();
        let bids = adapter().interpret_response(
            &display_body(json!([display_ad("1", json!("1500"))])),
            &request,
            &mut session,
        );

        assert_eq!(bids.len(), 1);
        let bid = &bids[0];
        assert_eq!(bid.request_id, "b2");
        assert!((bid.cpm - 1.5).abs() < f64::EPSILON);
        assert_eq!(bid.currency, "USD");
        assert_eq!(bid.ttl, 300);
        assert!(bid.net_revenue);
        assert_eq!(bid.creative_id, "cr-1");
        assert_eq!(bid.width, Some(300));
        assert_eq!(bid.height, Some(250));
        assert_eq!(bid.ad.as_deref(), Some("<div>ad</div>"));
        assert_eq!(bid.deal_id.as_deref(), Some("deal-9"));
        assert_eq!(bid.tbd, Some(json!({ "k": "v" })));
        assert_eq!(bid.ts.as_deref(), Some("tsv"));
        assert_eq!(bid.media_type, MediaType::Banner);
    }

    #[test]
    fn missing_or_zero_price_yields_no_bid() {
        let request = display_request_for(vec![banner_bid("b1", unit_params("1"))]);
        let mut session = create_test_session();
        let mut no_price = display_ad("0", json!(null));
        no_price
            .as_object_mut()
            .expect("should be object")
            .remove("pub_rev");

        let bids = adapter().interpret_response(
            &display_body(json!([
                display_ad("0", json!("")),
                display_ad("0", json!("0")),
                display_ad("0", json!(0)),
                no_price,
                display_ad("5", json!("1000"))
            ])),
            &request,
            &mut session,
        );

        assert!(bids.is_empty());
        assert!(!session.beacon_fired());
    }

    #[test]
    fn missing_currency_falls_back_to_default() {
        let request = display_request_for(vec![banner_bid("b1", unit_params("1"))]);
        let mut ad = display_ad("0", json!(2500));
        ad.as_object_mut()
            .expect("should be object")
            .remove("currency");

        let bids = adapter().interpret_response(
            &display_body(json!([ad])),
            &request,
            &mut create_test_session(),
        );
        assert_eq!(bids[0].currency, "USD");
        assert!((bids[0].cpm - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn native_batch_reports_native_media_type() {
        let request = display_request_for(vec![
            native_bid("n1", unit_params("1")),
            native_bid("n2", unit_params("2")),
        ]);
        assert_eq!(ResponseKind::from_request(&request), ResponseKind::Native);

        let bids = adapter().interpret_response(
            &display_body(json!([display_ad("0", json!("800"))])),
            &request,
            &mut create_test_session(),
        );
        assert_eq!(bids[0].media_type, MediaType::Native);
        assert_eq!(bids[0].request_id, "n1");
    }

    #[test]
    fn mixed_batch_is_interpreted_as_banner() {
        let request = display_request_for(vec![
            native_bid("n1", unit_params("1")),
            banner_bid("b1", unit_params("2")),
        ]);
        assert_eq!(ResponseKind::from_request(&request), ResponseKind::Banner);
    }

    #[test]
    fn beacon_fires_once_per_session_reset() {
        let adapter = adapter();
        let request = display_request_for(vec![
            banner_bid("b1", unit_params("1")),
            banner_bid("b2", unit_params("2")),
        ]);
        let response = display_body(json!([
            display_ad("0", json!("1500")),
            display_ad("1", json!("1200"))
        ]));
        let mut session = create_test_session();

        let bids = adapter.interpret_response(&response, &request, &mut session);
        assert_eq!(bids.len(), 2);
        adapter.interpret_response(&response, &request, &mut session);

        let syncs = session.registered_syncs();
        assert_eq!(syncs.len(), 1);
        assert_eq!(syncs[0].sync_type, SyncType::Image);
        assert_eq!(syncs[0].bidder, "targetinggates");
        assert!(syncs[0].url.starts_with("https://rtb.example.net/w/1.0/bo?"));
        assert!(syncs[0].url.contains("bp=1500"));
        assert!(syncs[0].url.contains("bs=news.example.com"));
        assert!(syncs[0].url.contains("bt=1000"));
        assert!(syncs[0].url.contains("ts=tsv"));

        session.reset();
        adapter.interpret_response(&response, &request, &mut session);
        assert_eq!(session.registered_syncs().len(), 1);
    }

    #[test]
    fn beacon_without_record_pixel_registers_nothing() {
        let request = display_request_for(vec![banner_bid("b1", unit_params("1"))]);
        let mut ad = display_ad("0", json!("1500"));
        ad["creative"][0]["tracking"]["impression"] = json!("https://rtb.example.net/imp?x=1");
        let mut session = create_test_session();
        session.register_sync(SyncType::Iframe, "other", "//other.example");

        let bids = adapter().interpret_response(&display_body(json!([ad])), &request, &mut session);

        assert_eq!(bids.len(), 1);
        assert!(session.beacon_fired());
        assert_eq!(session.registered_syncs().len(), 1);
    }

    fn video_request() -> ServerRequest {
        build(&adapter(), &[video_bid("v1", "instream", unit_params("77"))]).remove(0)
    }

    #[test]
    fn video_response_yields_vast_bid_and_colo_beacon() {
        let request = video_request();
        assert_eq!(ResponseKind::from_request(&request), ResponseKind::Video);
        let response = ServerResponse::new(
            json!({
                "vastUrl": "https://pub-d.example.net/v/1.0/av?colo=http%3A%2F%2Frtb-va.example.net&ph=ph-1&ts=vts",
                "pub_rev": "2000",
                "currency": "USD",
                "width": "640",
                "height": "480",
                "adid": "ad-7"
            })
            .to_string(),
        );
        let mut session = create_test_session();

        let bids = adapter().interpret_response(&response, &request, &mut session);

        assert_eq!(bids.len(), 1);
        let bid = &bids[0];
        assert_eq!(bid.request_id, "v1");
        assert!((bid.cpm - 2.0).abs() < f64::EPSILON);
        assert_eq!(bid.media_type, MediaType::Video);
        assert_eq!(bid.creative_id, "ad-7");
        assert_eq!(bid.width, Some(640));
        assert_eq!(bid.height, Some(480));
        assert_eq!(bid.bidder_code.as_deref(), Some("targetinggates"));
        assert!(bid.vast_url.as_deref().is_some_and(|u| u.contains("colo=")));

        let syncs = session.registered_syncs();
        assert_eq!(syncs.len(), 1);
        assert!(syncs[0].url.starts_with("//rtb-va.example.net/w/1.0/bo?"));
        assert!(syncs[0].url.contains("bp=2000"));
        assert!(syncs[0].url.contains("ts=vts"));
        assert!(syncs[0].url.ends_with("ph=ph-1"));
    }

    #[test]
    fn native_video_is_reported_as_video() {
        let bid: BidRequest = serde_json::from_value(json!({
            "bidId": "nv1",
            "mediaType": "nativeVideo",
            "sizes": [640, 360],
            "params": unit_params("9")
        }))
        .expect("should deserialize bid");
        let request = build(&adapter(), &[bid]).remove(0);
        assert_eq!(ResponseKind::from_request(&request), ResponseKind::NativeVideo);

        let response = ServerResponse::new(
            json!({ "vastUrl": "https://v.example/vast", "pub_rev": 900, "currency": "KRW" })
                .to_string(),
        );
        let bids = adapter().interpret_response(&response, &request, &mut create_test_session());
        assert_eq!(bids[0].media_type, MediaType::Video);
        assert_eq!(bids[0].currency, "KRW");
    }

    #[test]
    fn video_without_vast_or_price_yields_no_bid() {
        let request = video_request();
        let mut session = create_test_session();
        for body in [
            json!({ "vastUrl": "", "pub_rev": "2000" }),
            json!({ "vastUrl": "https://v.example/vast", "pub_rev": "" }),
            json!({}),
        ] {
            let bids = adapter().interpret_response(
                &ServerResponse::new(body.to_string()),
                &request,
                &mut session,
            );
            assert!(bids.is_empty());
        }
        assert!(!session.beacon_fired());
    }

    #[test]
    fn malformed_response_yields_no_bids() {
        let request = display_request_for(vec![banner_bid("b1", unit_params("1"))]);
        let mut session = create_test_session();

        for body in ["not json", "", "{\"ads\": 5}"] {
            let bids =
                adapter().interpret_response(&ServerResponse::new(body), &request, &mut session);
            assert!(bids.is_empty());
        }
        assert!(!session.beacon_fired());
    }

    #[test]
    fn user_syncs_prefer_response_pixels() {
        let adapter = adapter();
        let iframe = SyncOptions {
            iframe_enabled: true,
            pixel_enabled: false,
        };

        let syncs = adapter.user_syncs(&iframe, &[display_body(json!([]))]);
        assert_eq!(syncs, vec![UserSync::iframe("//sync.example/px")]);

        let syncs = adapter.user_syncs(
            &iframe,
            &[ServerResponse::new(json!({ "pixels": "//video.example/px" }).to_string())],
        );
        assert_eq!(syncs, vec![UserSync::iframe("//video.example/px")]);

        let syncs = adapter.user_syncs(&iframe, &[]);
        assert_eq!(
            syncs,
            vec![UserSync::iframe("//adtg.widerplanet.com/delivery/pdirect.php")]
        );
    }

    #[test]
    fn user_syncs_require_iframes() {
        let syncs = adapter().user_syncs(
            &SyncOptions {
                iframe_enabled: false,
                pixel_enabled: true,
            },
            &[display_body(json!([]))],
        );
        assert!(syncs.is_empty());
    }

    #[test]
    fn register_adapter_respects_enabled_flag() {
        let mut settings = create_test_settings();
        assert_eq!(register_adapter(&settings).len(), 1);

        settings.targetinggates.enabled = false;
        assert!(register_adapter(&settings).is_empty());
    }
}
