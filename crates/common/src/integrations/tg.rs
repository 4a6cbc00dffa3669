//! TargetingGates `OpenRTB` exchange integration.
//!
//! All slots of an auction go out in one JSON `POST` to the configured endpoint.
//! Responses are matched back to slots by impression id; prices are already CPM.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt};
use http::Method;
use serde::Deserialize;

use crate::auction::provider::BidAdapter;
use crate::auction::session::AuctionSession;
use crate::auction::types::{
    optional_id, AdSize, BidRequest, BidResponse, BidderRequest, MediaType, RequestData,
    RequestPayload, ServerRequest, ServerResponse, SyncOptions, UserSync,
};
use crate::constants::{TG_BIDDER_ALIASES, TG_BIDDER_CODE};
use crate::error::AdapterError;
use crate::logging::is_debug_enabled;
use crate::native::{parse_native_markup, NativeRequest};
use crate::openrtb::{
    App, Banner, Bid, Device, Imp, NativeImp, OpenRtbRequest, OpenRtbResponse, Publisher, Regs,
    RegsExt, Site, User, UserExt,
};
use crate::settings::{Settings, TgConfig};

const SUPPORTED_MEDIA_TYPES: &[MediaType] = &[
    MediaType::Banner,
    MediaType::Video,
    MediaType::Native,
    MediaType::NativeVideo,
];

/// Publisher parameters of a `tg` ad unit.
#[derive(Debug, Clone, Default, Deserialize)]
struct TgParams {
    /// Publisher id.
    #[serde(default, deserialize_with = "optional_id")]
    cp: Option<String>,
    /// Tag id.
    #[serde(default, deserialize_with = "optional_id")]
    ct: Option<String>,
    /// Creative format, `WxH`.
    #[serde(default)]
    cf: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    cw: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    ch: Option<String>,
    /// Present for in-app inventory.
    #[serde(default)]
    app: Option<AppParams>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppParams {
    #[serde(default)]
    bundle: Option<String>,
    #[serde(default)]
    store_url: Option<String>,
    #[serde(default)]
    domain: Option<String>,
}

impl TgParams {
    fn decode(bid: &BidRequest) -> Result<Self, Report<AdapterError>> {
        let params: Self = bid.decode_params(TG_BIDDER_CODE)?;
        for (field, value) in [("cp", &params.cp), ("ct", &params.ct)] {
            if value.as_deref().is_none_or(str::is_empty) {
                return Err(Report::new(AdapterError::InvalidBidParams {
                    bidder: TG_BIDDER_CODE.to_string(),
                    message: format!("bid {} is missing params.{field}", bid.bid_id),
                }));
            }
        }
        Ok(params)
    }

    fn publisher(&self) -> Publisher {
        Publisher {
            id: self.cp.clone().unwrap_or_default(),
        }
    }

    /// Banner size from `cf` with `cw`/`ch` overrides, `1x1` when unusable.
    fn ad_size(&self) -> AdSize {
        let Some(format) = self.cf.as_deref() else {
            return AdSize::new(1, 1);
        };
        let format = format.to_uppercase();
        let mut parts = format.split('X');
        let width = self.cw.as_deref().or(parts.next());
        let height = self.ch.as_deref().or(parts.next());

        match (parse_dimension(width), parse_dimension(height)) {
            (Some(width), Some(height)) => AdSize::new(width, height),
            _ => {
                log::warn!("{TG_BIDDER_CODE}: unusable creative format {format:?}, using 1x1");
                AdSize::new(1, 1)
            }
        }
    }
}

fn parse_dimension(raw: Option<&str>) -> Option<u32> {
    raw?.trim().parse().ok()
}

pub struct TgAdapter {
    config: TgConfig,
}

impl TgAdapter {
    #[must_use]
    pub fn new(config: TgConfig) -> Self {
        Self { config }
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

        let params = bids
            .iter()
            .map(TgParams::decode)
            .collect::<Result<Vec<_>, _>>()?;
        let imp = bids
            .iter()
            .zip(&params)
            .map(|(bid, params)| self.impression(bid, params))
            .collect::<Result<Vec<_>, _>>()?;

        let first = &params[0];
        let (site, app) = match &first.app {
            Some(app) => (
                None,
                Some(App {
                    publisher: first.publisher(),
                    bundle: app.bundle.clone(),
                    storeurl: app.store_url.clone(),
                    domain: app.domain.clone(),
                }),
            ),
            None => (
                Some(Site {
                    publisher: first.publisher(),
                    referrer: bidder_request.page.referrer.clone(),
                    page: bidder_request.page.url.clone(),
                }),
                None,
            ),
        };

        let device = &bidder_request.device;
        let mut request = OpenRtbRequest {
            id: bids[0].bidder_request_id.clone(),
            imp,
            site,
            app,
            device: Some(Device {
                ua: device.user_agent.clone(),
                js: 1,
                dnt: u8::from(device.do_not_track),
                h: device.screen.height,
                w: device.screen.width,
                language: device.language.clone(),
            }),
            regs: None,
            user: None,
        };

        if let Some(consent) = &bidder_request.gdpr_consent {
            request.regs = Some(Regs {
                ext: RegsExt {
                    gdpr: u8::from(consent.gdpr_applies.unwrap_or(false)),
                },
            });
            request.user = Some(User {
                ext: UserExt {
                    consent: consent.consent_string.clone(),
                },
            });
        }

        let body = serde_json::to_string(&request).change_context(AdapterError::RequestBuild {
            message: "Failed to serialize OpenRTB request".to_string(),
        })?;

        log::info!(
            "{}: requesting bids for {} impressions",
            TG_BIDDER_CODE,
            request.imp.len()
        );
        if is_debug_enabled() {
            if let Ok(pretty) = serde_json::to_string_pretty(&request) {
                log::debug!("{TG_BIDDER_CODE}: OpenRTB request:\n{pretty}");
            }
        }

        Ok(vec![ServerRequest {
            method: Method::POST,
            url: self.config.endpoint.clone(),
            data: RequestData::Json(body),
            payload: RequestPayload {
                bids: bids.to_vec(),
                start_time: now,
            },
        }])
    }

    fn impression(&self, bid: &BidRequest, params: &TgParams) -> Result<Imp, Report<AdapterError>> {
        let (banner, native) = match &bid.native_params {
            Some(native_params) => {
                let assets = NativeRequest::from_params(native_params, &self.config.native);
                let request =
                    serde_json::to_string(&assets).change_context(AdapterError::RequestBuild {
                        message: format!("Failed to encode native request for bid {}", bid.bid_id),
                    })?;
                (
                    None,
                    Some(NativeImp {
                        request,
                        ver: self.config.native.version.clone(),
                    }),
                )
            }
            None => {
                let size = params.ad_size();
                (
                    Some(Banner {
                        w: size.width,
                        h: size.height,
                    }),
                    None,
                )
            }
        };

        Ok(Imp {
            id: bid.bid_id.clone(),
            banner,
            native,
            tagid: params.ct.clone().unwrap_or_default(),
        })
    }

    fn try_interpret(
        &self,
        response: &ServerResponse,
        request: &ServerRequest,
    ) -> Result<Vec<BidResponse>, Report<AdapterError>> {
        let body = request.json_body().ok_or_else(|| {
            Report::new(AdapterError::ResponseParse {
                message: "OpenRTB request carries no JSON body".to_string(),
            })
        })?;
        let ortb_request: OpenRtbRequest =
            serde_json::from_str(body).change_context(AdapterError::ResponseParse {
                message: "Failed to re-read OpenRTB request".to_string(),
            })?;

        if response.body.is_empty() {
            log::debug!("{TG_BIDDER_CODE}: empty response, no bids");
            return Ok(Vec::new());
        }
        let ortb_response: OpenRtbResponse = response.json()?;

        let bids_by_imp: HashMap<&str, &Bid> = ortb_response
            .seatbid
            .iter()
            .flat_map(|seat| seat.bid.iter())
            .map(|bid| (bid.impid.as_str(), bid))
            .collect();

        let mut responses = Vec::with_capacity(bids_by_imp.len());
        for imp in &ortb_request.imp {
            let Some(bid) = bids_by_imp.get(imp.id.as_str()) else {
                continue;
            };
            if let Some(response) = self.bid_response(imp, bid) {
                responses.push(response);
            }
        }
        Ok(responses)
    }

    fn bid_response(&self, imp: &Imp, bid: &Bid) -> Option<BidResponse> {
        let Some(price) = bid.price.filter(|p| p.is_finite() && *p > 0.0) else {
            log::debug!("{TG_BIDDER_CODE}: no fill for impression {}", imp.id);
            return None;
        };

        let ext = bid.ext.clone().unwrap_or_default();
        let mut response = BidResponse {
            request_id: imp.id.clone(),
            cpm: price,
            currency: ext
                .currency
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| self.config.currency.clone()),
            ttl: ext
                .ttl
                .filter(|ttl| *ttl > 0)
                .unwrap_or(self.config.ttl_secs),
            net_revenue: ext.net_revenue.unwrap_or(self.config.net_revenue),
            creative_id: imp.id.clone(),
            ad_id: Some(imp.id.clone()),
            ..BidResponse::default()
        };

        if imp.native.is_some() {
            match parse_native_markup(bid.adm.as_deref().unwrap_or_default()) {
                Ok(native) => {
                    response.native = Some(native);
                    response.media_type = MediaType::Native;
                }
                Err(err) => {
                    log::warn!(
                        "{TG_BIDDER_CODE}: dropping native bid for impression {}: {:?}",
                        imp.id,
                        err
                    );
                    return None;
                }
            }
        } else {
            response.ad = bid.adm.clone();
            response.width = imp.banner.map(|banner| banner.w);
            response.height = imp.banner.map(|banner| banner.h);
            response.media_type = MediaType::Banner;
        }

        Some(response)
    }
}

impl BidAdapter for TgAdapter {
    fn code(&self) -> &'static str {
        TG_BIDDER_CODE
    }

    fn aliases(&self) -> &'static [&'static str] {
        TG_BIDDER_ALIASES
    }

    fn supported_media_types(&self) -> &'static [MediaType] {
        SUPPORTED_MEDIA_TYPES
    }

    fn is_bid_request_valid(&self, bid: &BidRequest) -> bool {
        TgParams::decode(bid).is_ok()
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
        _session: &mut AuctionSession,
    ) -> Vec<BidResponse> {
        self.try_interpret(response, request).unwrap_or_else(|err| {
            log::warn!("{TG_BIDDER_CODE}: discarding malformed response: {err:?}");
            Vec::new()
        })
    }

    fn user_syncs(&self, options: &SyncOptions, _responses: &[ServerResponse]) -> Vec<UserSync> {
        if options.iframe_enabled {
            vec![UserSync::iframe(&self.config.sync_url)]
        } else if options.pixel_enabled {
            vec![UserSync::image(&self.config.sync_url)]
        } else {
            Vec::new()
        }
    }
}

/// Register the `tg` adapter when it is enabled.
#[must_use]
pub fn register_adapter(settings: &Settings) -> Vec<Arc<dyn BidAdapter>> {
    if !settings.tg.enabled {
        log::debug!("{TG_BIDDER_CODE} adapter is disabled");
        return Vec::new();
    }

    log::info!(
        "Registering {} adapter (endpoint: {})",
        TG_BIDDER_CODE,
        settings.tg.endpoint
    );
    vec![Arc::new(TgAdapter::new(settings.tg.clone()))]
}
