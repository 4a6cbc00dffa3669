//! Outcome beacons ("bo" pixels).
//!
//! The first bid interpreted in a session reports how long the exchange took,
//! the price it returned and whether that happened inside the timeout budget.
//! The beacon is delivered as an image user sync.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::auction::context::QueryParams;
use crate::auction::session::{AuctionSession, UserSyncRegistrar};
use crate::auction::types::SyncType;
use crate::constants::BEACON_PATH;
use crate::http_util::parse_url_lenient;

/// Captures the directory of an impression tracker ending in `ri?...`.
static RECORD_PIXEL_BASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^?]+/)ri\?").expect("should compile record pixel pattern"));

/// Where the beacon endpoint is derived from.
#[derive(Debug, Clone, Copy)]
pub enum BeaconSource<'a> {
    /// Display and native bids: the creative's impression tracker.
    Display { impression_tracker: Option<&'a str> },
    /// Video bids: the `colo` redirect target and `ph` token from the VAST URL.
    Video {
        colo: Option<&'a str>,
        ph: Option<&'a str>,
    },
}

/// Values reported by one beacon.
#[derive(Debug, Clone, Copy)]
pub struct BeaconReport<'a> {
    pub source: BeaconSource<'a>,
    /// Price exactly as the exchange returned it.
    pub price: &'a str,
    /// Exchange server timestamp token.
    pub ts: Option<&'a str>,
}

/// Build the beacon query parameters in wire order.
#[must_use]
pub fn beacon_params(
    report: &BeaconReport<'_>,
    elapsed_ms: i64,
    budget_ms: u32,
    page_hostname: &str,
) -> QueryParams {
    let timed_out = i64::from(budget_ms) < elapsed_ms;

    let mut params = QueryParams::new();
    params.set("bd", elapsed_ms);
    params.set("bp", report.price);
    params.set("br", if timed_out { "t" } else { "p" });
    params.set("bs", page_hostname);
    params.set("bt", budget_ms);
    params.set("ts", report.ts.unwrap_or_default());
    if let BeaconSource::Video { ph, .. } = report.source {
        params.set("ph", ph.unwrap_or_default());
    }
    params
}

/// Resolve the beacon URL, or `None` when the source carries no usable base.
#[must_use]
pub fn beacon_url(report: &BeaconReport<'_>, params: &QueryParams) -> Option<String> {
    let query = params.to_compact_query_string();
    match report.source {
        BeaconSource::Display { impression_tracker } => {
            let tracker = impression_tracker?;
            let base = RECORD_PIXEL_BASE.captures(tracker)?.get(1)?.as_str();
            Some(format!("{base}bo?{query}"))
        }
        BeaconSource::Video { colo, .. } => {
            let host = parse_url_lenient(colo?)?.host_str()?.to_string();
            Some(format!("//{host}{BEACON_PATH}?{query}"))
        }
    }
}

/// Fire the session's beacon if it has not fired yet.
///
/// Consumes the session latch even when no URL can be derived, so a later bid
/// cannot report a different outcome for the same page. Returns the URL that
/// was registered.
pub fn register_beacon(
    session: &mut AuctionSession,
    bidder: &str,
    report: &BeaconReport<'_>,
    start_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<String> {
    if !session.try_consume_beacon() {
        return None;
    }

    let elapsed_ms = (now - start_time).num_milliseconds().max(0);
    let params = beacon_params(
        report,
        elapsed_ms,
        session.timeout_budget_ms(),
        session.page_hostname(),
    );

    let Some(url) = beacon_url(report, &params) else {
        log::debug!("{bidder}: no beacon endpoint found in response, skipping beacon");
        return None;
    };

    log::debug!("{bidder}: registering outcome beacon {url}");
    session.register_sync(SyncType::Image, bidder, &url);
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const TRACKER: &str =
        "https://rtb.example.net/w/1.0/ri?ts=abc&p=1&r=https%3A%2F%2Fexample.com%2Fx%3Fy";

    fn display_report(tracker: Option<&str>) -> BeaconReport<'_> {
        BeaconReport {
            source: BeaconSource::Display {
                impression_tracker: tracker,
            },
            price: "1500",
            ts: Some("ts-token"),
        }
    }

    #[test]
    fn display_beacon_uses_tracker_directory() {
        let report = display_report(Some(TRACKER));
        let params = beacon_params(&report, 120, 1000, "pub.example.com");
        let url = beacon_url(&report, &params).expect("should derive beacon url");

        assert_eq!(
            url,
            "https://rtb.example.net/w/1.0/bo?bd=120&bp=1500&br=p&bs=pub.example.com&bt=1000&ts=ts-token"
        );
    }

    #[test]
    fn beacon_reports_timeout_when_elapsed_exceeds_budget() {
        let report = display_report(Some(TRACKER));
        let params = beacon_params(&report, 1500, 1000, "pub.example.com");
        assert_eq!(params.get("br"), Some("t"));

        let params = beacon_params(&report, 1000, 1000, "pub.example.com");
        assert_eq!(params.get("br"), Some("p"));
    }

    #[test]
    fn display_beacon_without_record_pixel_is_suppressed() {
        let report = display_report(Some("https://rtb.example.net/w/1.0/imp?x=1"));
        let params = beacon_params(&report, 10, 1000, "pub.example.com");
        assert!(beacon_url(&report, &params).is_none());

        let report = display_report(None);
        assert!(beacon_url(&report, &params).is_none());
    }

    #[test]
    fn video_beacon_uses_colo_hostname_and_ph() {
        let report = BeaconReport {
            source: BeaconSource::Video {
                colo: Some("http://rtb-va.example.net"),
                ph: Some("ph/12+3="),
            },
            price: "2000",
            ts: Some("vts"),
        };
        let params = beacon_params(&report, 0, 800, "pub.example.com");
        let url = beacon_url(&report, &params).expect("should derive beacon url");

        // bd=0 is falsy and dropped from the pixel; values go out unescaped.
        assert_eq!(
            url,
            "//rtb-va.example.net/w/1.0/bo?bp=2000&br=p&bs=pub.example.com&bt=800&ts=vts&ph=ph/12+3="
        );
    }

    #[test]
    fn register_beacon_fires_once_per_session() {
        let mut session = AuctionSession::new("pub.example.com", 1000);
        let start = Utc::now() - Duration::milliseconds(50);
        let report = display_report(Some(TRACKER));

        let first = register_beacon(&mut session, "targetinggates", &report, start, Utc::now());
        let second = register_beacon(&mut session, "targetinggates", &report, start, Utc::now());

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(session.registered_syncs().len(), 1);
        assert_eq!(session.registered_syncs()[0].sync_type, SyncType::Image);
        assert_eq!(session.registered_syncs()[0].bidder, "targetinggates");

        session.reset();
        assert!(register_beacon(&mut session, "targetinggates", &report, start, Utc::now()).is_some());
    }

    #[test]
    fn register_beacon_consumes_latch_without_endpoint() {
        let mut session = AuctionSession::new("pub.example.com", 1000);
        let start = Utc::now();

        let missing = display_report(None);
        assert!(register_beacon(&mut session, "targetinggates", &missing, start, start).is_none());
        assert!(session.beacon_fired());
        assert!(session.registered_syncs().is_empty());

        let report = display_report(Some(TRACKER));
        assert!(register_beacon(&mut session, "targetinggates", &report, start, start).is_none());
    }

    #[test]
    fn register_beacon_clamps_negative_elapsed() {
        let mut session = AuctionSession::new("pub.example.com", 1000);
        let now = Utc::now();
        let report = display_report(Some(TRACKER));

        let url = register_beacon(
            &mut session,
            "targetinggates",
            &report,
            now + Duration::seconds(5),
            now,
        )
        .expect("should register beacon");
        assert!(!url.contains("bd="));
        assert!(url.contains("br=p"));
    }
}
