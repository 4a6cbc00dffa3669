use std::collections::HashMap;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Subset of an `OpenRTB` 2.x bid request sent by the `tg` adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenRtbRequest {
    pub id: String,
    pub imp: Vec<Imp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regs: Option<Regs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Imp {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<NativeImp>,
    pub tagid: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Banner {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NativeImp {
    /// JSON-encoded native request (`{"assets": [...]}`).
    pub request: String,
    pub ver: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Publisher {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Site {
    pub publisher: Publisher,
    #[serde(rename = "ref")]
    pub referrer: String,
    pub page: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct App {
    pub publisher: Publisher,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storeurl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Device {
    pub ua: String,
    pub js: u8,
    pub dnt: u8,
    pub h: u32,
    pub w: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Regs {
    pub ext: RegsExt,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegsExt {
    pub gdpr: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub ext: UserExt,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserExt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent: Option<String>,
}

/// Subset of an `OpenRTB` 2.x bid response returned by the exchange.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OpenRtbResponse {
    #[serde(default)]
    pub seatbid: Vec<SeatBid>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SeatBid {
    #[serde(default)]
    pub bid: Vec<Bid>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bid {
    #[serde(default)]
    pub impid: String,
    #[serde(
        default,
        deserialize_with = "lenient_price",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<BidExt>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PriceInput {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

/// Accept a price sent as a number or a numeric string; anything else is no price.
fn lenient_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<PriceInput>::deserialize(deserializer)? {
        Some(PriceInput::Number(price)) => Some(price),
        Some(PriceInput::Text(text)) => text.trim().parse().ok(),
        Some(PriceInput::Other(_)) | None => None,
    })
}

/// Exchange overrides of the adapter's bid defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BidExt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(
        default,
        rename = "netRevenue",
        skip_serializing_if = "Option::is_none"
    )]
    pub net_revenue: Option<bool>,
}
