//! Native ad assets: request encoding and response reassembly.
//!
//! Assets are identified by a fixed type scheme: the title asset is implicit,
//! data assets carry type 1 (sponsor) or 2 (body text), and image assets carry
//! type 1 (icon) or 3 (main image).

use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};

use crate::auction::types::{NativeAd, NativeAssetParams, NativeParams};
use crate::error::AdapterError;
use crate::settings::NativeDefaults;

/// Data asset types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataAssetType {
    Sponsored = 1,
    Description = 2,
}

/// Image asset types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ImageAssetType {
    Icon = 1,
    Main = 3,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TitleRequest {
    pub len: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageRequest {
    #[serde(rename = "type")]
    pub img_type: u8,
    pub wmin: u32,
    pub hmin: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataRequest {
    #[serde(rename = "type")]
    pub data_type: u8,
    pub len: u32,
}

/// One requested asset; exactly one of `title`, `img` or `data` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetRequest {
    pub id: u32,
    pub required: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<TitleRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img: Option<ImageRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DataRequest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NativeRequest {
    pub assets: Vec<AssetRequest>,
}

impl NativeRequest {
    /// Build the asset list for a slot, numbering assets in request order.
    #[must_use]
    pub fn from_params(params: &NativeParams, defaults: &NativeDefaults) -> Self {
        let mut request = Self::default();

        if let Some(title) = &params.title {
            request.push(title, |p| {
                AssetKind::Title(TitleRequest {
                    len: p.len.unwrap_or(defaults.title_len),
                })
            });
        }
        if let Some(body) = &params.body {
            request.push(body, |p| {
                AssetKind::Data(data_request(p, DataAssetType::Description, defaults.descr_len))
            });
        }
        if let Some(sponsored_by) = &params.sponsored_by {
            request.push(sponsored_by, |p| {
                AssetKind::Data(data_request(
                    p,
                    DataAssetType::Sponsored,
                    defaults.sponsored_by_len,
                ))
            });
        }
        if let Some(icon) = &params.icon {
            request.push(icon, |p| {
                AssetKind::Image(image_request(p, ImageAssetType::Icon, defaults.icon_min))
            });
        }
        if let Some(image) = &params.image {
            request.push(image, |p| {
                AssetKind::Image(image_request(p, ImageAssetType::Main, defaults.img_min))
            });
        }

        request
    }

    fn push(
        &mut self,
        params: &NativeAssetParams,
        kind: impl FnOnce(&NativeAssetParams) -> AssetKind,
    ) {
        let id = u32::try_from(self.assets.len() + 1).unwrap_or(u32::MAX);
        let mut asset = AssetRequest {
            id,
            required: u8::from(params.required),
            title: None,
            img: None,
            data: None,
        };
        match kind(params) {
            AssetKind::Title(title) => asset.title = Some(title),
            AssetKind::Image(img) => asset.img = Some(img),
            AssetKind::Data(data) => asset.data = Some(data),
        }
        self.assets.push(asset);
    }
}

enum AssetKind {
    Title(TitleRequest),
    Image(ImageRequest),
    Data(DataRequest),
}

fn data_request(
    params: &NativeAssetParams,
    data_type: DataAssetType,
    default_len: u32,
) -> DataRequest {
    DataRequest {
        data_type: data_type as u8,
        len: params.len.unwrap_or(default_len),
    }
}

fn image_request(
    params: &NativeAssetParams,
    img_type: ImageAssetType,
    default_min: u32,
) -> ImageRequest {
    ImageRequest {
        img_type: img_type as u8,
        wmin: params.wmin.unwrap_or(default_min),
        hmin: params.hmin.unwrap_or(default_min),
    }
}

// Response side

#[derive(Debug, Deserialize)]
struct NativeMarkup {
    native: Option<NativeResponse>,
}

#[derive(Debug, Default, Deserialize)]
struct NativeResponse {
    #[serde(default)]
    assets: Vec<ResponseAsset>,
    link: Option<Link>,
    #[serde(default)]
    imptrackers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Link {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseAsset {
    title: Option<TitleAsset>,
    data: Option<DataAsset>,
    img: Option<ImageAsset>,
}

#[derive(Debug, Deserialize)]
struct TitleAsset {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DataAsset {
    #[serde(rename = "type")]
    data_type: Option<u8>,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageAsset {
    #[serde(rename = "type")]
    img_type: Option<u8>,
    url: Option<String>,
}

/// Named field a response asset fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NativeField {
    Title,
    SponsoredBy,
    Body,
    Icon,
    Image,
}

impl ResponseAsset {
    fn fields(&self) -> Vec<(NativeField, Option<&str>)> {
        let mut fields = Vec::new();
        if let Some(title) = &self.title {
            fields.push((NativeField::Title, title.text.as_deref()));
        }
        if let Some(data) = &self.data {
            match data.data_type {
                Some(t) if t == DataAssetType::Sponsored as u8 => {
                    fields.push((NativeField::SponsoredBy, data.value.as_deref()));
                }
                Some(t) if t == DataAssetType::Description as u8 => {
                    fields.push((NativeField::Body, data.value.as_deref()));
                }
                _ => {}
            }
        }
        if let Some(img) = &self.img {
            match img.img_type {
                Some(t) if t == ImageAssetType::Icon as u8 => {
                    fields.push((NativeField::Icon, img.url.as_deref()));
                }
                Some(t) if t == ImageAssetType::Main as u8 => {
                    fields.push((NativeField::Image, img.url.as_deref()));
                }
                _ => {}
            }
        }
        fields
    }
}

/// Reassemble native fields from a bid's `adm` markup.
///
/// # Errors
///
/// Returns [`AdapterError::ResponseParse`] if the markup is not JSON or has no
/// `native` object.
pub fn parse_native_markup(adm: &str) -> Result<NativeAd, Report<AdapterError>> {
    let markup: NativeMarkup =
        serde_json::from_str(adm).change_context(AdapterError::ResponseParse {
            message: "Native markup is not valid JSON".to_string(),
        })?;
    let native = markup.native.ok_or_else(|| {
        Report::new(AdapterError::ResponseParse {
            message: "Native markup has no native object".to_string(),
        })
    })?;

    let mut ad = NativeAd::default();
    for asset in &native.assets {
        for (field, value) in asset.fields() {
            let value = value.map(str::to_string);
            match field {
                NativeField::Title => ad.title = value,
                NativeField::SponsoredBy => ad.sponsored_by = value,
                NativeField::Body => ad.body = value,
                NativeField::Icon => ad.icon = value,
                NativeField::Image => ad.image = value,
            }
        }
    }

    ad.click_url = native
        .link
        .and_then(|link| link.url)
        .map(|url| urlencoding::encode(&url).into_owned());
    ad.impression_trackers = native.imptrackers;

    Ok(ad)
}
