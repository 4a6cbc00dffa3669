//! Adapter configuration.
//!
//! Settings are read from TOML and may be overridden through the environment
//! with the `TARGETINGGATES__` prefix and `__` as the section separator:
//!
//! ```bash
//! TARGETINGGATES__TG__ENDPOINT="//adtg.example/delivery/pdirect.php?sl=prebid"
//! TARGETINGGATES__TARGETINGGATES__ENABLED=false
//! TARGETINGGATES__CONSENT_MANAGEMENT__CMP_API=static
//! ```

use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AdapterError;

const ENVIRONMENT_PREFIX: &str = "TARGETINGGATES";

/// Settings for the legacy query-string adapter.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct TargetingGatesConfig {
    pub enabled: bool,
    /// Prefix of the default `bc` request parameter.
    #[validate(length(min = 1))]
    pub bidder_config: String,
    /// Suffix of the default `bc` request parameter.
    #[validate(length(min = 1))]
    pub bidder_version: String,
    /// Time-to-live reported on every bid, in seconds.
    #[validate(range(min = 1))]
    pub ttl_secs: u32,
    /// `true` when prices are net, `false` when gross.
    pub net_revenue: bool,
    /// Currency used when an ad unit omits one.
    #[validate(length(equal = 3))]
    pub default_currency: String,
    /// Fallback iframe sync URL when the response carries no pixels.
    #[validate(length(min = 1))]
    pub sync_url: String,
}

impl Default for TargetingGatesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bidder_config: "hb_pb".to_string(),
            bidder_version: "1.0.0".to_string(),
            ttl_secs: 300,
            net_revenue: true,
            default_currency: "USD".to_string(),
            sync_url: "//adtg.widerplanet.com/delivery/pdirect.php".to_string(),
        }
    }
}

impl TargetingGatesConfig {
    /// Default value of the `bc` parameter, e.g. `hb_pb_1.0.0`.
    #[must_use]
    pub fn default_bc(&self) -> String {
        format!("{}_{}", self.bidder_config, self.bidder_version)
    }
}

/// Native asset defaults used when the publisher leaves a field unset.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct NativeDefaults {
    #[validate(range(min = 1))]
    pub title_len: u32,
    #[validate(range(min = 1))]
    pub descr_len: u32,
    #[validate(range(min = 1))]
    pub sponsored_by_len: u32,
    #[validate(range(min = 1))]
    pub img_min: u32,
    #[validate(range(min = 1))]
    pub icon_min: u32,
    #[validate(length(min = 1))]
    pub version: String,
}

impl Default for NativeDefaults {
    fn default() -> Self {
        Self {
            title_len: 80,
            descr_len: 200,
            sponsored_by_len: 50,
            img_min: 150,
            icon_min: 50,
            version: "1.1".to_string(),
        }
    }
}

/// Settings for the `OpenRTB` adapter.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct TgConfig {
    pub enabled: bool,
    #[validate(length(min = 1))]
    pub endpoint: String,
    #[validate(length(min = 1))]
    pub sync_url: String,
    #[validate(range(min = 1))]
    pub ttl_secs: u32,
    #[validate(length(equal = 3))]
    pub currency: String,
    pub net_revenue: bool,
    #[validate(nested)]
    pub native: NativeDefaults,
}

impl Default for TgConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "//adtg.widerplanet.com/delivery/pdirect.php?sl=prebid".to_string(),
            sync_url: "//astg.widerplanet.com/delivery/wpg.php".to_string(),
            ttl_secs: 20,
            currency: "KRW".to_string(),
            net_revenue: true,
            native: NativeDefaults::default(),
        }
    }
}

/// Mirror of the host's consent-management configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsentManagement {
    /// CMP API in use on the page (`iab`, `static`, ...).
    pub cmp_api: Option<String>,
}

impl ConsentManagement {
    #[must_use]
    pub fn is_iab(&self) -> bool {
        self.cmp_api.as_deref() == Some("iab")
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct Settings {
    #[validate(nested)]
    pub targetinggates: TargetingGatesConfig,
    #[validate(nested)]
    pub tg: TgConfig,
    pub consent_management: ConsentManagement,
}

impl Settings {
    /// Load the settings embedded at build time, applying environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the embedded TOML or an
    /// environment override is invalid.
    pub fn new() -> Result<Self, Report<AdapterError>> {
        Self::from_toml(include_str!("../../../targetinggates.toml"))
    }

    /// Parse settings from a TOML string, applying environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the TOML cannot be parsed or
    /// the resulting settings fail validation.
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<AdapterError>> {
        let environment = Environment::default()
            .prefix(ENVIRONMENT_PREFIX)
            .separator("__");

        let toml = File::from_str(toml_str, FileFormat::Toml);
        let settings: Self = Config::builder()
            .add_source(toml)
            .add_source(environment)
            .build()
            .and_then(Config::try_deserialize)
            .change_context(AdapterError::Configuration {
                message: "Failed to load settings".to_string(),
            })?;

        settings
            .validate()
            .change_context(AdapterError::Configuration {
                message: "Settings failed validation".to_string(),
            })?;

        Ok(settings)
    }
}
