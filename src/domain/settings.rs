//! Run configuration.
//!
//! Every knob the pipeline reads lives here and is passed into
//! `RecallPipeline::new`. Settings load from a JSON file; any field other than
//! `persistence_mode` may be omitted and falls back to the values below.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::models::PersistenceMode;
use crate::error::{AppError, Result};

/// Hashtag emitted when `keyword` occurs in a reason clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    pub keyword: String,
    pub hashtag: String,
}

/// Safety advice sentence used when `keyword` occurs in a reason clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceRule {
    pub keyword: String,
    pub advice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallSettings {
    #[serde(default = "defaults::base_url")]
    pub base_url: String,
    #[serde(default = "defaults::listing_url")]
    pub listing_url: String,
    #[serde(default = "defaults::request_headers")]
    pub request_headers: BTreeMap<String, String>,
    #[serde(default = "defaults::table_selector")]
    pub table_selector: String,
    #[serde(default = "defaults::gallery_selector")]
    pub gallery_selector: String,
    #[serde(default = "defaults::excluded_categories")]
    pub excluded_categories: Vec<String>,
    #[serde(default = "defaults::allergen_tags")]
    pub allergen_tags: Vec<TagRule>,
    #[serde(default = "defaults::fixed_hashtags")]
    pub fixed_hashtags: String,
    #[serde(default = "defaults::safety_advice")]
    pub safety_advice: Vec<AdviceRule>,
    #[serde(default = "defaults::default_safety_advice")]
    pub default_safety_advice: String,
    #[serde(default = "defaults::request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Required: the store layout differs between modes and neither is assumed.
    pub persistence_mode: PersistenceMode,
    #[serde(default = "defaults::store_path")]
    pub store_path: PathBuf,
    #[serde(default = "defaults::image_dir")]
    pub image_dir: PathBuf,
    #[serde(default = "defaults::default_image_extension")]
    pub default_image_extension: String,
    #[serde(default)]
    pub track_terminated: bool,
}

impl RecallSettings {
    /// Built-in configuration for the FDA recalls listing.
    pub fn defaults_with_mode(persistence_mode: PersistenceMode) -> Self {
        Self {
            base_url: defaults::base_url(),
            listing_url: defaults::listing_url(),
            request_headers: defaults::request_headers(),
            table_selector: defaults::table_selector(),
            gallery_selector: defaults::gallery_selector(),
            excluded_categories: defaults::excluded_categories(),
            allergen_tags: defaults::allergen_tags(),
            fixed_hashtags: defaults::fixed_hashtags(),
            safety_advice: defaults::safety_advice(),
            default_safety_advice: defaults::default_safety_advice(),
            request_delay_ms: defaults::request_delay_ms(),
            request_timeout_secs: defaults::request_timeout_secs(),
            persistence_mode,
            store_path: defaults::store_path(),
            image_dir: defaults::image_dir(),
            default_image_extension: defaults::default_image_extension(),
            track_terminated: false,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(raw)
            .map_err(|e| AppError::config(format!("invalid settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| AppError::InvalidUrl(format!("{}: {e}", self.base_url)))
    }

    pub fn validate(&self) -> Result<()> {
        self.base()?;
        Url::parse(&self.listing_url)
            .map_err(|e| AppError::InvalidUrl(format!("{}: {e}", self.listing_url)))?;
        if self.request_timeout_secs == 0 {
            return Err(AppError::config("request_timeout_secs must be positive"));
        }
        if self.default_image_extension.is_empty()
            || !self
                .default_image_extension
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        {
            return Err(AppError::config(format!(
                "default_image_extension must be alphanumeric, got {:?}",
                self.default_image_extension
            )));
        }
        for selector in [&self.table_selector, &self.gallery_selector] {
            scraper::Selector::parse(selector)
                .map_err(|e| AppError::config(format!("invalid selector {selector:?}: {e}")))?;
        }
        Ok(())
    }
}

mod defaults {
    use super::{AdviceRule, TagRule};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    pub fn base_url() -> String {
        "https://www.fda.gov".to_string()
    }

    pub fn listing_url() -> String {
        "https://www.fda.gov/safety/recalls-market-withdrawals-safety-alerts".to_string()
    }

    pub fn request_headers() -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                "User-Agent".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
            ),
            (
                "Accept".to_string(),
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8".to_string(),
            ),
            ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
        ])
    }

    pub fn table_selector() -> String {
        "table.lcds-datatable".to_string()
    }

    pub fn gallery_selector() -> String {
        "div.lcds-gallery".to_string()
    }

    pub fn excluded_categories() -> Vec<String> {
        [
            "Animal & Veterinary",
            "Cosmetics",
            "Medical Devices",
            "Drugs",
            "Biologics",
            "Tobacco",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    pub fn allergen_tags() -> Vec<TagRule> {
        [
            ("milk", "#MilkAllergy"),
            ("peanut", "#PeanutAllergy"),
            ("egg", "#EggAllergy"),
            ("soy", "#SoyAllergy"),
            ("wheat", "#WheatAllergy"),
            ("tree nut", "#TreeNutAllergy"),
            ("fish", "#FishAllergy"),
            ("shellfish", "#ShellfishAllergy"),
            ("gluten", "#GlutenFree"),
        ]
        .into_iter()
        .map(|(keyword, hashtag)| TagRule {
            keyword: keyword.to_string(),
            hashtag: hashtag.to_string(),
        })
        .collect()
    }

    pub fn fixed_hashtags() -> String {
        "#FoodSafety #RecallAlert".to_string()
    }

    pub fn safety_advice() -> Vec<AdviceRule> {
        vec![AdviceRule {
            keyword: "milk".to_string(),
            advice: "People who have an allergy or severe sensitivity to milk run the risk of a serious or life-threatening allergic reaction if they consume this product.".to_string(),
        }]
    }

    pub fn default_safety_advice() -> String {
        "Consumers who have purchased this product should not consume it and should return it to the place of purchase for a full refund.".to_string()
    }

    pub fn request_delay_ms() -> u64 {
        1000
    }

    pub fn request_timeout_secs() -> u64 {
        30
    }

    pub fn store_path() -> PathBuf {
        PathBuf::from("recalls.csv")
    }

    pub fn image_dir() -> PathBuf {
        PathBuf::from("recall_images")
    }

    pub fn default_image_extension() -> String {
        "jpg".to_string()
    }
}
