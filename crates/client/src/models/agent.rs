//! Catalog agent types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use agent_market_core::{AgentId, Category, Price, UserId};

use crate::media::resolve_image_url;

/// Seller reference embedded in an agent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seller {
    /// Seller's user ID.
    pub id: UserId,
    /// Seller display name.
    pub name: String,
    /// Whether the marketplace has verified this seller.
    #[serde(default, alias = "is_verified")]
    pub verified: bool,
}

/// A purchasable AI agent listed in the catalog.
///
/// Most fields default when absent so that older or leaner backend payloads
/// still decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub long_description: Option<String>,
    pub price: Price,
    /// Backend category name. Kept as a string so unknown categories survive.
    pub category: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub reviews_count: u32,
    #[serde(default)]
    pub sales_count: u32,
    #[serde(default)]
    pub seller: Option<Seller>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub api_access: bool,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub response_time: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Agent {
    /// Whether this agent belongs to the given category selection.
    #[must_use]
    pub fn in_category(&self, category: Category) -> bool {
        category.matches(&self.category)
    }

    /// Thumbnail resolved against the media origin, or `""`.
    #[must_use]
    pub fn thumbnail_url(&self, media_origin: &Url) -> String {
        self.thumbnail
            .as_deref()
            .map(|path| resolve_image_url(media_origin, path))
            .unwrap_or_default()
    }

    /// Gallery images resolved against the media origin, blanks dropped.
    #[must_use]
    pub fn gallery_urls(&self, media_origin: &Url) -> Vec<String> {
        self.images
            .iter()
            .map(|path| resolve_image_url(media_origin, path))
            .filter(|url| !url.is_empty())
            .collect()
    }

    /// Whether `user_id` is the listed seller.
    #[must_use]
    pub fn is_sold_by(&self, user_id: UserId) -> bool {
        self.seller.as_ref().is_some_and(|s| s.id == user_id)
    }
}
