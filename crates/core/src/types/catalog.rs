//! Catalog browse selections: category and sort order.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a category name is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown category: {0}")]
pub struct CategoryParseError(pub String);

/// Error returned when a sort key is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown sort key: {0} (expected popular, newest, rating, price-low or price-high)")]
pub struct SortKeyParseError(pub String);

/// Catalog category selection.
///
/// `All` is a browse-only value; agents themselves always carry a concrete
/// category string, which may be one the client does not know about yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    #[default]
    All,
    #[serde(rename = "Customer Service")]
    CustomerService,
    #[serde(rename = "Content Creation")]
    ContentCreation,
    #[serde(rename = "Data Analysis")]
    DataAnalysis,
    Development,
    Marketing,
    Sales,
    Productivity,
    Research,
}

impl Category {
    /// Every selectable category, `All` first.
    pub const ALL: [Self; 9] = [
        Self::All,
        Self::CustomerService,
        Self::ContentCreation,
        Self::DataAnalysis,
        Self::Development,
        Self::Marketing,
        Self::Sales,
        Self::Productivity,
        Self::Research,
    ];

    /// Name used on the wire and in the UI.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::CustomerService => "Customer Service",
            Self::ContentCreation => "Content Creation",
            Self::DataAnalysis => "Data Analysis",
            Self::Development => "Development",
            Self::Marketing => "Marketing",
            Self::Sales => "Sales",
            Self::Productivity => "Productivity",
            Self::Research => "Research",
        }
    }

    /// Whether an agent tagged with `category` belongs to this selection.
    ///
    /// `All` matches everything. Otherwise the comparison ignores ASCII case
    /// and surrounding whitespace.
    #[must_use]
    pub fn matches(&self, category: &str) -> bool {
        match self {
            Self::All => true,
            other => other.as_str().eq_ignore_ascii_case(category.trim()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CategoryParseError;

    /// Accepts the display name or a slug (`data-analysis`, `data_analysis`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['-', '_'], " ");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| CategoryParseError(s.to_string()))
    }
}

/// Catalog sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    Popular,
    Newest,
    Rating,
    PriceLow,
    PriceHigh,
}

impl SortKey {
    /// Value sent as the `sort_by` query parameter.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Popular => "popular",
            Self::Newest => "newest",
            Self::Rating => "rating",
            Self::PriceLow => "price-low",
            Self::PriceHigh => "price-high",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = SortKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "popular" => Ok(Self::Popular),
            "newest" => Ok(Self::Newest),
            "rating" => Ok(Self::Rating),
            "price-low" => Ok(Self::PriceLow),
            "price-high" => Ok(Self::PriceHigh),
            _ => Err(SortKeyParseError(s.to_string())),
        }
    }
}
