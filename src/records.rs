use std::fmt;

use serde::{Deserialize, Serialize};

/// A probed URL suspected to host menu content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub root: String,
    #[serde(default)]
    pub menu_url: String,
    #[serde(default)]
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub item_name: String,
    pub item_desc: Option<String>,
    pub price: f64,
    pub calories_kcal: Option<u32>,
    pub calories_text: Option<String>,
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub menu_url: String,
    pub median_price: f64,
    pub price_bucket: PriceBucket,
}

/// Four-tier price label. Ordered cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriceBucket {
    #[serde(rename = "$")]
    Cheap,
    #[serde(rename = "$$")]
    Moderate,
    #[serde(rename = "$$$")]
    Pricey,
    #[serde(rename = "$$$$")]
    Premium,
}

impl PriceBucket {
    pub fn from_median(median: f64) -> Self {
        if median < 10.0 {
            PriceBucket::Cheap
        } else if median < 20.0 {
            PriceBucket::Moderate
        } else if median < 35.0 {
            PriceBucket::Pricey
        } else {
            PriceBucket::Premium
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriceBucket::Cheap => "$",
            PriceBucket::Moderate => "$$",
            PriceBucket::Pricey => "$$$",
            PriceBucket::Premium => "$$$$",
        }
    }
}

impl fmt::Display for PriceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
