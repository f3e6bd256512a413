use std::sync::LazyLock;

use regex::Regex;

use crate::records::{PriceBucket, PriceObservation};

static DOLLAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*\d{1,3}(?:\.\d{1,2})?").unwrap());
static DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\.\d+").unwrap());

/// Inclusive band of plausible menu prices; everything else is treated as noise
/// (years, phone fragments, order numbers).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Dollar-prefixed tokens, falling back to bare `12.99` tokens when a page has none.
pub fn page_prices(text: &str, range: PriceRange) -> Vec<f64> {
    let mut tokens: Vec<&str> = DOLLAR_RE.find_iter(text).map(|m| m.as_str()).collect();
    if tokens.is_empty() {
        tokens = bare_decimals(text);
    }
    tokens
        .into_iter()
        .filter_map(|t| t.replace('$', "").trim().parse::<f64>().ok())
        .filter(|v| range.contains(*v))
        .collect()
}

/// Standalone `d{1,3}.dd` numbers, not embedded in longer digit runs.
fn bare_decimals(text: &str) -> Vec<&str> {
    DECIMAL_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|t| {
            let (whole, frac) = t.split_once('.').unwrap_or((t, ""));
            (1..=3).contains(&whole.len()) && frac.len() == 2
        })
        .collect()
}

/// Element at index `n / 2` of the sorted values (upper middle for even counts).
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(sorted[sorted.len() / 2])
}

/// Derive one observation for a page, or nothing when no in-range price is found.
pub fn observe(menu_url: &str, text: &str, range: PriceRange) -> Option<PriceObservation> {
    let prices = page_prices(text, range);
    let median_price = median(&prices)?;
    Some(PriceObservation {
        menu_url: menu_url.to_string(),
        median_price,
        price_bucket: PriceBucket::from_median(median_price),
    })
}
