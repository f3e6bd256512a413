use std::sync::LazyLock;

use regex::Regex;

use crate::records::MenuItem;

/// `$12`, `$ 12.99`, or a bare `12.99`.
static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*\d{1,3}(?:\.\d{1,2})?|\b\d{1,3}\.\d{2}\b").unwrap());

/// `Calories: 450`, `kcal 320`. A number running on into a decimal is a price, not calories.
static CAL_LEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:calories|cal|kcal)\b[:\s]*(\d{2,4})\b").unwrap()
});

/// `450 cal`; the number must not be the tail of a price.
static CAL_TRAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^\d.,$])((\d{2,4})\s*(?:calories|cal|kcal)\b)").unwrap()
});

static DASH_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*[-–—•·]+\s*").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const NAME_EDGE: &[char] = &[':', '-', '•', '·', '–', '—', ' '];
const MAX_NAME_CHARS: usize = 160;

/// Parse one text block (HTML element text or PDF line) into a menu item.
///
/// The name is whatever precedes the first price token; the calorie annotation
/// is searched across the whole block.
pub fn parse_block(text: &str, source_url: &str) -> Option<MenuItem> {
    let first = PRICE_RE.find(text)?;
    let name = normalize_name(&text[..first.start()]);
    if name.is_empty() {
        return None;
    }

    let price = parse_price(first.as_str())?;
    let (calories_kcal, calories_text) = match find_calories(text) {
        Some((kcal, span)) => (Some(kcal), Some(span)),
        None => (None, None),
    };

    Some(MenuItem {
        item_name: name,
        item_desc: None,
        price,
        calories_kcal,
        calories_text,
        source_url: source_url.to_string(),
    })
}

/// Strip edge bullets/dashes, fold interior dash runs into a space, cap length.
pub fn normalize_name(raw: &str) -> String {
    let trimmed = raw.trim_matches(NAME_EDGE).trim();
    let folded = DASH_RUN_RE.replace_all(trimmed, " ");
    let collapsed = SPACE_RE.replace_all(&folded, " ");
    let capped: String = collapsed.trim().chars().take(MAX_NAME_CHARS).collect();
    capped.trim_end().to_string()
}

/// `$ 12.99` → 12.99; zero is not a price.
pub fn parse_price(token: &str) -> Option<f64> {
    let value: f64 = token.replace('$', "").trim().parse().ok()?;
    if value > 0.0 {
        Some(value)
    } else {
        None
    }
}

/// Calorie count plus the verbatim matched span. Keyword-first wins.
pub fn find_calories(text: &str) -> Option<(u32, String)> {
    let lead = CAL_LEAD_RE.captures_iter(text).find(|caps| {
        let rest = &text[caps.get(1).map_or(0, |m| m.end())..];
        !runs_into_decimal(rest)
    });
    if let Some(caps) = lead {
        let kcal = caps[1].parse().ok()?;
        return Some((kcal, caps[0].to_string()));
    }
    let caps = CAL_TRAIL_RE.captures(text)?;
    let kcal = caps[2].parse().ok()?;
    Some((kcal, caps[1].to_string()))
}

/// `.99` or `,50` right after a number.
fn runs_into_decimal(rest: &str) -> bool {
    let mut chars = rest.chars();
    matches!(chars.next(), Some('.' | ','))
        && chars.next().is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://bistro.com/menu";

    #[test]
    fn caesar_salad_literal() {
        let item = parse_block("Caesar Salad - $12.99 · 450 cal", URL).unwrap();
        assert_eq!(item.item_name, "Caesar Salad");
        assert_eq!(item.price, 12.99);
        assert_eq!(item.calories_kcal, Some(450));
        assert_eq!(item.calories_text.as_deref(), Some("450 cal"));
        assert_eq!(item.item_desc, None);
        assert_eq!(item.source_url, URL);
    }

    #[test]
    fn keyword_before_number() {
        let item = parse_block("Burger $14 Calories: 820", URL).unwrap();
        assert_eq!(item.item_name, "Burger");
        assert_eq!(item.price, 14.0);
        assert_eq!(item.calories_kcal, Some(820));
        assert_eq!(item.calories_text.as_deref(), Some("Calories: 820"));
    }

    #[test]
    fn bare_decimal_price() {
        let item = parse_block("• Margherita Pizza 15.50", URL).unwrap();
        assert_eq!(item.item_name, "Margherita Pizza");
        assert_eq!(item.price, 15.5);
        assert_eq!(item.calories_kcal, None);
        assert_eq!(item.calories_text, None);
    }

    #[test]
    fn dollar_with_space() {
        let item = parse_block("Fries: $ 4.5", URL).unwrap();
        assert_eq!(item.item_name, "Fries");
        assert_eq!(item.price, 4.5);
    }

    #[test]
    fn split_at_first_price_only() {
        let item = parse_block("Wings 6 pc $9.99 / 12 pc $17.99", URL).unwrap();
        assert_eq!(item.item_name, "Wings 6 pc");
        assert_eq!(item.price, 9.99);
    }

    #[test]
    fn interior_dashes_collapse() {
        let item = parse_block("Soup — of the — Day • Cup $5", URL).unwrap();
        assert_eq!(item.item_name, "Soup of the Day Cup");
    }

    #[test]
    fn no_price_no_item() {
        assert!(parse_block("Open daily from 11 to 9", URL).is_none());
        assert!(parse_block("Call 773-555-1234", URL).is_none());
    }

    #[test]
    fn price_without_name_skipped() {
        assert!(parse_block("$12.99", URL).is_none());
        assert!(parse_block(" - $12.99", URL).is_none());
    }

    #[test]
    fn zero_price_skipped() {
        assert!(parse_block("Water $0", URL).is_none());
        assert!(parse_block("Water 0.00", URL).is_none());
    }

    #[test]
    fn name_capped() {
        let long = format!("{} $10", "a".repeat(170));
        let item = parse_block(&long, URL).unwrap();
        assert_eq!(item.item_name.chars().count(), 160);
    }

    #[test]
    fn calories_do_not_grab_price_cents() {
        assert_eq!(find_calories("Shake $5.99 cal"), None);
        assert_eq!(find_calories("Shake (kcal 610)").map(|c| c.0), Some(610));
    }

    #[test]
    fn middle_dot_trimmed_from_name_edges() {
        let item = parse_block("Caesar Salad · $12.99", URL).unwrap();
        assert_eq!(item.item_name, "Caesar Salad");
        assert!(parse_block("· $4.50", URL).is_none());
        assert!(parse_block(" · - • $4.50", URL).is_none());
    }

    #[test]
    fn capped_name_has_no_trailing_space() {
        let long = format!("{} tail $10", "a".repeat(159));
        let item = parse_block(&long, URL).unwrap();
        assert_eq!(item.item_name, "a".repeat(159));
    }

    #[test]
    fn calories_before_trailing_price() {
        let item = parse_block("Caesar Salad 450 cal 12.99", URL).unwrap();
        assert_eq!(item.item_name, "Caesar Salad 450 cal");
        assert_eq!(item.price, 12.99);
        assert_eq!(item.calories_kcal, Some(450));
        assert_eq!(item.calories_text.as_deref(), Some("450 cal"));
    }

    #[test]
    fn keyword_then_price_is_not_calories() {
        assert_eq!(find_calories("Kids meal, cal 12.99"), None);
        assert_eq!(
            find_calories("Cal 5.99 Calories: 640").map(|c| c.0),
            Some(640)
        );
    }
}
