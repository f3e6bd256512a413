pub mod blocks;
pub mod items;
pub mod pdf;
pub mod prices;

use crate::records::MenuItem;

/// HTML path: element texts → items, in document order.
pub fn items_from_html(html: &str, source_url: &str) -> Vec<MenuItem> {
    blocks::text_blocks(html)
        .iter()
        .filter_map(|t| items::parse_block(t, source_url))
        .collect()
}

/// PDF path: each non-blank line is parsed like an HTML block.
pub fn items_from_pdf_text(text: &str, source_url: &str) -> Vec<MenuItem> {
    pdf::lines(text)
        .filter_map(|l| items::parse_block(l, source_url))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://cornerbistro.com/menu";

    #[test]
    fn bistro_fixture_items() {
        let html = std::fs::read_to_string("tests/fixtures/bistro_menu.html").unwrap();
        let items = items_from_html(&html, URL);
        let names: Vec<&str> = items.iter().map(|i| i.item_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Caesar Salad",
                "Tomato Soup Cup",
                "Crispy Calamari",
                "Steak Frites",
                "Roast Chicken",
                "Market Fish",
            ]
        );

        let caesar = &items[0];
        assert_eq!(caesar.price, 12.99);
        assert_eq!(caesar.calories_kcal, Some(450));

        let steak = &items[3];
        assert_eq!(steak.price, 34.0);
        assert_eq!(steak.calories_kcal, Some(1120));
        assert_eq!(steak.calories_text.as_deref(), Some("Calories: 1120"));

        assert!(items.iter().all(|i| i.source_url == URL));
    }

    #[test]
    fn pdf_lines_parse_like_blocks() {
        let text = "LUNCH\n\nClub Sandwich ........ 11.95\n  Soup of the Day - $5 (kcal 210)\nOpen 11-3\n";
        let items = items_from_pdf_text(text, URL);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_name, "Club Sandwich ........");
        assert_eq!(items[0].price, 11.95);
        assert_eq!(items[1].item_name, "Soup of the Day");
        assert_eq!(items[1].calories_kcal, Some(210));
    }

    #[test]
    fn empty_inputs_yield_nothing() {
        assert!(items_from_html("", URL).is_empty());
        assert!(items_from_pdf_text("", URL).is_empty());
    }
}
