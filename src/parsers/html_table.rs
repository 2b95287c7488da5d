use scraper::{ElementRef, Html, Selector};

/// A table located within a newsletter HTML body: header cells (lowercased,
/// "trade" qualifier stripped) plus the body rows beneath it, verbatim.
#[derive(Debug, Clone)]
pub struct LocatedTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Scans every `<table>` in `html` for the first whose header row contains
/// all of `required_tokens` (case-insensitive; an optional "Trade"
/// qualifier on a column name is ignored, so "Buy" and "Buy Trade" both
/// match `"buy"`).
pub fn locate_table(html: &str, required_tokens: &[&str]) -> Option<LocatedTable> {
    let document = Html::parse_document(html);
    let table_selector = Selector::parse("table").ok()?;
    let row_selector = Selector::parse("tr").ok()?;
    let cell_selector = Selector::parse("td, th").ok()?;

    for table in document.select(&table_selector) {
        let mut rows = table.select(&row_selector);
        let header_row = rows.next()?;
        let header: Vec<String> = header_row
            .select(&cell_selector)
            .map(|c| normalize_header_cell(&cell_text(c)))
            .collect();

        let matches = required_tokens
            .iter()
            .all(|tok| header.iter().any(|h| h.contains(&tok.to_ascii_lowercase())));
        if !matches {
            continue;
        }

        let body: Vec<Vec<String>> = rows
            .map(|r| r.select(&cell_selector).map(cell_text).collect())
            .collect();

        return Some(LocatedTable { header, rows: body });
    }
    None
}

fn cell_text(cell: ElementRef) -> String {
    cell.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

fn normalize_header_cell(s: &str) -> String {
    s.to_ascii_lowercase().replace("trade", "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_table_by_header_tokens_regardless_of_order() {
        let html = r#"
            <html><body>
            <table>
                <tr><th>Sell Trade</th><th>Ticker</th><th>Buy Trade</th></tr>
                <tr><td>180.00</td><td>AAPL</td><td>150.00</td></tr>
            </table>
            </body></html>
        "#;
        let table = locate_table(html, &["ticker", "buy", "sell"]).unwrap();
        assert_eq!(table.header, vec!["sell ", "ticker", "buy "]);
        assert_eq!(table.rows, vec![vec!["180.00", "AAPL", "150.00"]]);
    }

    #[test]
    fn skips_tables_missing_a_required_token() {
        let html = r#"<table><tr><th>Name</th><th>Price</th></tr><tr><td>x</td><td>1</td></tr></table>"#;
        assert!(locate_table(html, &["ticker", "buy", "sell"]).is_none());
    }
}
