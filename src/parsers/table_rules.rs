use rust_decimal::Decimal;
use std::str::FromStr;

use crate::domain::{normalize_ticker, ExtractedRow, Sentiment};

use super::{Diagnostic, ParseOutcome};

/// Locates the first header cell containing `token`, case-insensitively.
pub fn column_index(header: &[String], token: &str) -> Option<usize> {
    header.iter().position(|h| h.contains(token))
}

/// Strips currency symbols, thousands separators, and whitespace, then
/// parses the remainder as a 2-decimal-scale price (§4.D edge cases).
pub fn parse_price(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }
    Decimal::from_str(&cleaned).ok().map(|d| d.round_dp(2))
}

/// Infers sentiment from the up/down glyph in the ticker cell when no
/// dedicated sentiment column is present. Defaults to `Neutral`. Restricted
/// to the glyphs themselves (not a bare `+`/`-` sign check) so a hyphenated
/// symbol like `BTC-USD` isn't mis-read as bearish.
pub fn infer_sentiment(cell: &str) -> Sentiment {
    if cell.contains('▲') {
        Sentiment::Bullish
    } else if cell.contains('▼') {
        Sentiment::Bearish
    } else {
        Sentiment::Neutral
    }
}

fn populated_count(cells: &[String]) -> usize {
    cells.iter().filter(|c| !c.trim().is_empty()).count()
}

/// The numeric-row rule shared by every parser variant: locate the
/// ticker/buy/sell (and optional sentiment) columns by header token, then
/// read rows top-to-bottom, skipping any with fewer than three populated
/// cells and dropping any with non-parsable prices. A row-level issue is
/// recorded as a `Diagnostic`, never aborting the rest of the table.
/// Duplicate tickers keep the last occurrence (publisher convention).
pub fn extract_generic_rows(header: &[String], rows: &[Vec<String>]) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();

    let ticker_idx = column_index(header, "ticker");
    let buy_idx = column_index(header, "buy");
    let sell_idx = column_index(header, "sell");
    let sentiment_idx = column_index(header, "sentiment")
        .or_else(|| column_index(header, "bias"))
        .or_else(|| column_index(header, "direction"));

    let (Some(ticker_idx), Some(buy_idx), Some(sell_idx)) = (ticker_idx, buy_idx, sell_idx) else {
        outcome
            .diagnostics
            .push(Diagnostic::new("table header is missing a ticker/buy/sell column"));
        return outcome;
    };

    for cells in rows {
        if populated_count(cells) < 3 {
            continue;
        }

        let Some(ticker_cell) = cells.get(ticker_idx).map(String::as_str) else {
            continue;
        };
        let Some(ticker) = normalize_ticker(ticker_cell) else {
            outcome
                .diagnostics
                .push(Diagnostic::new(format!("unparsable ticker: {ticker_cell:?}")));
            continue;
        };

        let Some(buy_trade) = cells.get(buy_idx).and_then(|c| parse_price(c)) else {
            outcome
                .diagnostics
                .push(Diagnostic::for_ticker(&ticker, "unparsable buy price"));
            continue;
        };
        let Some(sell_trade) = cells.get(sell_idx).and_then(|c| parse_price(c)) else {
            outcome
                .diagnostics
                .push(Diagnostic::for_ticker(&ticker, "unparsable sell price"));
            continue;
        };

        if buy_trade == sell_trade {
            outcome
                .diagnostics
                .push(Diagnostic::for_ticker(&ticker, "buy_trade == sell_trade, flagged as a data error"));
        }

        let sentiment = sentiment_idx
            .and_then(|i| cells.get(i))
            .and_then(|s| s.parse::<Sentiment>().ok())
            .unwrap_or_else(|| infer_sentiment(ticker_cell));

        if let Some(pos) = outcome.rows.iter().position(|r: &ExtractedRow| r.ticker == ticker) {
            outcome.rows[pos] = ExtractedRow {
                ticker,
                sentiment,
                buy_trade,
                sell_trade,
                raw_name: None,
            };
        } else {
            outcome.rows.push(ExtractedRow {
                ticker,
                sentiment,
                buy_trade,
                sell_trade,
                raw_name: None,
            });
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn header(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn parse_price_strips_currency_and_thousands_separators() {
        assert_eq!(parse_price("$1,234.56"), Some(dec!(1234.56)));
        assert_eq!(parse_price("  180.00 "), Some(dec!(180.00)));
        assert_eq!(parse_price("n/a"), None);
    }

    #[test]
    fn skips_rows_with_fewer_than_three_populated_cells() {
        let h = header(&["ticker", "buy", "sell"]);
        let rows = vec![
            vec!["AAPL".into(), "".into(), "".into()],
            vec!["MSFT".into(), "300.00".into(), "320.00".into()],
        ];
        let outcome = extract_generic_rows(&h, &rows);
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].ticker, "MSFT");
    }

    #[test]
    fn duplicate_ticker_keeps_last_occurrence() {
        let h = header(&["ticker", "buy", "sell"]);
        let rows = vec![
            vec!["AAPL".into(), "150.00".into(), "180.00".into()],
            vec!["AAPL".into(), "151.00".into(), "181.00".into()],
        ];
        let outcome = extract_generic_rows(&h, &rows);
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].buy_trade, dec!(151.00));
    }

    #[test]
    fn missing_required_column_records_a_diagnostic_and_emits_nothing() {
        let h = header(&["name", "price"]);
        let outcome = extract_generic_rows(&h, &[vec!["x".into(), "1".into()]]);
        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.diagnostics.len(), 1);
    }
}
