use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::adapters::mail_source::Message;
use crate::adapters::ocr::OcrAdapter;

use super::table_rules::extract_generic_rows;
use super::{Diagnostic, ParseOutcome, Parser};

/// Short-ticker heuristic for symbols that trade purely as crypto and need
/// the exchange-suffixed form the Contract Resolver expects (§4.D).
const PURE_CRYPTO_SYMBOLS: &[&str] = &[
    "BTC", "ETH", "SOL", "AVAX", "AAVE", "DOGE", "XRP", "ADA", "LINK", "DOT", "MATIC", "LTC",
];

fn normalize_crypto_ticker(ticker: &str) -> String {
    if PURE_CRYPTO_SYMBOLS.contains(&ticker) {
        format!("{ticker}-USD")
    } else {
        ticker.to_string()
    }
}

fn normalize_ocr_header(row: &[String]) -> Vec<String> {
    row.iter()
        .map(|c| c.to_ascii_lowercase().replace("trade", "").trim().to_string())
        .collect()
}

/// Loads the inline images at fixed positional indices (publisher-layout
/// constants, sourced from `ParserConfig` rather than hardcoded per the
/// §9 design note), OCRs each, and applies the same numeric-row rule as
/// the other parsers. All rows are emitted under `digitalassets`; the
/// extractor is responsible for tagging the category.
pub struct CryptoParser {
    ocr: Arc<dyn OcrAdapter>,
    levels_image_index: usize,
    stocks_image_index: usize,
}

impl CryptoParser {
    pub fn new(ocr: Arc<dyn OcrAdapter>, levels_image_index: usize, stocks_image_index: usize) -> Self {
        Self {
            ocr,
            levels_image_index,
            stocks_image_index,
        }
    }

    async fn parse_image(&self, message: &Message, index: usize, hint: &str) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();

        let Some(image) = message.inline_images.iter().find(|img| img.index == index) else {
            outcome
                .diagnostics
                .push(Diagnostic::new(format!("no inline image at positional index {index}")));
            return outcome;
        };

        let table = self.ocr.ocr(&image.bytes, Some(hint)).await;
        if table.is_empty() {
            outcome
                .diagnostics
                .push(Diagnostic::new(format!("OCR returned no rows for image index {index}")));
            return outcome;
        }

        let header = normalize_ocr_header(&table[0]);
        let mut extracted = extract_generic_rows(&header, &table[1..]);
        for row in &mut extracted.rows {
            row.ticker = normalize_crypto_ticker(&row.ticker);
        }
        extracted
    }
}

#[async_trait]
impl Parser for CryptoParser {
    #[instrument(skip(self, message), fields(subject = %message.subject))]
    async fn parse(&self, message: &Message) -> ParseOutcome {
        let levels = self.parse_image(message, self.levels_image_index, "crypto-levels").await;
        let stocks = self
            .parse_image(message, self.stocks_image_index, "crypto-stocks")
            .await;

        let mut combined = ParseOutcome {
            rows: levels.rows,
            diagnostics: levels.diagnostics,
        };
        for row in stocks.rows {
            if let Some(pos) = combined.rows.iter().position(|r| r.ticker == row.ticker) {
                combined.rows[pos] = row;
            } else {
                combined.rows.push(row);
            }
        }
        combined.diagnostics.extend(stocks.diagnostics);
        combined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mail_source::InlineImage;
    use crate::adapters::ocr::TableText;
    use async_trait::async_trait;
    use chrono::Utc;

    struct StubOcr {
        tables: std::collections::HashMap<usize, Vec<Vec<String>>>,
    }

    #[async_trait]
    impl OcrAdapter for StubOcr {
        async fn ocr(&self, image_bytes: &[u8], _hint: Option<&str>) -> TableText {
            let index = image_bytes[0] as usize;
            self.tables.get(&index).cloned().unwrap_or_default()
        }
    }

    fn image(index: usize) -> InlineImage {
        InlineImage {
            index,
            bytes: vec![index as u8],
            content_type: "image/png".to_string(),
        }
    }

    #[tokio::test]
    async fn merges_levels_and_stocks_images_and_normalizes_pure_crypto_symbols() {
        let mut tables = std::collections::HashMap::new();
        tables.insert(
            6,
            vec![
                vec!["Ticker".into(), "Buy".into(), "Sell".into()],
                vec!["BTC".into(), "60000".into(), "65000".into()],
            ],
        );
        tables.insert(
            14,
            vec![
                vec!["Ticker".into(), "Buy".into(), "Sell".into()],
                vec!["MSTR".into(), "400.00".into(), "420.00".into()],
            ],
        );
        let ocr = Arc::new(StubOcr { tables });
        let parser = CryptoParser::new(ocr, 6, 14);

        let message = Message {
            id: 1,
            subject: "CRYPTO QUANT".to_string(),
            date: Utc::now(),
            html_parts: vec![],
            inline_images: vec![image(6), image(14)],
        };

        let outcome = parser.parse(&message).await;
        let tickers: Vec<&str> = outcome.rows.iter().map(|r| r.ticker.as_str()).collect();
        assert!(tickers.contains(&"BTC-USD"));
        assert!(tickers.contains(&"MSTR"));
    }

    #[tokio::test]
    async fn missing_image_at_an_index_records_a_diagnostic_but_keeps_the_other() {
        let mut tables = std::collections::HashMap::new();
        tables.insert(
            6,
            vec![
                vec!["Ticker".into(), "Buy".into(), "Sell".into()],
                vec!["ETH".into(), "3000".into(), "3500".into()],
            ],
        );
        let ocr = Arc::new(StubOcr { tables });
        let parser = CryptoParser::new(ocr, 6, 14);

        let message = Message {
            id: 2,
            subject: "CRYPTO QUANT".to_string(),
            date: Utc::now(),
            html_parts: vec![],
            inline_images: vec![image(6)],
        };

        let outcome = parser.parse(&message).await;
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].ticker, "ETH-USD");
        assert_eq!(outcome.diagnostics.len(), 1);
    }
}
