use async_trait::async_trait;
use tracing::instrument;

use crate::adapters::mail_source::Message;

use super::{parse_first_matching_html_table, ParseOutcome, Parser};

/// HTML table extractor for the daily "RISK RANGE" newsletter (§4.D).
/// Locates the table whose header contains Ticker/Buy/Sell and reads it
/// top-to-bottom; sentiment comes from a dedicated column if present,
/// otherwise is inferred from the ticker cell.
#[derive(Debug, Default)]
pub struct DailyParser;

impl DailyParser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Parser for DailyParser {
    #[instrument(skip(self, message), fields(subject = %message.subject))]
    async fn parse(&self, message: &Message) -> ParseOutcome {
        parse_first_matching_html_table(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Sentiment;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn message_with_html(html: &str) -> Message {
        Message {
            id: 1,
            subject: "RISK RANGE REPORT".to_string(),
            date: Utc::now(),
            html_parts: vec![html.to_string()],
            inline_images: vec![],
        }
    }

    #[tokio::test]
    async fn parses_a_well_formed_daily_table() {
        let html = r#"
            <table>
                <tr><th>Ticker</th><th>Sentiment</th><th>Buy Trade</th><th>Sell Trade</th></tr>
                <tr><td>AAPL</td><td>BULLISH</td><td>150.00</td><td>180.00</td></tr>
            </table>
        "#;
        let outcome = DailyParser::new().parse(&message_with_html(html)).await;
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].ticker, "AAPL");
        assert_eq!(outcome.rows[0].sentiment, Sentiment::Bullish);
        assert_eq!(outcome.rows[0].buy_trade, dec!(150.00));
    }

    #[tokio::test]
    async fn missing_table_records_a_diagnostic() {
        let outcome = DailyParser::new().parse(&message_with_html("<p>no tables here</p>")).await;
        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.diagnostics.len(), 1);
    }
}
