use async_trait::async_trait;
use tracing::instrument;

use crate::adapters::mail_source::Message;

use super::{parse_first_matching_html_table, ParseOutcome, Parser};

/// HTML table extractor for the weekly "ETF Pro Plus - Levels" newsletter.
/// Structurally identical to [`super::DailyParser`] — only the subject
/// query, default category tag, and the publisher's column ordering
/// differ, and column ordering is already irrelevant since columns are
/// located by header token (§4.D).
#[derive(Debug, Default)]
pub struct EtfParser;

impl EtfParser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Parser for EtfParser {
    #[instrument(skip(self, message), fields(subject = %message.subject))]
    async fn parse(&self, message: &Message) -> ParseOutcome {
        parse_first_matching_html_table(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn parses_regardless_of_column_order() {
        let html = r#"
            <table>
                <tr><th>Sell Trade</th><th>Ticker</th><th>Buy Trade</th></tr>
                <tr><td>45.00</td><td>SPY</td><td>40.00</td></tr>
            </table>
        "#;
        let message = Message {
            id: 2,
            subject: "ETF Pro Plus - Levels".to_string(),
            date: Utc::now(),
            html_parts: vec![html.to_string()],
            inline_images: vec![],
        };
        let outcome = EtfParser::new().parse(&message).await;
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].ticker, "SPY");
    }
}
