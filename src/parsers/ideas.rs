use async_trait::async_trait;
use tracing::instrument;

use crate::adapters::mail_source::Message;

use super::{parse_first_matching_html_table, ParseOutcome, Parser};

/// HTML table extractor for the weekly "Investing Ideas Newsletter".
/// Structurally identical to [`super::DailyParser`] — only the subject
/// query and default category tag differ (§4.D).
#[derive(Debug, Default)]
pub struct IdeasParser;

impl IdeasParser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Parser for IdeasParser {
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

    #[tokio::test]
    async fn bearish_row_with_inverted_thresholds_still_parses() {
        let html = r#"
            <table>
                <tr><th>Ticker</th><th>Sentiment</th><th>Buy Trade</th><th>Sell Trade</th></tr>
                <tr><td>EWJ</td><td>BEARISH</td><td>73.65</td><td>75.00</td></tr>
            </table>
        "#;
        let message = Message {
            id: 3,
            subject: "Investing Ideas Newsletter".to_string(),
            date: Utc::now(),
            html_parts: vec![html.to_string()],
            inline_images: vec![],
        };
        let outcome = IdeasParser::new().parse(&message).await;
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].sentiment, Sentiment::Bearish);
    }
}
