mod crypto;
mod daily;
mod etf;
pub mod html_table;
mod ideas;
pub mod table_rules;

pub use crypto::CryptoParser;
pub use daily::DailyParser;
pub use etf::EtfParser;
pub use ideas::IdeasParser;

use async_trait::async_trait;

use crate::adapters::mail_source::Message;
use crate::domain::ExtractedRow;

/// One row-level (or table-level) issue recorded during parsing. Parsing
/// never aborts on a `Diagnostic` — the category proceeds with whatever
/// rows were extracted (§4.D, §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub ticker: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            ticker: None,
            message: message.into(),
        }
    }

    pub fn for_ticker(ticker: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ticker: Some(ticker.into()),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.ticker {
            Some(ticker) => write!(f, "{ticker}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub rows: Vec<ExtractedRow>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Implemented once per newsletter category (§4.D).
#[async_trait]
pub trait Parser: Send + Sync {
    async fn parse(&self, message: &Message) -> ParseOutcome;
}

/// Shared by the Daily/ETF/Ideas parsers: scans every HTML part of the
/// message for the first table matching the header tokens and applies the
/// numeric-row extraction rule to it.
fn parse_first_matching_html_table(message: &Message) -> ParseOutcome {
    for html in &message.html_parts {
        if let Some(table) = html_table::locate_table(html, &["ticker", "buy", "sell"]) {
            return table_rules::extract_generic_rows(&table.header, &table.rows);
        }
    }
    let mut outcome = ParseOutcome::default();
    outcome
        .diagnostics
        .push(Diagnostic::new("no table with Ticker/Buy/Sell columns found in message"));
    outcome
}
