use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical source grouping; determines parser, schedule, and replace scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Daily,
    Digitalassets,
    Etfs,
    Ideas,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Daily => "daily",
            Category::Digitalassets => "digitalassets",
            Category::Etfs => "etfs",
            Category::Ideas => "ideas",
        }
    }

    pub fn all() -> [Category; 4] {
        [
            Category::Daily,
            Category::Digitalassets,
            Category::Etfs,
            Category::Ideas,
        ]
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(Category::Daily),
            "digitalassets" => Ok(Category::Digitalassets),
            "etfs" => Ok(Category::Etfs),
            "ideas" => Ok(Category::Ideas),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Bullish => "BULLISH",
            Sentiment::Bearish => "BEARISH",
            Sentiment::Neutral => "NEUTRAL",
        }
    }
}

impl std::str::FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BULLISH" => Ok(Sentiment::Bullish),
            "BEARISH" => Ok(Sentiment::Bearish),
            "NEUTRAL" => Ok(Sentiment::Neutral),
            other => Err(format!("unknown sentiment: {other}")),
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalizes a raw ticker token to the `/^[A-Z0-9.\-]{1,20}$/` form, or
/// `None` if the token cannot be made to fit.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let upper = raw.trim().to_ascii_uppercase();
    if upper.is_empty() || upper.len() > 20 {
        return None;
    }
    if upper
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        Some(upper)
    } else {
        None
    }
}

/// The authoritative ticker-table entity. `(ticker, category)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    pub id: Option<i64>,
    pub ticker: String,
    pub category: Category,
    pub sentiment: Sentiment,
    pub buy_trade: Decimal,
    pub sell_trade: Decimal,
    pub am_price: Option<Decimal>,
    pub pm_price: Option<Decimal>,
    pub last_price_update: Option<DateTime<Utc>>,
    pub contract_descriptor: Option<Value>,
    pub contract_resolved: bool,
}

impl Stock {
    /// Builds a fresh row from a reconciled `ExtractedRow`. Returns `None`
    /// (recording a diagnostic is the caller's job) if the row violates the
    /// ordering invariant for non-BEARISH sentiment.
    pub fn from_extracted(category: Category, row: &ExtractedRow) -> Option<Self> {
        if row.buy_trade.is_sign_negative() || row.sell_trade.is_sign_negative() {
            return None;
        }
        if row.sentiment != Sentiment::Bearish && row.buy_trade >= row.sell_trade {
            return None;
        }
        Some(Stock {
            id: None,
            ticker: row.ticker.clone(),
            category,
            sentiment: row.sentiment,
            buy_trade: row.buy_trade,
            sell_trade: row.sell_trade,
            am_price: None,
            pm_price: None,
            last_price_update: None,
            contract_descriptor: None,
            contract_resolved: false,
        })
    }

    /// True when `buy_trade == sell_trade` — flagged as a data error per the
    /// open question in the design notes, but still evaluable.
    pub fn has_threshold_collision(&self) -> bool {
        self.buy_trade == self.sell_trade
    }

    /// A stock is eligible for evaluation once it carries a sentiment and
    /// both thresholds — which every stored row already does — and at least
    /// one session price.
    pub fn has_any_price(&self) -> bool {
        self.am_price.is_some() || self.pm_price.is_some()
    }

    pub fn price_for_session(&self, session: super::Session) -> Option<Decimal> {
        match session {
            super::Session::Am => self.am_price,
            super::Session::Pm => self.pm_price,
        }
    }
}

/// Transient parser output; has no identity in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRow {
    pub ticker: String,
    pub sentiment: Sentiment,
    pub buy_trade: Decimal,
    pub sell_trade: Decimal,
    pub raw_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn normalize_ticker_rejects_whitespace_and_overlong() {
        assert_eq!(normalize_ticker(" aapl "), Some("AAPL".to_string()));
        assert_eq!(normalize_ticker("btc-usd"), Some("BTC-USD".to_string()));
        assert_eq!(normalize_ticker(""), None);
        assert_eq!(normalize_ticker(&"A".repeat(21)), None);
        assert_eq!(normalize_ticker("AA PL"), None);
    }

    #[test]
    fn from_extracted_rejects_bullish_with_inverted_thresholds() {
        let row = ExtractedRow {
            ticker: "AAPL".into(),
            sentiment: Sentiment::Bullish,
            buy_trade: dec!(180.00),
            sell_trade: dec!(150.00),
            raw_name: None,
        };
        assert!(Stock::from_extracted(Category::Daily, &row).is_none());
    }

    #[test]
    fn from_extracted_allows_bearish_with_inverted_thresholds() {
        let row = ExtractedRow {
            ticker: "EWJ".into(),
            sentiment: Sentiment::Bearish,
            buy_trade: dec!(73.65),
            sell_trade: dec!(75.00),
            raw_name: None,
        };
        assert!(Stock::from_extracted(Category::Ideas, &row).is_some());
    }

    #[test]
    fn threshold_collision_is_detected() {
        let row = ExtractedRow {
            ticker: "MSTR".into(),
            sentiment: Sentiment::Bearish,
            buy_trade: dec!(400.00),
            sell_trade: dec!(400.00),
            raw_name: None,
        };
        let stock = Stock::from_extracted(Category::Digitalassets, &row).unwrap();
        assert!(stock.has_threshold_collision());
    }
}
