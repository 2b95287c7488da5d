use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::stock::{Category, Sentiment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Session {
    Am,
    Pm,
}

impl Session {
    pub fn as_str(&self) -> &'static str {
        match self {
            Session::Am => "AM",
            Session::Pm => "PM",
        }
    }
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertKind {
    Buy,
    Sell,
    Short,
    Cover,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Buy => "BUY",
            AlertKind::Sell => "SELL",
            AlertKind::Short => "SHORT",
            AlertKind::Cover => "COVER",
        }
    }

    /// Total ordering used to group a digest by kind (§4.I output clause).
    fn rank(&self) -> u8 {
        match self {
            AlertKind::Buy => 0,
            AlertKind::Sell => 1,
            AlertKind::Short => 2,
            AlertKind::Cover => 3,
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only, in-session alert record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub ticker: String,
    pub category: Category,
    pub kind: AlertKind,
    pub price: Decimal,
    pub threshold: Decimal,
    pub sentiment: Sentiment,
    pub session: Session,
    pub generated_at: DateTime<Utc>,
}

impl Alert {
    /// `(ticker, category, kind, session, trading_day)`.
    pub fn dedup_key(&self, trading_day: NaiveDate) -> AlertDedupKey {
        AlertDedupKey {
            ticker: self.ticker.clone(),
            category: self.category,
            kind: self.kind,
            session: self.session,
            trading_day,
        }
    }

    /// Orders a digest by `kind` then `category` then `ticker` ascending.
    pub fn sort_key(&self) -> (u8, &'static str, &str) {
        (self.kind.rank(), self.category.as_str(), self.ticker.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertDedupKey {
    pub ticker: String,
    pub category: Category,
    pub kind: AlertKind,
    pub session: Session,
    pub trading_day: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Succeeded,
    Failed,
}

/// Scheduler observability/idempotency record, persisted to `session_runs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRun {
    pub id: Option<i64>,
    pub job: String,
    pub session: Option<Session>,
    pub trading_day: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub stocks_priced: i64,
    pub alerts_fired: i64,
    pub error: Option<String>,
}

impl SessionRun {
    pub fn start(job: impl Into<String>, session: Option<Session>, trading_day: NaiveDate, now: DateTime<Utc>) -> Self {
        SessionRun {
            id: None,
            job: job.into(),
            session,
            trading_day,
            started_at: now,
            finished_at: None,
            status: SessionStatus::Running,
            stocks_priced: 0,
            alerts_fired: 0,
            error: None,
        }
    }

    pub fn finish_ok(&mut self, now: DateTime<Utc>, stocks_priced: i64, alerts_fired: i64) {
        self.finished_at = Some(now);
        self.status = SessionStatus::Succeeded;
        self.stocks_priced = stocks_priced;
        self.alerts_fired = alerts_fired;
    }

    pub fn finish_err(&mut self, now: DateTime<Utc>, error: impl Into<String>) {
        self.finished_at = Some(now);
        self.status = SessionStatus::Failed;
        self.error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn alert(kind: AlertKind, category: Category, ticker: &str) -> Alert {
        Alert {
            ticker: ticker.to_string(),
            category,
            kind,
            price: dec!(1.00),
            threshold: dec!(1.00),
            sentiment: Sentiment::Bullish,
            session: Session::Am,
            generated_at: Utc.with_ymd_and_hms(2026, 1, 5, 14, 45, 0).unwrap(),
        }
    }

    #[test]
    fn sort_key_orders_by_kind_then_category_then_ticker() {
        let mut alerts = vec![
            alert(AlertKind::Sell, Category::Daily, "ZZZ"),
            alert(AlertKind::Buy, Category::Etfs, "AAA"),
            alert(AlertKind::Buy, Category::Daily, "BBB"),
        ];
        alerts.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let order: Vec<&str> = alerts.iter().map(|a| a.ticker.as_str()).collect();
        assert_eq!(order, vec!["BBB", "AAA", "ZZZ"]);
    }

    #[test]
    fn dedup_key_distinguishes_session_and_kind() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let a = alert(AlertKind::Buy, Category::Daily, "AAPL").dedup_key(day);
        let b = alert(AlertKind::Sell, Category::Daily, "AAPL").dedup_key(day);
        assert_ne!(a, b);
    }

    #[test]
    fn session_run_lifecycle() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let mut run = SessionRun::start("extraction", None, now.date_naive(), now);
        assert_eq!(run.status, SessionStatus::Running);
        run.finish_ok(now, 12, 3);
        assert_eq!(run.status, SessionStatus::Succeeded);
        assert_eq!(run.alerts_fired, 3);
    }
}
