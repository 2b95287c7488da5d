use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::domain::{Alert, AlertDedupKey, AlertKind, Sentiment, Session, Stock};

/// One row in the sentiment matrix (§4.I, §9: "expose the rule table as
/// data so policy changes do not require code edits"). `NEUTRAL` is
/// deliberately folded into the same rules as `BULLISH`.
struct Rule {
    applies: fn(Sentiment) -> bool,
    condition: fn(Decimal, Decimal, Decimal) -> bool,
    kind: AlertKind,
}

const SENTIMENT_MATRIX: &[Rule] = &[
    Rule {
        applies: |s| matches!(s, Sentiment::Bullish | Sentiment::Neutral),
        condition: |price, buy, _sell| price <= buy,
        kind: AlertKind::Buy,
    },
    Rule {
        applies: |s| matches!(s, Sentiment::Bullish | Sentiment::Neutral),
        condition: |price, _buy, sell| price >= sell,
        kind: AlertKind::Sell,
    },
    Rule {
        applies: |s| matches!(s, Sentiment::Bearish),
        condition: |price, _buy, sell| price >= sell,
        kind: AlertKind::Short,
    },
    Rule {
        applies: |s| matches!(s, Sentiment::Bearish),
        condition: |price, buy, _sell| price <= buy,
        kind: AlertKind::Cover,
    },
];

fn threshold_for(kind: AlertKind, buy: Decimal, sell: Decimal) -> Decimal {
    match kind {
        AlertKind::Buy | AlertKind::Cover => buy,
        AlertKind::Sell | AlertKind::Short => sell,
    }
}

/// Applies the sentiment matrix to eligible rows and deduplicates within
/// the process's current trading day. The dedup set is process-memory
/// only (§5, §9) — a restart re-enables already-sent alerts by design.
pub struct AlertEvaluator {
    seen: Mutex<HashMap<NaiveDate, HashSet<AlertDedupKey>>>,
}

impl AlertEvaluator {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Evaluates every stock carrying a non-null price for `session`,
    /// returning newly-triggered alerts ordered by kind, then category,
    /// then ticker (§4.I). Rows already seen for `(ticker, category, kind,
    /// session, trading_day)` are suppressed; a new trading day evicts the
    /// prior day's dedup entries.
    #[instrument(skip(self, stocks), fields(n = stocks.len(), %session))]
    pub async fn evaluate(&self, stocks: &[Stock], session: Session, now: DateTime<Utc>) -> Vec<Alert> {
        let trading_day = now.date_naive();
        let mut seen = self.seen.lock().await;
        seen.retain(|day, _| *day == trading_day);
        let seen_for_day = seen.entry(trading_day).or_default();

        let mut alerts = Vec::new();
        for stock in stocks {
            let Some(price) = stock.price_for_session(session) else {
                continue;
            };

            for rule in SENTIMENT_MATRIX {
                if !(rule.applies)(stock.sentiment) {
                    continue;
                }
                if !(rule.condition)(price, stock.buy_trade, stock.sell_trade) {
                    continue;
                }

                let alert = Alert {
                    ticker: stock.ticker.clone(),
                    category: stock.category,
                    kind: rule.kind,
                    price,
                    threshold: threshold_for(rule.kind, stock.buy_trade, stock.sell_trade),
                    sentiment: stock.sentiment,
                    session,
                    generated_at: now,
                };

                if seen_for_day.insert(alert.dedup_key(trading_day)) {
                    alerts.push(alert);
                }
            }
        }

        alerts.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        alerts
    }
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Category;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn stock(sentiment: Sentiment, buy: Decimal, sell: Decimal, am_price: Decimal) -> Stock {
        Stock {
            id: Some(1),
            ticker: "AAPL".to_string(),
            category: Category::Daily,
            sentiment,
            buy_trade: buy,
            sell_trade: sell,
            am_price: Some(am_price),
            pm_price: None,
            last_price_update: Some(Utc::now()),
            contract_descriptor: None,
            contract_resolved: false,
        }
    }

    #[tokio::test]
    async fn bullish_buy_scenario() {
        let evaluator = AlertEvaluator::new();
        let s = stock(Sentiment::Bullish, dec!(150.00), dec!(180.00), dec!(149.50));
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 14, 45, 0).unwrap();
        let alerts = evaluator.evaluate(&[s], Session::Am, now).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Buy);
        assert_eq!(alerts[0].threshold, dec!(150.00));
    }

    #[tokio::test]
    async fn bearish_short_scenario() {
        let evaluator = AlertEvaluator::new();
        let mut s = stock(Sentiment::Bearish, dec!(73.65), dec!(75.00), dec!(75.58));
        s.ticker = "EWJ".to_string();
        s.category = Category::Ideas;
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 14, 45, 0).unwrap();
        let alerts = evaluator.evaluate(&[s], Session::Am, now).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Short);
    }

    #[tokio::test]
    async fn dedup_suppresses_rerun_on_the_same_trading_day() {
        let evaluator = AlertEvaluator::new();
        let s = stock(Sentiment::Bullish, dec!(150.00), dec!(180.00), dec!(149.50));
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 14, 45, 0).unwrap();
        let first = evaluator.evaluate(&[s.clone()], Session::Am, now).await;
        let second = evaluator.evaluate(&[s], Session::Am, now).await;
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn bearish_with_inverted_thresholds_can_fire_both_short_and_cover() {
        let evaluator = AlertEvaluator::new();
        // price sits between sell (lower) and buy (higher): both conditions hold.
        let s = stock(Sentiment::Bearish, dec!(400.00), dec!(380.00), dec!(390.00));
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 14, 45, 0).unwrap();
        let alerts = evaluator.evaluate(&[s], Session::Am, now).await;
        let kinds: Vec<AlertKind> = alerts.iter().map(|a| a.kind).collect();
        assert!(kinds.contains(&AlertKind::Short));
        assert!(kinds.contains(&AlertKind::Cover));
    }

    #[tokio::test]
    async fn trading_day_rollover_evicts_prior_dedup_entries() {
        let evaluator = AlertEvaluator::new();
        let s = stock(Sentiment::Bullish, dec!(150.00), dec!(180.00), dec!(149.50));
        let day1 = Utc.with_ymd_and_hms(2026, 1, 5, 14, 45, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2026, 1, 6, 14, 45, 0).unwrap();
        let first = evaluator.evaluate(&[s.clone()], Session::Am, day1).await;
        let second = evaluator.evaluate(&[s], Session::Am, day2).await;
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn no_price_for_session_is_not_evaluated() {
        let evaluator = AlertEvaluator::new();
        let s = stock(Sentiment::Bullish, dec!(150.00), dec!(180.00), dec!(149.50));
        let now = Utc::now();
        let alerts = evaluator.evaluate(&[s], Session::Pm, now).await;
        assert!(alerts.is_empty());
    }
}
