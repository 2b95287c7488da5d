use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::adapters::mailer::{Digest, Mailer};
use crate::domain::{Alert, Session};
use crate::error::Result;

/// Renders one session digest and dispatches it through the injected mail
/// transport. Empty alert lists produce no email — the notifier never
/// sends a digest claiming alerts fired when none did (§4.J, §7).
pub struct Notifier<'a> {
    mailer: &'a dyn Mailer,
    from: String,
    to: Vec<String>,
}

impl<'a> Notifier<'a> {
    pub fn new(mailer: &'a dyn Mailer, from: impl Into<String>, to: Vec<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
            to,
        }
    }

    #[instrument(skip(self, alerts), fields(n = alerts.len(), %session))]
    pub async fn notify(&self, alerts: &[Alert], session: Session, trading_day: NaiveDate) -> Result<()> {
        if alerts.is_empty() {
            info!(%session, "no alerts fired; skipping digest");
            return Ok(());
        }

        let digest = self.render(alerts, session, trading_day);
        self.mailer.send(&digest).await
    }

    fn render(&self, alerts: &[Alert], session: Session, trading_day: NaiveDate) -> Digest {
        let subject = format!(
            "[{session} Session] {count} alert{plural} — {trading_day}",
            count = alerts.len(),
            plural = if alerts.len() == 1 { "" } else { "s" },
        );

        let mut plain = String::new();
        let mut html = String::from(
            "<table border=\"1\" cellpadding=\"4\"><tr><th>Kind</th><th>Category</th><th>Ticker</th><th>Price</th><th>Threshold</th><th>Sentiment</th></tr>",
        );

        for alert in alerts {
            plain.push_str(&format!(
                "{kind}\t{category}\t{ticker}\tprice={price}\tthreshold={threshold}\tsentiment={sentiment}\n",
                kind = alert.kind,
                category = alert.category,
                ticker = alert.ticker,
                price = alert.price,
                threshold = alert.threshold,
                sentiment = alert.sentiment,
            ));
            html.push_str(&format!(
                "<tr><td>{kind}</td><td>{category}</td><td>{ticker}</td><td>{price}</td><td>{threshold}</td><td>{sentiment}</td></tr>",
                kind = alert.kind,
                category = alert.category,
                ticker = alert.ticker,
                price = alert.price,
                threshold = alert.threshold,
                sentiment = alert.sentiment,
            ));
        }
        html.push_str("</table>");

        Digest {
            subject,
            plain_body: plain,
            html_body: html,
            from: self.from.clone(),
            to: self.to.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlertKind, Category, Sentiment};
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingMailer {
        sent: AtomicUsize,
    }

    #[async_trait]
    impl Mailer for CountingMailer {
        async fn send(&self, _digest: &Digest) -> Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn alert() -> Alert {
        Alert {
            ticker: "AAPL".to_string(),
            category: Category::Daily,
            kind: AlertKind::Buy,
            price: dec!(149.50),
            threshold: dec!(150.00),
            sentiment: Sentiment::Bullish,
            session: Session::Am,
            generated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn empty_alert_list_sends_nothing() {
        let mailer = CountingMailer { sent: AtomicUsize::new(0) };
        let notifier = Notifier::new(&mailer, "bot@example.com", vec!["a@example.com".to_string()]);
        notifier
            .notify(&[], Session::Am, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap())
            .await
            .unwrap();
        assert_eq!(mailer.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_empty_alert_list_dispatches_one_digest() {
        let mailer = CountingMailer { sent: AtomicUsize::new(0) };
        let notifier = Notifier::new(&mailer, "bot@example.com", vec!["a@example.com".to_string()]);
        notifier
            .notify(&[alert()], Session::Am, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap())
            .await
            .unwrap();
        assert_eq!(mailer.sent.load(Ordering::SeqCst), 1);
    }
}
