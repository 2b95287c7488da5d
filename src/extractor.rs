use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, instrument, warn};

use crate::adapters::mail_source::{MailSource, Message, MessageId};
use crate::adapters::ocr::OcrAdapter;
use crate::domain::Category;
use crate::error::Result;
use crate::parsers::{CryptoParser, DailyParser, EtfParser, IdeasParser, ParseOutcome, Parser};
use crate::store::Store;

/// `commit` writes through `Store::replace_category`; `validate` only
/// diffs against current contents (§4.E point 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    Commit,
    Validate,
}

fn subject_query_for(category: Category) -> &'static str {
    match category {
        Category::Daily => "RISK RANGE",
        Category::Digitalassets => "CRYPTO QUANT",
        Category::Etfs => "ETF Pro Plus - Levels",
        Category::Ideas => "Investing Ideas Newsletter",
    }
}

/// Per-category comparison used in `validate` mode; in `commit` mode the
/// store's own `ReplaceOutcome` already reports inserted/deleted/rejected.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

/// Per-category result of one extraction pass (§4.E point 5).
#[derive(Debug, Clone, Default)]
pub struct CategorySummary {
    pub category: Option<Category>,
    pub matched_message_id: Option<MessageId>,
    pub row_count: usize,
    pub inserted: u64,
    pub deleted: u64,
    pub rejected: Vec<String>,
    pub diagnostics: Vec<String>,
    pub delta: Option<ReconciliationDelta>,
    pub error: Option<String>,
}

/// Drives Source Adapter → Parser → Store for one or more categories,
/// isolating failures so one category's error never aborts the others
/// (§4.E).
pub struct ExtractorOrchestrator {
    source: Arc<dyn MailSource>,
    ocr: Arc<dyn OcrAdapter>,
    store: Arc<dyn Store>,
    crypto_levels_image_index: usize,
    crypto_stocks_image_index: usize,
}

impl ExtractorOrchestrator {
    pub fn new(
        source: Arc<dyn MailSource>,
        ocr: Arc<dyn OcrAdapter>,
        store: Arc<dyn Store>,
        crypto_levels_image_index: usize,
        crypto_stocks_image_index: usize,
    ) -> Self {
        Self {
            source,
            ocr,
            store,
            crypto_levels_image_index,
            crypto_stocks_image_index,
        }
    }

    #[instrument(skip(self), fields(n = categories.len(), window_hours))]
    pub async fn run(
        &self,
        categories: &[Category],
        window_hours: i64,
        mode: ExtractMode,
    ) -> Vec<CategorySummary> {
        let mut summaries = Vec::with_capacity(categories.len());
        for category in categories {
            summaries.push(self.run_category(*category, window_hours, mode).await);
        }
        summaries
    }

    async fn run_category(&self, category: Category, window_hours: i64, mode: ExtractMode) -> CategorySummary {
        let mut summary = CategorySummary {
            category: Some(category),
            ..Default::default()
        };

        let message = match self.fetch_latest_message(category, window_hours).await {
            Ok(Some(m)) => m,
            Ok(None) => {
                info!(%category, "no matching message in lookback window");
                return summary;
            }
            Err(e) => {
                warn!(%category, error = %e, "newsletter source call failed for category");
                summary.error = Some(e.to_string());
                return summary;
            }
        };
        summary.matched_message_id = Some(message.id);

        let outcome = self.dispatch_parser(category, &message).await;
        summary.row_count = outcome.rows.len();
        summary.diagnostics = outcome.diagnostics.iter().map(|d| d.to_string()).collect();

        match mode {
            ExtractMode::Commit => self.commit(category, outcome, &mut summary).await,
            ExtractMode::Validate => self.validate(category, outcome, &mut summary).await,
        }

        summary
    }

    /// Picks the most recent matching message per category by `Date`
    /// header (§4.E point 2); `NoMessage` is recorded by returning `None`,
    /// not by propagating an error, so the caller continues with the
    /// remaining categories.
    async fn fetch_latest_message(&self, category: Category, window_hours: i64) -> Result<Option<Message>> {
        let until = Utc::now();
        let since = until - Duration::hours(window_hours);
        let ids = self
            .source
            .list_messages(subject_query_for(category), since, until)
            .await?;

        if ids.is_empty() {
            return Ok(None);
        }

        let mut latest: Option<Message> = None;
        for id in ids {
            match self.source.fetch(id).await {
                Ok(message) => {
                    if latest.as_ref().map(|m| message.date > m.date).unwrap_or(true) {
                        latest = Some(message);
                    }
                }
                Err(e) => warn!(%category, message_id = id, error = %e, "failed to fetch a candidate message"),
            }
        }
        Ok(latest)
    }

    async fn dispatch_parser(&self, category: Category, message: &Message) -> ParseOutcome {
        match category {
            Category::Daily => DailyParser::new().parse(message).await,
            Category::Etfs => EtfParser::new().parse(message).await,
            Category::Ideas => IdeasParser::new().parse(message).await,
            Category::Digitalassets => {
                CryptoParser::new(
                    Arc::clone(&self.ocr),
                    self.crypto_levels_image_index,
                    self.crypto_stocks_image_index,
                )
                .parse(message)
                .await
            }
        }
    }

    async fn commit(&self, category: Category, outcome: ParseOutcome, summary: &mut CategorySummary) {
        match self.store.replace_category(category, &outcome.rows).await {
            Ok(replace) => {
                summary.inserted = replace.inserted;
                summary.deleted = replace.deleted;
                summary.rejected = replace
                    .rejected
                    .into_iter()
                    .map(|r| format!("{}: {}", r.ticker, r.reason))
                    .collect();
            }
            Err(e) => {
                warn!(%category, error = %e, "replace_category failed, category left unchanged");
                summary.error = Some(e.to_string());
            }
        }
    }

    async fn validate(&self, category: Category, outcome: ParseOutcome, summary: &mut CategorySummary) {
        let existing = self.store.list_active(Some(category)).await.unwrap_or_default();
        let existing_tickers: std::collections::HashMap<&str, &crate::domain::Stock> =
            existing.iter().map(|s| (s.ticker.as_str(), s)).collect();

        let mut delta = ReconciliationDelta::default();
        let mut new_tickers = std::collections::HashSet::new();

        for row in &outcome.rows {
            new_tickers.insert(row.ticker.as_str());
            match existing_tickers.get(row.ticker.as_str()) {
                Some(stock) if stock.buy_trade == row.buy_trade && stock.sell_trade == row.sell_trade && stock.sentiment == row.sentiment => {}
                Some(_) => delta.changed.push(row.ticker.clone()),
                None => delta.added.push(row.ticker.clone()),
            }
        }
        for stock in &existing {
            if !new_tickers.contains(stock.ticker.as_str()) {
                delta.removed.push(stock.ticker.clone());
            }
        }

        summary.delta = Some(delta);
    }
}
