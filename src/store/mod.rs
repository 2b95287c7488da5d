mod postgres;

pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::{Category, ExtractedRow, Session, SessionRun, Stock};
use crate::error::Result;

/// Ticker-table persistence (§4.F). `replace_category` is the only mutator
/// allowed to create or destroy rows; price updates and contract caching
/// only ever mutate existing rows.
#[async_trait]
pub trait Store: Send + Sync {
    /// Transactional delete-then-insert scoped to `category`. Rows in other
    /// categories are untouched. Returns the count of inserted rows.
    async fn replace_category(&self, category: Category, rows: &[ExtractedRow]) -> Result<ReplaceOutcome>;

    /// Rows carrying a sentiment and both thresholds — i.e. every stored
    /// row — optionally filtered by category.
    async fn list_active(&self, category: Option<Category>) -> Result<Vec<Stock>>;

    /// Writes the session price and bumps `last_price_update`. Fails if
    /// `at` does not exceed the row's prior `last_price_update`.
    async fn update_price(
        &self,
        ticker: &str,
        category: Category,
        session: Session,
        price: rust_decimal::Decimal,
        at: DateTime<Utc>,
    ) -> Result<()>;

    async fn cache_contract(&self, ticker: &str, category: Category, descriptor: Value) -> Result<()>;

    async fn get_contract(&self, ticker: &str, category: Category) -> Result<Option<Value>>;

    async fn record_session_run(&self, run: &SessionRun) -> Result<i64>;

    async fn finish_session_run(&self, run: &SessionRun) -> Result<()>;
}

/// Outcome of a `replace_category` call, used for the Extractor
/// Orchestrator's per-category summary (§4.E point 5).
#[derive(Debug, Clone, Default)]
pub struct ReplaceOutcome {
    pub deleted: u64,
    pub inserted: u64,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Clone)]
pub struct RejectedRow {
    pub ticker: String,
    pub reason: String,
}
