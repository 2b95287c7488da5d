use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, info, instrument, warn};

use super::{ReplaceOutcome, RejectedRow, Store};
use crate::domain::{
    normalize_ticker, Category, ExtractedRow, Session, SessionRun, SessionStatus, Sentiment, Stock,
};
use crate::error::{AppError, Result};

/// PostgreSQL storage adapter backing the ticker table and session-run log.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("connected to postgres store");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("database migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_stock(row: &sqlx::postgres::PgRow) -> Result<Stock> {
        let category: String = row.get("category");
        let sentiment: String = row.get("sentiment");
        Ok(Stock {
            id: Some(row.get("id")),
            ticker: row.get("ticker"),
            category: category
                .parse()
                .map_err(|e: String| AppError::StoreError(e))?,
            sentiment: sentiment
                .parse::<Sentiment>()
                .map_err(AppError::StoreError)?,
            buy_trade: row.get("buy_trade"),
            sell_trade: row.get("sell_trade"),
            am_price: row.get("am_price"),
            pm_price: row.get("pm_price"),
            last_price_update: row.get("last_price_update"),
            contract_descriptor: row.get("contract_descriptor"),
            contract_resolved: row.get("contract_resolved"),
        })
    }
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self, rows), fields(category = category.as_str(), n = rows.len()))]
    async fn replace_category(&self, category: Category, rows: &[ExtractedRow]) -> Result<ReplaceOutcome> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM stocks WHERE category = $1")
            .bind(category.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let mut outcome = ReplaceOutcome {
            deleted,
            ..Default::default()
        };

        // Publisher convention: a duplicate ticker within a category keeps
        // the last occurrence.
        let mut deduped: Vec<&ExtractedRow> = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(pos) = deduped.iter().position(|r| r.ticker == row.ticker) {
                deduped[pos] = row;
            } else {
                deduped.push(row);
            }
        }

        for row in deduped {
            let ticker = match normalize_ticker(&row.ticker) {
                Some(t) => t,
                None => {
                    outcome.rejected.push(RejectedRow {
                        ticker: row.ticker.clone(),
                        reason: "ticker failed normalization".to_string(),
                    });
                    continue;
                }
            };

            if row.buy_trade.is_sign_negative() || row.sell_trade.is_sign_negative() {
                outcome.rejected.push(RejectedRow {
                    ticker,
                    reason: "negative threshold".to_string(),
                });
                continue;
            }
            if row.sentiment != Sentiment::Bearish && row.buy_trade >= row.sell_trade {
                outcome.rejected.push(RejectedRow {
                    ticker,
                    reason: "buy_trade >= sell_trade for non-BEARISH row".to_string(),
                });
                continue;
            }
            if row.buy_trade == row.sell_trade {
                warn!(ticker = %ticker, "buy_trade == sell_trade, flagging as data error");
            }

            sqlx::query(
                r#"
                INSERT INTO stocks (ticker, category, sentiment, buy_trade, sell_trade)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (ticker, category) DO UPDATE SET
                    sentiment = EXCLUDED.sentiment,
                    buy_trade = EXCLUDED.buy_trade,
                    sell_trade = EXCLUDED.sell_trade,
                    updated_at = NOW()
                "#,
            )
            .bind(&ticker)
            .bind(category.as_str())
            .bind(row.sentiment.as_str())
            .bind(row.buy_trade)
            .bind(row.sell_trade)
            .execute(&mut *tx)
            .await?;

            outcome.inserted += 1;
        }

        tx.commit().await?;
        debug!(inserted = outcome.inserted, deleted = outcome.deleted, "replace_category committed");
        Ok(outcome)
    }

    async fn list_active(&self, category: Option<Category>) -> Result<Vec<Stock>> {
        let rows = match category {
            Some(c) => {
                sqlx::query(
                    "SELECT * FROM stocks WHERE category = $1 ORDER BY ticker",
                )
                .bind(c.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM stocks ORDER BY category, ticker")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(Self::row_to_stock).collect()
    }

    #[instrument(skip(self))]
    async fn update_price(
        &self,
        ticker: &str,
        category: Category,
        session: Session,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let column = match session {
            Session::Am => "am_price",
            Session::Pm => "pm_price",
        };

        let query = format!(
            r#"
            UPDATE stocks SET {column} = $1, last_price_update = $2, updated_at = NOW()
            WHERE ticker = $3 AND category = $4
              AND (last_price_update IS NULL OR last_price_update < $2)
            "#
        );

        let result = sqlx::query(&query)
            .bind(price)
            .bind(at)
            .bind(ticker)
            .bind(category.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!(ticker, %session, "price update rejected: stale timestamp or missing row");
        }
        Ok(())
    }

    async fn cache_contract(&self, ticker: &str, category: Category, descriptor: Value) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE stocks SET contract_descriptor = $1, contract_resolved = TRUE, updated_at = NOW()
            WHERE ticker = $2 AND category = $3
            "#,
        )
        .bind(descriptor)
        .bind(ticker)
        .bind(category.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_contract(&self, ticker: &str, category: Category) -> Result<Option<Value>> {
        let row = sqlx::query(
            "SELECT contract_descriptor FROM stocks WHERE ticker = $1 AND category = $2 AND contract_resolved",
        )
        .bind(ticker)
        .bind(category.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| r.get("contract_descriptor")))
    }

    async fn record_session_run(&self, run: &SessionRun) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO session_runs (job, session, trading_day, started_at, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&run.job)
        .bind(run.session.map(|s| s.as_str()))
        .bind(run.trading_day)
        .bind(run.started_at)
        .bind(session_status_str(run.status))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    async fn finish_session_run(&self, run: &SessionRun) -> Result<()> {
        let Some(id) = run.id else {
            return Err(AppError::StoreError("finish_session_run called without an id".to_string()));
        };
        sqlx::query(
            r#"
            UPDATE session_runs
            SET finished_at = $1, status = $2, stocks_priced = $3, alerts_fired = $4, error = $5
            WHERE id = $6
            "#,
        )
        .bind(run.finished_at)
        .bind(session_status_str(run.status))
        .bind(run.stocks_priced)
        .bind(run.alerts_fired)
        .bind(&run.error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn session_status_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Running => "running",
        SessionStatus::Succeeded => "succeeded",
        SessionStatus::Failed => "failed",
    }
}
