use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::adapters::broker::{BrokerSession, QuoteSource};
use crate::contract::ContractResolver;
use crate::domain::{Category, Session};
use crate::error::Result;
use crate::store::Store;

pub struct PriceRequest {
    pub ticker: String,
    pub category: Category,
}

pub struct PriceResult {
    pub ticker: String,
    pub category: Category,
    pub price: Decimal,
    pub source: QuoteSource,
}

pub struct PriceFetcher {
    parallelism: usize,
    spacing: Duration,
    per_ticker_deadline: Duration,
}

impl PriceFetcher {
    pub fn new(parallelism: usize, spacing_ms: u64, per_ticker_deadline: Duration) -> Self {
        Self {
            parallelism,
            spacing: Duration::from_millis(spacing_ms),
            per_ticker_deadline,
        }
    }

    /// Opens a single persistent session, then fans out per-ticker snapshot
    /// requests in submission order with bounded concurrency and a global
    /// pacing governor (§4.H, §5).
    #[instrument(skip(self, store, resolver, requests), fields(n = requests.len(), session = %session))]
    pub async fn fetch_prices(
        &self,
        host: &str,
        port: u16,
        client_id: i64,
        store: &dyn Store,
        resolver: &ContractResolver,
        requests: Vec<PriceRequest>,
        session: Session,
    ) -> Result<Vec<PriceResult>> {
        let broker = match BrokerSession::connect(host, port, client_id).await {
            Ok(session) => Arc::new(session),
            Err(e) => {
                warn!(error = %e, "broker gateway unavailable, aborting price fetch for all tickers");
                return Err(e);
            }
        };

        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let deadline = self.per_ticker_deadline;
        let mut handles = Vec::with_capacity(requests.len());

        for (index, request) in requests.into_iter().enumerate() {
            let broker = Arc::clone(&broker);
            let semaphore = Arc::clone(&semaphore);
            let descriptor = resolver.classify(&request.ticker, request.category);
            let spacing = self.spacing * index as u32;

            handles.push(tokio::spawn(async move {
                tokio::time::sleep(spacing).await;
                let _permit = semaphore.acquire().await.expect("semaphore not closed");
                let outcome = broker.fetch_quote(&descriptor, deadline).await;
                (request.ticker, request.category, outcome)
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            match handle.await {
                Ok((ticker, category, Ok(quote))) => {
                    results.push(PriceResult {
                        ticker,
                        category,
                        price: quote.last,
                        source: quote.source,
                    });
                }
                Ok((ticker, _category, Err(e))) => {
                    warn!(ticker = %ticker, error = %e, "price fetch failed for ticker, continuing batch");
                }
                Err(join_err) => {
                    warn!(error = %join_err, "price fetch task panicked");
                }
            }
        }

        info!(fetched = results.len(), "price fetch batch complete");
        Ok(results)
    }
}
