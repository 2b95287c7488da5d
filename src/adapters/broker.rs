use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{instrument, warn};

use crate::contract::ContractDescriptor;
use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct Quote {
    pub last: Decimal,
    pub at: DateTime<Utc>,
    /// Which field on the snapshot response actually supplied `last`,
    /// after the NaN → close → mid fallback chain (§4.H point 4).
    pub source: QuoteSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteSource {
    Last,
    Close,
    Mid,
}

#[derive(Serialize)]
struct SnapshotRequest<'a> {
    client_id: i64,
    exchange: &'a str,
    currency: &'a str,
    symbol: &'a str,
}

#[derive(Deserialize)]
struct SnapshotResponse {
    last: Option<f64>,
    close: Option<f64>,
    bid: Option<f64>,
    ask: Option<f64>,
    at: i64,
}

/// A single persistent session to the broker gateway, opened once and
/// reused for every snapshot request in a Price Fetcher run (§4.H point 1).
pub struct BrokerSession {
    client_id: i64,
    stream: Arc<Mutex<BufReader<TcpStream>>>,
}

impl BrokerSession {
    #[instrument(skip_all, fields(host, port, client_id))]
    pub async fn connect(host: &str, port: u16, client_id: i64) -> Result<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;
        Ok(Self {
            client_id,
            stream: Arc::new(Mutex::new(BufReader::new(stream))),
        })
    }

    /// Requests a snapshot quote (no streaming subscription) and applies
    /// the NaN → close → mid fallback chain.
    #[instrument(skip(self, descriptor), fields(ticker = %descriptor.ticker_variant))]
    pub async fn fetch_quote(&self, descriptor: &ContractDescriptor, deadline: Duration) -> Result<Quote> {
        tokio::time::timeout(deadline, self.fetch_quote_inner(descriptor))
            .await
            .map_err(|_| AppError::NoQuote {
                ticker: descriptor.ticker_variant.clone(),
            })?
    }

    async fn fetch_quote_inner(&self, descriptor: &ContractDescriptor) -> Result<Quote> {
        let request = SnapshotRequest {
            client_id: self.client_id,
            exchange: descriptor.exchange,
            currency: descriptor.currency,
            symbol: &descriptor.ticker_variant,
        };
        let mut line = serde_json::to_string(&request).map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;
        line.push('\n');

        let mut guard = self.stream.lock().await;
        guard
            .get_mut()
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;

        let mut response_line = String::new();
        guard
            .read_line(&mut response_line)
            .await
            .map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;
        drop(guard);

        let response: SnapshotResponse =
            serde_json::from_str(response_line.trim()).map_err(|e| AppError::BrokerUnavailable(e.to_string()))?;

        let at = DateTime::from_timestamp(response.at, 0).unwrap_or_else(Utc::now);

        if let Some(last) = response.last.filter(|v| !v.is_nan()) {
            return to_quote(last, at, QuoteSource::Last);
        }
        if let Some(close) = response.close.filter(|v| !v.is_nan()) {
            warn!(ticker = %descriptor.ticker_variant, "last was NaN, falling back to close");
            return to_quote(close, at, QuoteSource::Close);
        }
        if let (Some(bid), Some(ask)) = (
            response.bid.filter(|v| !v.is_nan()),
            response.ask.filter(|v| !v.is_nan()),
        ) {
            warn!(ticker = %descriptor.ticker_variant, "last and close were NaN, falling back to bid/ask midpoint");
            return to_quote((bid + ask) / 2.0, at, QuoteSource::Mid);
        }

        Err(AppError::NoQuote {
            ticker: descriptor.ticker_variant.clone(),
        })
    }
}

fn to_quote(value: f64, at: DateTime<Utc>, source: QuoteSource) -> Result<Quote> {
    let last = Decimal::from_f64_retain(value).ok_or_else(|| AppError::BrokerUnavailable("non-finite price".to_string()))?;
    Ok(Quote { last, at, source })
}
