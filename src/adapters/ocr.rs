use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

use crate::error::Result;

/// A table as returned by OCR: rows of cells, preserving row/column order.
pub type TableText = Vec<Vec<String>>;

#[async_trait]
pub trait OcrAdapter: Send + Sync {
    /// Stateless and idempotent for a given image. On failure, returns an
    /// empty table — callers decide whether the category extraction fails
    /// or proceeds partially.
    async fn ocr(&self, image_bytes: &[u8], hint: Option<&str>) -> TableText;
}

pub struct HttpOcrAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    deadline: Duration,
}

impl HttpOcrAdapter {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, deadline: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            deadline,
        }
    }

    async fn request(&self, image_bytes: &[u8], hint: Option<&str>) -> Result<TableText> {
        #[derive(Deserialize)]
        struct OcrResponse {
            rows: Vec<Vec<String>>,
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(self.deadline)
            .query(&[("hint", hint.unwrap_or(""))])
            .body(image_bytes.to_vec())
            .send()
            .await?;

        let parsed: OcrResponse = response.json().await?;
        Ok(parsed.rows)
    }
}

#[async_trait]
impl OcrAdapter for HttpOcrAdapter {
    #[instrument(skip(self, image_bytes))]
    async fn ocr(&self, image_bytes: &[u8], hint: Option<&str>) -> TableText {
        match self.request(image_bytes, hint).await {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(error = %e, "ocr request failed, returning empty table");
                Vec::new()
            }
        }
    }
}
