use thiserror::Error;

/// Crate-wide error type for the extract-reconcile-evaluate pipeline.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Newsletter source adapter
    #[error("Newsletter source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("No matching message for category {category} in the lookback window")]
    NoMessage { category: String },

    // Parsing / OCR
    #[error("parse error in category {category}: {message}")]
    ParseError { category: String, message: String },

    #[error("OCR error: {0}")]
    OcrError(String),

    // Store
    #[error("Store error: {0}")]
    StoreError(String),

    // Price fetcher
    #[error("Broker gateway unavailable: {0}")]
    BrokerUnavailable(String),

    #[error("No quote available for {ticker}")]
    NoQuote { ticker: String },

    // Notifier
    #[error("Mail dispatch error: {0}")]
    MailError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
