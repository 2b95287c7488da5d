pub mod adapters;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod contract;
pub mod domain;
pub mod error;
pub mod evaluator;
pub mod extractor;
pub mod notifier;
pub mod parsers;
pub mod price_fetcher;
pub mod scheduler;
pub mod services;
pub mod store;

pub use config::AppConfig;
pub use domain::{Alert, AlertKind, Category, ExtractedRow, Sentiment, Session, SessionRun, Stock};
pub use error::{AppError, Result};
