mod alert;
mod stock;

pub use alert::{Alert, AlertDedupKey, AlertKind, Session, SessionRun, SessionStatus};
pub use stock::{normalize_ticker, Category, ExtractedRow, Sentiment, Stock};
