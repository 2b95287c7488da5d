use clap::{Parser, Subcommand};

use crate::domain::{Category, Session};
use crate::extractor::ExtractMode;

/// Newsletter-to-alert pipeline: extracts tickers from financial
/// newsletters, tracks them against live market data, and fires buy/sell/
/// short/cover alerts.
#[derive(Parser)]
#[command(name = "stockalerts")]
#[command(author = "Stockalerts Team")]
#[command(version)]
#[command(about = "Newsletter-to-alert pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file or directory (default: `config/`)
    #[arg(short, long, default_value = "config")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the scheduler and run forever (09:00/10:45/14:30 jobs).
    Run,

    /// Run the extractor once for the given categories.
    Extract {
        /// Comma-separated categories (default: all four).
        #[arg(long, value_delimiter = ',')]
        categories: Option<Vec<CategoryArg>>,

        /// Lookback window in hours.
        #[arg(long, default_value_t = 72)]
        hours: i64,

        /// `commit` writes through the store; `validate` only reports a diff.
        #[arg(long, default_value = "commit")]
        mode: ModeArg,
    },

    /// Fetch prices for all active stocks and write them to the store.
    Prices {
        /// `am` or `pm`; omit to auto-detect from the current time.
        #[arg(long)]
        session: Option<SessionArg>,
    },

    /// Run the alert evaluator (and send a digest) for one session.
    Alerts {
        /// `am` or `pm`; omit to auto-detect from the current time.
        #[arg(long)]
        session: Option<SessionArg>,
    },
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum CategoryArg {
    Daily,
    Digitalassets,
    Etfs,
    Ideas,
}

impl From<CategoryArg> for Category {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Daily => Category::Daily,
            CategoryArg::Digitalassets => Category::Digitalassets,
            CategoryArg::Etfs => Category::Etfs,
            CategoryArg::Ideas => Category::Ideas,
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ModeArg {
    Commit,
    Validate,
}

impl From<ModeArg> for ExtractMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Commit => ExtractMode::Commit,
            ModeArg::Validate => ExtractMode::Validate,
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum SessionArg {
    Am,
    Pm,
}

impl From<SessionArg> for Session {
    fn from(value: SessionArg) -> Self {
        match value {
            SessionArg::Am => Session::Am,
            SessionArg::Pm => Session::Pm,
        }
    }
}
