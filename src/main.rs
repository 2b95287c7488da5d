use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use stockalerts::adapters::mail_source::ImapMailSource;
use stockalerts::adapters::mailer::SmtpMailer;
use stockalerts::adapters::ocr::HttpOcrAdapter;
use stockalerts::cli::{Cli, Commands};
use stockalerts::config::AppConfig;
use stockalerts::contract::ContractResolver;
use stockalerts::domain::{Category, Session};
use stockalerts::error::AppError;
use stockalerts::extractor::ExtractorOrchestrator;
use stockalerts::notifier::Notifier;
use stockalerts::price_fetcher::{PriceFetcher, PriceRequest};
use stockalerts::scheduler::Scheduler;
use stockalerts::services::{HealthServer, HealthState, Metrics};
use stockalerts::store::{PgStore, Store};

/// Exit codes of the workflow runner, per spec §6.
const EXIT_OK: u8 = 0;
const EXIT_OTHER: u8 = 1;
const EXIT_NO_MESSAGE: u8 = 2;
const EXIT_BROKER_UNAVAILABLE: u8 = 3;
const EXIT_STORE_ERROR: u8 = 4;
const EXIT_MAIL_ERROR: u8 = 5;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load_from(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            // ConfigError at startup is fatal (§7).
            eprintln!("config error: {e}");
            return ExitCode::from(EXIT_OTHER);
        }
    };

    init_logging(&config);

    let problems = config.validate();
    if !problems.is_empty() {
        for p in &problems {
            tracing::error!("invalid configuration: {p}");
        }
        return ExitCode::from(EXIT_OTHER);
    }

    match run(cli, config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

fn exit_code_for(err: &AppError) -> u8 {
    match err {
        AppError::NoMessage { .. } => EXIT_NO_MESSAGE,
        AppError::BrokerUnavailable(_) => EXIT_BROKER_UNAVAILABLE,
        AppError::StoreError(_) | AppError::Database(_) | AppError::Migration(_) => EXIT_STORE_ERROR,
        AppError::MailError(_) => EXIT_MAIL_ERROR,
        _ => EXIT_OTHER,
    }
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<u8, AppError> {
    let store: Arc<dyn Store> = {
        let pg = PgStore::new(&config.database.url, config.database.max_connections).await?;
        pg.migrate().await?;
        Arc::new(pg)
    };

    let metrics = Arc::new(Metrics::new());
    let health = match config.health_port {
        Some(port) => {
            let state = Arc::new(HealthState::new(Arc::clone(&metrics)));
            state.set_store_connected(true);
            let server = HealthServer::new(Arc::clone(&state), port);
            tokio::spawn(async move {
                if let Err(e) = server.run().await {
                    tracing::error!(error = %e, "health server exited");
                }
            });
            Some(state)
        }
        None => None,
    };

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_scheduler(store, config, health, metrics).await,
        Commands::Extract { categories, hours, mode } => {
            run_extract_once(store, &config, categories, hours, mode.into()).await
        }
        Commands::Prices { session } => run_prices_once(store, &config, resolve_session(session)?).await,
        Commands::Alerts { session } => run_alerts_once(store, &config, resolve_session(session)?).await,
    }
}

fn resolve_session(
    session: Option<stockalerts::cli::SessionArg>,
) -> Result<Session, AppError> {
    if let Some(s) = session {
        return Ok(s.into());
    }
    stockalerts::calendar::infer_session(stockalerts::calendar::now())
        .ok_or_else(|| AppError::InvalidConfig("could not auto-detect session; pass --session".into()))
}

async fn run_scheduler(
    store: Arc<dyn Store>,
    config: AppConfig,
    health: Option<Arc<HealthState>>,
    metrics: Arc<Metrics>,
) -> Result<u8, AppError> {
    let source = build_source(&config);
    let ocr = build_ocr(&config);
    let mailer = build_mailer(&config)?;

    let scheduler = Scheduler::new(store, source, ocr, mailer, config, health, metrics);

    tokio::select! {
        result = scheduler.run_forever() => {
            result?;
            Ok(EXIT_OK)
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal, exiting");
            Ok(EXIT_OK)
        }
    }
}

async fn run_extract_once(
    store: Arc<dyn Store>,
    config: &AppConfig,
    categories: Option<Vec<stockalerts::cli::CategoryArg>>,
    hours: i64,
    mode: stockalerts::extractor::ExtractMode,
) -> Result<u8, AppError> {
    let categories: Vec<Category> = match categories {
        Some(cats) => cats.into_iter().map(Category::from).collect(),
        None => vec![Category::Daily, Category::Digitalassets, Category::Etfs, Category::Ideas],
    };

    let source = build_source(config);
    let ocr = build_ocr(config);
    let orchestrator = ExtractorOrchestrator::new(
        source,
        ocr,
        store,
        config.parser.crypto_levels_image_index,
        config.parser.crypto_stocks_image_index,
    );

    let summaries = orchestrator.run(&categories, hours, mode).await;

    let mut any_matched = false;
    for summary in &summaries {
        if let Some(err) = &summary.error {
            tracing::warn!(category = ?summary.category, error = %err, "category extraction failed");
        } else {
            any_matched = any_matched || summary.matched_message_id.is_some();
        }
        tracing::info!(
            category = ?summary.category,
            row_count = summary.row_count,
            inserted = summary.inserted,
            rejected = summary.rejected.len(),
            "category extraction summary"
        );
    }

    if !any_matched {
        return Ok(EXIT_NO_MESSAGE);
    }
    Ok(EXIT_OK)
}

async fn run_prices_once(store: Arc<dyn Store>, config: &AppConfig, session: Session) -> Result<u8, AppError> {
    let active = store.list_active(None).await?;
    let requests: Vec<PriceRequest> = active
        .into_iter()
        .map(|s| PriceRequest {
            ticker: s.ticker,
            category: s.category,
        })
        .collect();

    if requests.is_empty() {
        tracing::info!("no active stocks to price");
        return Ok(EXIT_OK);
    }

    let fetcher = PriceFetcher::new(
        config.runtime.parallelism,
        config.runtime.broker_spacing_ms,
        Duration::from_secs(config.runtime.per_call_deadlines.broker_secs),
    );
    let resolver = ContractResolver::new();

    let results = fetcher
        .fetch_prices(
            &config.broker.host,
            config.broker.port,
            config.broker.client_id,
            store.as_ref(),
            &resolver,
            requests,
            session,
        )
        .await?;

    for result in &results {
        store
            .update_price(&result.ticker, result.category, session, result.price, chrono::Utc::now())
            .await?;
    }

    tracing::info!(priced = results.len(), "price fetch complete");
    Ok(EXIT_OK)
}

async fn run_alerts_once(store: Arc<dyn Store>, config: &AppConfig, session: Session) -> Result<u8, AppError> {
    let stocks = store.list_active(None).await?;
    let evaluator = stockalerts::evaluator::AlertEvaluator::new();
    let alerts = evaluator.evaluate(&stocks, session, chrono::Utc::now()).await;

    let mailer = build_mailer(config)?;
    let notifier = Notifier::new(mailer.as_ref(), config.mail.from.clone(), config.mail.to.clone());
    let trading_day = stockalerts::calendar::now().date_naive();
    let fired = alerts.len();
    notifier.notify(&alerts, session, trading_day).await?;

    tracing::info!(fired, "alert evaluation complete");
    Ok(EXIT_OK)
}

#[derive(serde::Deserialize)]
struct SourceCredentials {
    user: String,
    password: String,
}

fn build_source(config: &AppConfig) -> Arc<dyn stockalerts::adapters::mail_source::MailSource> {
    // Credential loading mechanics are an out-of-scope collaborator (§6); this
    // just reads the JSON file named by `source.credentials_path`.
    let creds = std::fs::read_to_string(&config.source.credentials_path)
        .ok()
        .and_then(|raw| serde_json::from_str::<SourceCredentials>(&raw).ok());

    let (user, password) = match creds {
        Some(c) => (c.user, c.password),
        None => {
            tracing::warn!(
                path = %config.source.credentials_path,
                "could not load newsletter source credentials; falling back to mail config"
            );
            (config.mail.user.clone(), config.mail.password.clone())
        }
    };

    Arc::new(ImapMailSource::new(
        config.source.imap_host.clone(),
        config.source.imap_port,
        user,
        password,
    ))
}

fn build_ocr(config: &AppConfig) -> Arc<dyn stockalerts::adapters::ocr::OcrAdapter> {
    Arc::new(HttpOcrAdapter::new(
        config.ocr.endpoint.clone(),
        config.ocr.api_key.clone(),
        Duration::from_secs(config.runtime.per_call_deadlines.ocr_secs),
    ))
}

fn build_mailer(config: &AppConfig) -> Result<Arc<dyn stockalerts::adapters::mailer::Mailer>, AppError> {
    let mailer = SmtpMailer::new(
        &config.mail.host,
        config.mail.port,
        &config.mail.user,
        &config.mail.password,
    )?;
    Ok(Arc::new(mailer))
}
