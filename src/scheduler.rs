use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::adapters::mail_source::MailSource;
use crate::adapters::mailer::Mailer;
use crate::adapters::ocr::OcrAdapter;
use crate::calendar;
use crate::config::AppConfig;
use crate::contract::ContractResolver;
use crate::domain::{Category, Session, SessionRun};
use crate::error::{AppError, Result};
use crate::evaluator::AlertEvaluator;
use crate::extractor::{ExtractMode, ExtractorOrchestrator};
use crate::notifier::Notifier;
use crate::price_fetcher::{PriceFetcher, PriceRequest};
use crate::services::{HealthState, Metrics};
use crate::store::Store;

/// Wires components A–J into the three cron-like jobs (§4.K), gated by the
/// exchange calendar and serialized by a per-job lock so two scheduler
/// instances can't double-fire the same job.
pub struct Scheduler {
    store: Arc<dyn Store>,
    source: Arc<dyn MailSource>,
    ocr: Arc<dyn OcrAdapter>,
    mailer: Arc<dyn Mailer>,
    resolver: ContractResolver,
    price_fetcher: PriceFetcher,
    evaluator: Arc<AlertEvaluator>,
    config: AppConfig,
    health: Option<Arc<HealthState>>,
    metrics: Arc<Metrics>,
    extraction_lock: Mutex<()>,
    am_lock: Mutex<()>,
    pm_lock: Mutex<()>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        source: Arc<dyn MailSource>,
        ocr: Arc<dyn OcrAdapter>,
        mailer: Arc<dyn Mailer>,
        config: AppConfig,
        health: Option<Arc<HealthState>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let price_fetcher = PriceFetcher::new(
            config.runtime.parallelism,
            config.runtime.broker_spacing_ms,
            Duration::from_secs(config.runtime.per_call_deadlines.broker_secs),
        );

        Self {
            store,
            source,
            ocr,
            mailer,
            resolver: ContractResolver::new(),
            price_fetcher,
            evaluator: Arc::new(AlertEvaluator::new()),
            config,
            health,
            metrics,
            extraction_lock: Mutex::new(()),
            am_lock: Mutex::new(()),
            pm_lock: Mutex::new(()),
        }
    }

    fn job_deadline(&self) -> Duration {
        Duration::from_secs(self.config.runtime.per_call_deadlines.job_secs)
    }

    /// Runs forever, firing the 09:00 extraction job and the 10:45/14:30
    /// session jobs on America/New_York market days. Intended to be raced
    /// against a shutdown signal by the caller (`main.rs`).
    pub async fn run_forever(&self) -> Result<()> {
        loop {
            let now = calendar::now();
            let candidates = [
                (calendar::next_fire(&self.config.schedule.extraction_time, now), Job::Extraction),
                (calendar::next_fire(&self.config.schedule.am_time, now), Job::AmSession),
                (calendar::next_fire(&self.config.schedule.pm_time, now), Job::PmSession),
            ];

            let Some((fire_at, job)) = candidates
                .into_iter()
                .filter_map(|(at, job)| at.map(|at| (at, job)))
                .min_by_key(|(at, _)| *at)
            else {
                warn!("no future market day found within the lookahead window; retrying in an hour");
                tokio::time::sleep(Duration::from_secs(3600)).await;
                continue;
            };

            let wait = (fire_at - now).to_std().unwrap_or(Duration::ZERO);
            info!(?job, wait_secs = wait.as_secs(), "scheduler sleeping until next job");
            tokio::time::sleep(wait).await;

            if let Err(e) = self.dispatch(job).await {
                error!(?job, error = %e, "scheduled job failed");
                self.metrics.inc_job_failures();
            }
        }
    }

    async fn dispatch(&self, job: Job) -> Result<()> {
        match job {
            Job::Extraction => self.run_extraction_job().await.map(|_| ()),
            Job::AmSession => self.run_session_job(Session::Am).await,
            Job::PmSession => self.run_session_job(Session::Pm).await,
        }
    }

    /// 09:00 Extraction (§4.K): all four categories on the first market day
    /// of the ISO week, `{daily, digitalassets}` otherwise.
    #[instrument(skip(self))]
    pub async fn run_extraction_job(&self) -> Result<Vec<crate::extractor::CategorySummary>> {
        let _guard = self.extraction_lock.lock().await;
        let today = calendar::now().date_naive();

        if !calendar::is_market_day(today) {
            info!("not a market day, skipping extraction job");
            return Ok(Vec::new());
        }

        let categories = if calendar::is_first_market_day_of_week(today) {
            parse_categories(&self.config.categories.weekly)
        } else {
            parse_categories(&self.config.categories.daily)
        };

        let mut run = SessionRun::start("extraction", None, today, Utc::now());
        let run_id = self.store.record_session_run(&run).await?;
        run.id = Some(run_id);

        let orchestrator = ExtractorOrchestrator::new(
            Arc::clone(&self.source),
            Arc::clone(&self.ocr),
            Arc::clone(&self.store),
            self.config.parser.crypto_levels_image_index,
            self.config.parser.crypto_stocks_image_index,
        );

        let timeout = self.job_deadline();
        let summaries = match tokio::time::timeout(
            timeout,
            orchestrator.run(&categories, 72, ExtractMode::Commit),
        )
        .await
        {
            Ok(summaries) => summaries,
            Err(_) => {
                run.finish_err(Utc::now(), "job deadline exceeded");
                self.store.finish_session_run(&run).await?;
                return Err(AppError::Other(anyhow::anyhow!("extraction job exceeded its deadline")));
            }
        };

        let mut total_inserted = 0u64;
        let mut total_rejected = 0u64;
        let mut any_error = false;
        for summary in &summaries {
            total_inserted += summary.inserted;
            total_rejected += summary.rejected.len() as u64;
            if summary.error.is_some() {
                any_error = true;
            }
        }
        self.metrics.inc_extraction_runs();
        self.metrics.add_rows_reconciled(total_inserted);
        self.metrics.add_rows_rejected(total_rejected);

        if any_error && summaries.iter().all(|s| s.error.is_some()) {
            run.finish_err(Utc::now(), "every category failed");
        } else {
            run.finish_ok(Utc::now(), total_inserted as i64, 0);
        }
        self.store.finish_session_run(&run).await?;

        if let Some(health) = &self.health {
            health.record_job("extraction", Utc::now()).await;
        }

        Ok(summaries)
    }

    /// The 10:45 AM / 14:30 PM session job: Price Fetcher, then Alert
    /// Evaluator, then Notifier, in that strict order (§5 ordering
    /// guarantee).
    #[instrument(skip(self))]
    pub async fn run_session_job(&self, session: Session) -> Result<()> {
        let lock = match session {
            Session::Am => &self.am_lock,
            Session::Pm => &self.pm_lock,
        };
        let _guard = lock.lock().await;
        let today = calendar::now().date_naive();

        if !calendar::is_market_day(today) {
            info!(%session, "not a market day, skipping session job");
            return Ok(());
        }

        let job_name = match session {
            Session::Am => "am_session",
            Session::Pm => "pm_session",
        };
        let mut run = SessionRun::start(job_name, Some(session), today, Utc::now());
        let run_id = self.store.record_session_run(&run).await?;
        run.id = Some(run_id);

        let result = tokio::time::timeout(self.job_deadline(), self.run_session_inner(session)).await;

        match result {
            Ok(Ok((priced, fired))) => {
                run.finish_ok(Utc::now(), priced as i64, fired as i64);
                self.store.finish_session_run(&run).await?;
                if let Some(health) = &self.health {
                    health.record_job(job_name, Utc::now()).await;
                }
                Ok(())
            }
            Ok(Err(e)) => {
                run.finish_err(Utc::now(), e.to_string());
                self.store.finish_session_run(&run).await?;
                self.metrics.inc_job_failures();
                Err(e)
            }
            Err(_) => {
                run.finish_err(Utc::now(), "job deadline exceeded");
                self.store.finish_session_run(&run).await?;
                self.metrics.inc_job_failures();
                Err(AppError::Other(anyhow::anyhow!("{session} session job exceeded its deadline")))
            }
        }
    }

    async fn run_session_inner(&self, session: Session) -> Result<(usize, usize)> {
        let active = self.store.list_active(None).await?;
        let requests: Vec<PriceRequest> = active
            .iter()
            .map(|s| PriceRequest {
                ticker: s.ticker.clone(),
                category: s.category,
            })
            .collect();

        let priced = if requests.is_empty() {
            0
        } else {
            let results = self
                .price_fetcher
                .fetch_prices(
                    &self.config.broker.host,
                    self.config.broker.port,
                    self.config.broker.client_id,
                    self.store.as_ref(),
                    &self.resolver,
                    requests,
                    session,
                )
                .await?;

            for result in &results {
                self.store
                    .update_price(&result.ticker, result.category, session, result.price, Utc::now())
                    .await?;
            }
            self.metrics.add_quotes_fetched(results.len() as u64);
            results.len()
        };

        // Evaluation happens strictly after every price-fetch write for
        // this session has committed (§5 ordering guarantee).
        let stocks = self.store.list_active(None).await?;
        let alerts = self.evaluator.evaluate(&stocks, session, Utc::now()).await;
        self.metrics.add_alerts_fired(alerts.len() as u64);

        let notifier = Notifier::new(
            self.mailer.as_ref(),
            self.config.mail.from.clone(),
            self.config.mail.to.clone(),
        );
        let trading_day = calendar::now().date_naive();
        let fired = alerts.len();
        notifier.notify(&alerts, session, trading_day).await?;
        if fired > 0 {
            self.metrics.inc_digests_sent();
        }

        Ok((priced, fired))
    }
}

#[derive(Debug, Clone, Copy)]
enum Job {
    Extraction,
    AmSession,
    PmSession,
}

fn parse_categories(names: &[String]) -> Vec<Category> {
    names.iter().filter_map(|n| n.parse().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_categories_skips_unknown_names() {
        let cats = parse_categories(&["daily".to_string(), "bogus".to_string(), "etfs".to_string()]);
        assert_eq!(cats, vec![Category::Daily, Category::Etfs]);
    }
}
