use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters surfaced through the `/metrics` endpoint.
/// Incremented by the scheduler's jobs; read-only everywhere else.
pub struct Metrics {
    pub extraction_runs: AtomicU64,
    pub rows_reconciled: AtomicU64,
    pub rows_rejected: AtomicU64,
    pub quotes_fetched: AtomicU64,
    pub quotes_failed: AtomicU64,
    pub alerts_fired: AtomicU64,
    pub digests_sent: AtomicU64,
    pub job_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            extraction_runs: AtomicU64::new(0),
            rows_reconciled: AtomicU64::new(0),
            rows_rejected: AtomicU64::new(0),
            quotes_fetched: AtomicU64::new(0),
            quotes_failed: AtomicU64::new(0),
            alerts_fired: AtomicU64::new(0),
            digests_sent: AtomicU64::new(0),
            job_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_extraction_runs(&self) {
        self.extraction_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows_reconciled(&self, n: u64) {
        self.rows_reconciled.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_rows_rejected(&self, n: u64) {
        self.rows_rejected.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_quotes_fetched(&self, n: u64) {
        self.quotes_fetched.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_quotes_failed(&self) {
        self.quotes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_alerts_fired(&self, n: u64) {
        self.alerts_fired.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_digests_sent(&self) {
        self.digests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_job_failures(&self) {
        self.job_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Renders the Prometheus text exposition format.
    pub fn render(&self) -> String {
        format!(
            r#"# HELP stockalerts_extraction_runs_total Extraction jobs run
# TYPE stockalerts_extraction_runs_total counter
stockalerts_extraction_runs_total {extraction_runs}

# HELP stockalerts_rows_reconciled_total Ticker rows written by replace_category
# TYPE stockalerts_rows_reconciled_total counter
stockalerts_rows_reconciled_total {rows_reconciled}

# HELP stockalerts_rows_rejected_total Ticker rows rejected during reconciliation
# TYPE stockalerts_rows_rejected_total counter
stockalerts_rows_rejected_total {rows_rejected}

# HELP stockalerts_quotes_fetched_total Successful price-fetch snapshots
# TYPE stockalerts_quotes_fetched_total counter
stockalerts_quotes_fetched_total {quotes_fetched}

# HELP stockalerts_quotes_failed_total Failed price-fetch snapshots
# TYPE stockalerts_quotes_failed_total counter
stockalerts_quotes_failed_total {quotes_failed}

# HELP stockalerts_alerts_fired_total Alerts emitted by the evaluator
# TYPE stockalerts_alerts_fired_total counter
stockalerts_alerts_fired_total {alerts_fired}

# HELP stockalerts_digests_sent_total Session digests dispatched
# TYPE stockalerts_digests_sent_total counter
stockalerts_digests_sent_total {digests_sent}

# HELP stockalerts_job_failures_total Scheduler job failures
# TYPE stockalerts_job_failures_total counter
stockalerts_job_failures_total {job_failures}
"#,
            extraction_runs = self.extraction_runs.load(Ordering::Relaxed),
            rows_reconciled = self.rows_reconciled.load(Ordering::Relaxed),
            rows_rejected = self.rows_rejected.load(Ordering::Relaxed),
            quotes_fetched = self.quotes_fetched.load(Ordering::Relaxed),
            quotes_failed = self.quotes_failed.load(Ordering::Relaxed),
            alerts_fired = self.alerts_fired.load(Ordering::Relaxed),
            digests_sent = self.digests_sent.load(Ordering::Relaxed),
            job_failures = self.job_failures.load(Ordering::Relaxed),
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_reflects_counters() {
        let m = Metrics::new();
        m.inc_extraction_runs();
        m.add_alerts_fired(3);
        let text = m.render();
        assert!(text.contains("stockalerts_extraction_runs_total 1"));
        assert!(text.contains("stockalerts_alerts_fired_total 3"));
    }
}
