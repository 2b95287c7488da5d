use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use super::Metrics;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub components: Vec<ComponentHealth>,
}

/// Shared state updated by the scheduler's jobs and read by the health
/// endpoints. Only the *existence* of this surface is specified (§1) — its
/// routes are an external-collaborator interface, out of scope in detail.
pub struct HealthState {
    pub started_at: DateTime<Utc>,
    pub store_connected: AtomicBool,
    pub last_extraction_run: RwLock<Option<DateTime<Utc>>>,
    pub last_am_run: RwLock<Option<DateTime<Utc>>>,
    pub last_pm_run: RwLock<Option<DateTime<Utc>>>,
    pub metrics: Arc<Metrics>,
}

impl HealthState {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            started_at: Utc::now(),
            store_connected: AtomicBool::new(false),
            last_extraction_run: RwLock::new(None),
            last_am_run: RwLock::new(None),
            last_pm_run: RwLock::new(None),
            metrics,
        }
    }

    pub fn set_store_connected(&self, connected: bool) {
        self.store_connected.store(connected, Ordering::SeqCst);
    }

    pub async fn record_job(&self, job: &str, at: DateTime<Utc>) {
        match job {
            "extraction" => *self.last_extraction_run.write().await = Some(at),
            "am_session" => *self.last_am_run.write().await = Some(at),
            "pm_session" => *self.last_pm_run.write().await = Some(at),
            _ => {}
        }
    }

    pub async fn get_health(&self) -> HealthResponse {
        let store_connected = self.store_connected.load(Ordering::SeqCst);
        let store_status = if store_connected {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        let components = vec![ComponentHealth {
            name: "store".to_string(),
            status: store_status,
            last_check: Some(Utc::now()),
        }];

        let overall = if components.iter().all(|c| c.status == HealthStatus::Healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        HealthResponse {
            status: overall,
            timestamp: Utc::now(),
            uptime_seconds: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
            components,
        }
    }
}

pub struct HealthServer {
    state: Arc<HealthState>,
    port: u16,
}

impl HealthServer {
    pub fn new(state: Arc<HealthState>, port: u16) -> Self {
        Self { state, port }
    }

    pub fn state(&self) -> Arc<HealthState> {
        Arc::clone(&self.state)
    }

    pub async fn run(&self) -> Result<()> {
        let app = Router::new()
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(Arc::clone(&self.state));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!(%addr, "starting health server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .await
            .map_err(|e| AppError::Other(anyhow::anyhow!("health server error: {e}")))?;

        Ok(())
    }
}

async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readiness_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let health = state.get_health().await;
    let code = match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(health))
}

async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unhealthy_until_store_connects() {
        let state = HealthState::new(Arc::new(Metrics::new()));
        let health = state.get_health().await;
        assert_eq!(health.status, HealthStatus::Degraded);

        state.set_store_connected(true);
        let health = state.get_health().await;
        assert_eq!(health.status, HealthStatus::Healthy);
    }
}
