//! Application state shared across the web layer.

use crate::config::Config;
use crate::web::auth::session::{OAuthStateStore, SessionCache};
use anyhow::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A finished CSV export held for re-download.
#[derive(Debug, Clone)]
pub struct CsvExport {
    pub filename: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Per-user storage for the most recent metric CSV export.
///
/// The export is produced by `POST /metricData` and re-served by
/// `GET /DownloadCSV`. Keyed by user id so concurrent exports never clobber
/// each other.
#[derive(Debug, Clone, Default)]
pub struct ExportCache {
    inner: Arc<DashMap<i32, CsvExport>>,
}

impl ExportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, user_id: i32, body: String) {
        self.inner.insert(
            user_id,
            CsvExport {
                filename: "metrics.csv".to_string(),
                body,
                created_at: Utc::now(),
            },
        );
    }

    pub fn get(&self, user_id: i32) -> Option<CsvExport> {
        self.inner.get(&user_id).map(|e| e.value().clone())
    }
}

/// In-memory cache of valid metric type names per study.
///
/// Loaded from the database on startup and refreshed periodically; used by
/// the study page to populate metric selection without a query per request.
pub struct MetricNameCache {
    /// study id → sorted metric type names
    data: HashMap<String, Vec<String>>,
}

impl Default for MetricNameCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricNameCache {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    /// Build the cache from `(study_id, metric_name)` pairs.
    pub fn from_entries(entries: Vec<(String, String)>) -> Self {
        let mut data: HashMap<String, Vec<String>> = HashMap::new();
        for (study_id, name) in entries {
            data.entry(study_id).or_default().push(name);
        }
        for names in data.values_mut() {
            names.sort();
            names.dedup();
        }
        Self { data }
    }

    pub fn names_for_study(&self, study_id: &str) -> Vec<String> {
        self.data.get(study_id).cloned().unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<Config>,
    pub http: reqwest::Client,
    pub session_cache: SessionCache,
    pub oauth_state_store: OAuthStateStore,
    pub export_cache: ExportCache,
    pub metric_name_cache: Arc<RwLock<MetricNameCache>>,
}

impl AppState {
    pub fn new(db_pool: PgPool, config: Config) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("scanboard/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("failed to build http client");
        Self {
            session_cache: SessionCache::new(db_pool.clone()),
            oauth_state_store: OAuthStateStore::new(),
            export_cache: ExportCache::new(),
            metric_name_cache: Arc::new(RwLock::new(MetricNameCache::new())),
            http,
            db_pool,
            config: Arc::new(config),
        }
    }

    /// Initialize the metric name cache from the database.
    pub async fn load_metric_name_cache(&self) -> Result<()> {
        let entries = crate::data::metrics::study_metric_names(&self.db_pool).await?;
        let count = entries.len();
        *self.metric_name_cache.write().await = MetricNameCache::from_entries(entries);
        tracing::info!(entries = count, "Metric name cache loaded");
        Ok(())
    }

    /// Spawn a background task that refreshes the metric name cache every
    /// `interval`. The task runs until the process exits.
    pub fn spawn_metric_name_cache_refresh(&self, interval: std::time::Duration) {
        let state = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // skip the immediate first tick
            loop {
                ticker.tick().await;
                match state.load_metric_name_cache().await {
                    Ok(()) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to refresh metric name cache");
                    }
                }
            }
        });
    }
}
