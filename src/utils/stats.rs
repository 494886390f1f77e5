// file: src/utils/stats.rs
// description: process-wide search telemetry accumulator backing the stats read
// reference: atomic counter discipline from pipeline progress tracking

use crate::config::TelemetryConfig;
use crate::models::SearchType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// One completed request as seen by telemetry.
#[derive(Debug, Clone)]
pub struct SearchEvent {
    pub query: String,
    pub search_type: SearchType,
    pub latency: Duration,
    pub success: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTypeCounts {
    pub table_only: u64,
    pub text_only: u64,
    pub hybrid: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    pub total_searches: u64,
    /// Seconds.
    pub average_search_time: f64,
    /// Fraction of successful searches in [0, 1].
    pub success_rate: f64,
    pub popular_queries: Vec<String>,
    pub search_types: SearchTypeCounts,
}

#[derive(Debug, Default)]
struct TelemetryState {
    total: u64,
    successes: u64,
    total_latency: Duration,
    query_counts: HashMap<String, u64>,
    search_types: SearchTypeCounts,
}

/// Cloneable handle to the accumulator; clones share state.
#[derive(Debug, Clone)]
pub struct SearchTelemetry {
    state: Arc<Mutex<TelemetryState>>,
    popular_limit: usize,
    max_tracked_queries: usize,
}

impl SearchTelemetry {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(TelemetryState::default())),
            popular_limit: config.popular_queries_limit.max(1),
            max_tracked_queries: config.max_tracked_queries.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TelemetryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Search telemetry lock was poisoned; continuing with recovered state");
                poisoned.into_inner()
            }
        }
    }

    /// Best-effort: never fails and holds the lock only for the increments.
    pub fn record(&self, event: SearchEvent) {
        let key = normalize_query(&event.query);
        let mut state = self.lock();

        state.total += 1;
        if event.success {
            state.successes += 1;
        }
        state.total_latency += event.latency;

        match event.search_type {
            SearchType::Table => state.search_types.table_only += 1,
            SearchType::Text => state.search_types.text_only += 1,
            SearchType::Hybrid => state.search_types.hybrid += 1,
        }

        if key.is_empty() {
            return;
        }

        if !state.query_counts.contains_key(&key)
            && state.query_counts.len() >= self.max_tracked_queries
        {
            let evicted = state
                .query_counts
                .iter()
                .min_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(query, _)| query.clone());
            if let Some(evicted) = evicted {
                debug!("Evicting least frequent query from telemetry: {}", evicted);
                state.query_counts.remove(&evicted);
            }
        }

        *state.query_counts.entry(key).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> SearchStats {
        let state = self.lock();

        let average_search_time = if state.total > 0 {
            round_millis(state.total_latency.as_secs_f64() / state.total as f64)
        } else {
            0.0
        };

        let success_rate = if state.total > 0 {
            state.successes as f64 / state.total as f64
        } else {
            0.0
        };

        let mut ranked: Vec<(&String, &u64)> = state.query_counts.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let popular_queries = ranked
            .into_iter()
            .take(self.popular_limit)
            .map(|(query, _)| query.clone())
            .collect();

        SearchStats {
            total_searches: state.total,
            average_search_time,
            success_rate,
            popular_queries,
            search_types: state.search_types.clone(),
        }
    }

    pub fn reset(&self) {
        *self.lock() = TelemetryState::default();
    }
}

fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn round_millis(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}
