// file: src/utils/telemetry.rs
// description: Health reporting and operation timing for the search backends
// reference: operation timing and backend health checks

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Health status for various system components
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Partial,
    Unhealthy,
}

/// Health check result for a component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub component: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub response_time_ms: u64,
}

impl HealthCheck {
    pub fn healthy(component: &str, response_time: Duration) -> Self {
        Self {
            component: component.to_string(),
            status: HealthStatus::Healthy,
            message: None,
            response_time_ms: response_time.as_millis() as u64,
        }
    }

    pub fn unhealthy(component: &str, message: String, response_time: Duration) -> Self {
        Self {
            component: component.to_string(),
            status: HealthStatus::Unhealthy,
            message: Some(message),
            response_time_ms: response_time.as_millis() as u64,
        }
    }

    pub fn is_up(&self) -> bool {
        self.status != HealthStatus::Unhealthy
    }
}

/// Overall system health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub structured_store: bool,
    pub semantic_index: bool,
    pub generation_service: bool,
    pub message: String,
    pub checks: Vec<HealthCheck>,
    pub timestamp: u64,
    pub version: String,
}

impl HealthReport {
    /// Search is what matters: both search backends down is unhealthy, any
    /// other missing piece is partial.
    pub fn new(
        structured: HealthCheck,
        semantic: HealthCheck,
        generation: HealthCheck,
        version: String,
    ) -> Self {
        let structured_up = structured.is_up();
        let semantic_up = semantic.is_up();
        let generation_up = generation.is_up();

        let (status, message) = match (structured_up, semantic_up) {
            (false, false) => (
                HealthStatus::Unhealthy,
                "No search backend is reachable".to_string(),
            ),
            (true, true) if generation_up => (
                HealthStatus::Healthy,
                "All services are operational".to_string(),
            ),
            (true, true) => (
                HealthStatus::Partial,
                "Search is available; answers fall back to search-only results".to_string(),
            ),
            (true, false) => (
                HealthStatus::Partial,
                "Semantic index unavailable; serving table results only".to_string(),
            ),
            (false, true) => (
                HealthStatus::Partial,
                "Structured store unavailable; serving text results only".to_string(),
            ),
        };

        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_secs();

        Self {
            status,
            structured_store: structured_up,
            semantic_index: semantic_up,
            generation_service: generation_up,
            message,
            checks: vec![structured, semantic, generation],
            timestamp,
            version,
        }
    }

    pub fn format(&self) -> String {
        let status_icon = match self.status {
            HealthStatus::Healthy => "✓",
            HealthStatus::Partial => "⚠",
            HealthStatus::Unhealthy => "✗",
        };

        let mut output = format!(
            "{} System Health: {:?}\n\
             {}\n\
             Version: {}\n\
             Timestamp: {}\n\n",
            status_icon,
            self.status,
            self.message,
            self.version,
            chrono::DateTime::from_timestamp(self.timestamp as i64, 0)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        for check in &self.checks {
            let check_icon = match check.status {
                HealthStatus::Healthy => "✓",
                HealthStatus::Partial => "⚠",
                HealthStatus::Unhealthy => "✗",
            };

            output.push_str(&format!(
                "{} {} ({:?}) - {}ms",
                check_icon, check.component, check.status, check.response_time_ms
            ));

            if let Some(ref msg) = check.message {
                output.push_str(&format!("\n  {}", msg));
            }

            output.push('\n');
        }

        output
    }
}

/// Operation timer for performance tracking
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        debug!("Starting operation: {}", operation);
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        info!(
            "Completed operation: {} in {:.3}s",
            self.operation,
            elapsed.as_secs_f64()
        );
        elapsed
    }

    pub fn finish_with_count(self, count: usize) -> Duration {
        let elapsed = self.elapsed();
        info!(
            "Completed operation: {} - {} items in {:.3}s",
            self.operation,
            count,
            elapsed.as_secs_f64()
        );
        elapsed
    }

    pub fn warn_if_slow(&self, threshold: Duration, message: &str) {
        let elapsed = self.elapsed();
        if elapsed > threshold {
            warn!(
                "Slow operation [{}]: {} took {:.2}s (threshold: {:.2}s)",
                self.operation,
                message,
                elapsed.as_secs_f64(),
                threshold.as_secs_f64()
            );
        }
    }
}
