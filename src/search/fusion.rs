// file: src/search/fusion.rs
// description: merges structured and semantic hits into one ranked result set

use crate::error::{Result, SearchError};
use crate::models::{
    BackendFailure, ClassificationResult, FusedResultSet, SearchItem, TableSearchResult,
    TextSearchResult,
};
use std::cmp::Ordering;
use tracing::{debug, warn};

pub const STRUCTURED_BACKEND: &str = "structured";
pub const SEMANTIC_BACKEND: &str = "semantic";

/// What one adapter produced for a request.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterOutcome<T> {
    Ok(Vec<T>),
    Failed(String),
    TimedOut,
    /// Not invoked for this query.
    Skipped,
}

impl<T> AdapterOutcome<T> {
    pub fn from_result(result: Result<Vec<T>>) -> Self {
        match result {
            Ok(items) => AdapterOutcome::Ok(items),
            Err(SearchError::Timeout { .. }) => AdapterOutcome::TimedOut,
            Err(e) => AdapterOutcome::Failed(e.to_string()),
        }
    }

    pub fn invoked(&self) -> bool {
        !matches!(self, AdapterOutcome::Skipped)
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, AdapterOutcome::Ok(_))
    }

    pub fn failure(&self, backend: &str) -> Option<BackendFailure> {
        match self {
            AdapterOutcome::Failed(reason) => Some(BackendFailure {
                backend: backend.to_string(),
                reason: reason.clone(),
                timed_out: false,
            }),
            AdapterOutcome::TimedOut => Some(BackendFailure {
                backend: backend.to_string(),
                reason: "timed out".to_string(),
                timed_out: true,
            }),
            AdapterOutcome::Ok(_) | AdapterOutcome::Skipped => None,
        }
    }

    pub fn into_results(self) -> Vec<T> {
        match self {
            AdapterOutcome::Ok(items) => items,
            _ => Vec::new(),
        }
    }
}

/// Slack for scores that are nominally `dedup_delta` apart but not in f32.
const SCORE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
pub struct ResultFusion {
    dedup_delta: f32,
}

impl ResultFusion {
    pub fn new(dedup_delta: f32) -> Self {
        Self {
            dedup_delta: dedup_delta.max(0.0),
        }
    }

    /// Fails with `SearchUnavailable` when no invoked adapter succeeded;
    /// otherwise marks the set degraded if any invoked adapter failed.
    pub fn fuse(
        &self,
        table: AdapterOutcome<TableSearchResult>,
        text: AdapterOutcome<TextSearchResult>,
        limit: usize,
        analysis: ClassificationResult,
        search_time: f64,
    ) -> Result<FusedResultSet> {
        let failures: Vec<BackendFailure> = [
            table.failure(STRUCTURED_BACKEND),
            text.failure(SEMANTIC_BACKEND),
        ]
        .into_iter()
        .flatten()
        .collect();

        if !table.succeeded() && !text.succeeded() {
            let reasons = failures
                .iter()
                .map(|f| format!("{}: {}", f.backend, f.reason))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SearchError::SearchUnavailable(if reasons.is_empty() {
                "no search backend was invoked".to_string()
            } else {
                reasons
            }));
        }

        for failure in &failures {
            warn!(
                "Serving degraded results without {}: {}",
                failure.backend, failure.reason
            );
        }

        let mut items: Vec<SearchItem> = table
            .into_results()
            .into_iter()
            .map(SearchItem::from)
            .chain(text.into_results().into_iter().map(SearchItem::from))
            .collect();

        items.sort_by(SearchItem::rank_cmp);
        let mut items = self.dedup(items);
        items.truncate(limit);

        debug!("Fused {} results", items.len());

        Ok(FusedResultSet {
            total_count: items.len(),
            items,
            search_time,
            search_type: analysis.search_type,
            analysis,
            degraded: !failures.is_empty(),
            failures,
        })
    }

    /// Expects `items` in rank order and keeps it.
    fn dedup(&self, items: Vec<SearchItem>) -> Vec<SearchItem> {
        let mut kept: Vec<SearchItem> = Vec::with_capacity(items.len());

        for item in items {
            match kept.iter().position(|k| self.collapses(k, &item)) {
                None => kept.push(item),
                Some(idx) => {
                    let existing = &kept[idx];
                    let tie = existing.score().partial_cmp(&item.score()) == Some(Ordering::Equal);
                    if tie && item.is_chunk() && !existing.is_chunk() {
                        debug!("Preferring chunk {} over row {}", item.id(), existing.id());
                        kept[idx] = item;
                    } else {
                        debug!("Dropping duplicate {} result {}", item.kind(), item.id());
                    }
                }
            }
        }

        kept.sort_by(SearchItem::rank_cmp);
        kept
    }

    /// Repeats of one item always collapse. A row and a chunk collapse when
    /// they cite the same document with nearly equal scores. Distinct rows
    /// or distinct chunks of one document are kept.
    fn collapses(&self, a: &SearchItem, b: &SearchItem) -> bool {
        if a.kind() == b.kind() {
            return a.id() == b.id();
        }
        match (a.doc_id(), b.doc_id()) {
            (Some(x), Some(y)) if x == y => {
                let gap = (f64::from(a.score()) - f64::from(b.score())).abs();
                gap <= f64::from(self.dedup_delta) + SCORE_EPSILON
            }
            _ => false,
        }
    }
}
