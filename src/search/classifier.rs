// file: src/search/classifier.rs
// description: keyword-rule query classification and search routing
// reference: configurable keyword-based classification

use crate::config::{ClassifierConfig, ClassifierRule, RuleTarget};
use crate::error::{Result, SearchError};
use crate::models::{ClassificationResult, SearchType};
use tracing::{debug, warn};

pub struct QueryClassifier {
    rules: Vec<ClassifierRule>,
    route_threshold: f32,
}

struct RuleMatch<'a> {
    rule: &'a ClassifierRule,
    keywords: Vec<&'a str>,
}

impl QueryClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        let rules = config
            .rules
            .iter()
            .cloned()
            .map(|mut rule| {
                rule.keywords = rule
                    .keywords
                    .into_iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                rule
            })
            .collect();

        Self {
            rules,
            route_threshold: config.route_threshold,
        }
    }

    /// Never fails: anything that cannot be classified searches everything.
    pub fn classify(&self, query: &str) -> ClassificationResult {
        match self.try_classify(query) {
            Ok(result) => {
                debug!(
                    "Classified query as {} ({:.2}) -> {}",
                    result.query_type, result.confidence, result.search_type
                );
                result
            }
            Err(e) => {
                warn!("Query classification failed, searching everything: {}", e);
                ClassificationResult::fallback()
            }
        }
    }

    fn try_classify(&self, query: &str) -> Result<ClassificationResult> {
        let normalized = query.trim().to_lowercase();
        if !normalized.chars().any(char::is_alphanumeric) {
            return Err(SearchError::Validation(
                "query has no classifiable words".to_string(),
            ));
        }

        let matches: Vec<RuleMatch<'_>> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let keywords: Vec<&str> = rule
                    .keywords
                    .iter()
                    .map(String::as_str)
                    .filter(|k| normalized.contains(k))
                    .collect();
                (!keywords.is_empty()).then_some(RuleMatch { rule, keywords })
            })
            .collect();

        // First rule wins ties, so rule order expresses priority.
        let Some(best) = matches
            .iter()
            .reduce(|best, m| if m.keywords.len() > best.keywords.len() { m } else { best })
        else {
            return Ok(ClassificationResult::fallback());
        };

        let total_hits: usize = matches.iter().map(|m| m.keywords.len()).sum();
        let confidence = confidence(best.keywords.len(), total_hits);

        let table_matched = matches.iter().any(|m| m.rule.target == RuleTarget::Table);
        let text_matched = matches.iter().any(|m| m.rule.target == RuleTarget::Text);

        let search_type = match (table_matched, text_matched) {
            (true, false) if confidence >= self.route_threshold => SearchType::Table,
            (false, true) if confidence >= self.route_threshold => SearchType::Text,
            _ => SearchType::Hybrid,
        };

        // The structured path needs a table even when a text rule ranked first.
        let table_hint = if best.rule.target == RuleTarget::Table {
            best.rule.table_hint.clone()
        } else {
            matches
                .iter()
                .filter(|m| m.rule.target == RuleTarget::Table)
                .reduce(|a, m| if m.keywords.len() > a.keywords.len() { m } else { a })
                .and_then(|m| m.rule.table_hint.clone())
        };

        let mut matched_keywords: Vec<String> = Vec::new();
        for keyword in matches.iter().flat_map(|m| m.keywords.iter()) {
            if !matched_keywords.iter().any(|k| k == keyword) {
                matched_keywords.push(keyword.to_string());
            }
        }

        Ok(ClassificationResult {
            query_type: best.rule.label.clone(),
            confidence,
            search_type,
            table_hint,
            matched_keywords,
        })
    }
}

/// Grows with the winning rule's hit count and shrinks when other rules also
/// matched, staying within [0, 1).
fn confidence(best_hits: usize, total_hits: usize) -> f32 {
    if best_hits == 0 || total_hits == 0 {
        return 0.0;
    }
    let strength = 1.0 - 0.5f32.powi(best_hits as i32);
    let share = best_hits as f32 / total_hits as f32;
    (strength * share).clamp(0.0, 1.0)
}
