// file: src/utils/validation.rs
// description: request validation utilities and text helpers
// reference: input validation patterns

use crate::error::{Result, SearchError};

pub struct Validator;

impl Validator {
    /// Non-blank and at most `max_chars` characters (counted as chars, not bytes).
    pub fn validate_query_text(field: &str, text: &str, max_chars: usize) -> Result<()> {
        if text.trim().is_empty() {
            return Err(SearchError::Validation(format!("{} must not be empty", field)));
        }

        let length = text.chars().count();
        if length > max_chars {
            return Err(SearchError::Validation(format!(
                "{} is too long ({} characters, max {})",
                field, length, max_chars
            )));
        }

        Ok(())
    }

    pub fn validate_limit(field: &str, value: usize, max: usize) -> Result<()> {
        if value == 0 || value > max {
            return Err(SearchError::Validation(format!(
                "{} must be between 1 and {} (got {})",
                field, max, value
            )));
        }
        Ok(())
    }

    pub fn validate_content_not_empty(content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(SearchError::Validation("Content is empty".to_string()));
        }
        Ok(())
    }

    pub fn validate_url(url: &str) -> Result<()> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(SearchError::Validation(format!(
                "Invalid URL format: {}",
                url
            )));
        }
        Ok(())
    }

    pub fn validate_batch_size(size: usize) -> Result<()> {
        if size == 0 {
            return Err(SearchError::Validation(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if size > 10000 {
            return Err(SearchError::Validation(
                "Batch size too large (max 10000)".to_string(),
            ));
        }

        Ok(())
    }

    /// SQLite identifiers are interpolated into statements, so only plain names pass.
    pub fn validate_identifier(name: &str) -> Result<()> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !name.starts_with(|c: char| c.is_ascii_digit());
        if !valid {
            return Err(SearchError::Validation(format!(
                "Invalid identifier: {}",
                name
            )));
        }
        Ok(())
    }

    pub fn truncate_text(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            None => text.to_string(),
            Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_query_text() {
        assert!(Validator::validate_query_text("question", "a", 1000).is_ok());
        assert!(Validator::validate_query_text("question", "", 1000).is_err());
        assert!(Validator::validate_query_text("question", "  \n ", 1000).is_err());
        assert!(Validator::validate_query_text("question", &"매".repeat(1000), 1000).is_ok());
        assert!(Validator::validate_query_text("question", &"매".repeat(1001), 1000).is_err());
    }

    #[test]
    fn test_validate_limit() {
        assert!(Validator::validate_limit("limit", 1, 20).is_ok());
        assert!(Validator::validate_limit("limit", 20, 20).is_ok());
        assert!(Validator::validate_limit("limit", 0, 20).is_err());
        assert!(Validator::validate_limit("limit", 21, 20).is_err());
    }

    #[test]
    fn test_validate_content_not_empty() {
        assert!(Validator::validate_content_not_empty("content").is_ok());
        assert!(Validator::validate_content_not_empty("").is_err());
        assert!(Validator::validate_content_not_empty("   ").is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(Validator::validate_url("https://api.groq.com/openai/v1").is_ok());
        assert!(Validator::validate_url("http://localhost:8080").is_ok());
        assert!(Validator::validate_url("api.groq.com").is_err());
    }

    #[test]
    fn test_validate_batch_size() {
        assert!(Validator::validate_batch_size(100).is_ok());
        assert!(Validator::validate_batch_size(0).is_err());
        assert!(Validator::validate_batch_size(10001).is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(Validator::validate_identifier("sales_records").is_ok());
        assert!(Validator::validate_identifier("sales; DROP").is_err());
        assert!(Validator::validate_identifier("1table").is_err());
        assert!(Validator::validate_identifier("").is_err());
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(Validator::truncate_text("short", 10), "short");
        assert_eq!(
            Validator::truncate_text("this is a very long text", 10),
            "this is a ..."
        );
        assert_eq!(Validator::truncate_text("매출현황보고", 2), "매출...");
    }
}
