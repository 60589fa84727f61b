//! Request DTOs for the diagnostic API
//!
//! Defines the structure of incoming query strings and request bodies.

use regex::Regex;
use serde::Deserialize;

use crate::error::Result;

/// Query string for `GET /keys`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListKeysQuery {
    /// Regex the key must match
    pub pattern: Option<String>,
    /// Maximum rows returned
    pub limit: Option<usize>,
}

impl ListKeysQuery {
    /// Compiles `pattern`, if any.
    pub fn regex(&self) -> Result<Option<Regex>> {
        Ok(self.pattern.as_deref().map(Regex::new).transpose()?)
    }
}

/// Request body for `POST /invalidate`
///
/// Either or both of `tags` and `pattern` may be given.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvalidateRequest {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub pattern: Option<String>,
}

impl InvalidateRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.tags.is_empty() && self.pattern.is_none() {
            return Some("Provide at least one tag or a key pattern".to_string());
        }
        if self.tags.iter().any(|t| t.is_empty()) {
            return Some("Tags cannot be empty".to_string());
        }
        None
    }
}
