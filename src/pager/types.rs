// Pager types

use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// Stored pages for one large response; both lists always have the same length
#[derive(Debug, Clone)]
pub struct PagedResponse {
    pub stdout_pages: Vec<String>,
    pub stderr_pages: Vec<String>,
    pub timestamp: Instant,
}

impl PagedResponse {
    pub fn total_pages(&self) -> usize {
        self.stdout_pages.len()
    }
}

/// Handle returned to the caller after storing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResponse {
    pub response_id: Uuid,
    pub total_pages: usize,
}

/// One page of a stored response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView {
    pub stdout: String,
    pub stderr: String,
    /// Zero-based page index
    pub page: usize,
    pub total_pages: usize,
}
