// Error types for Pager module

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PagerError {
    #[error("Response {0} not found")]
    NotFound(String),

    #[error("Page {page} out of bounds (total pages: {total_pages})")]
    OutOfBounds { page: usize, total_pages: usize },
}

pub type Result<T> = std::result::Result<T, PagerError>;
