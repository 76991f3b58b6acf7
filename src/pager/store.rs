// Line-packing paginator and the in-memory page store

use super::error::{PagerError, Result};
use super::types::{PageView, PagedResponse, StoredResponse};
use crate::config::PagerSection;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

type Store = Arc<RwLock<HashMap<Uuid, PagedResponse>>>;

/// Pack whole lines into pages of at most `max_bytes` encoded bytes.
///
/// A single line longer than `max_bytes` gets a page of its own. Joining the
/// pages with `\n` gives back `text`.
pub fn paginate(text: &str, max_bytes: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }

    let mut pages = Vec::new();
    let mut current = String::new();
    let mut has_line = false;

    for line in text.split('\n') {
        let grown = if has_line {
            current.len() + 1 + line.len()
        } else {
            line.len()
        };

        if has_line && grown > max_bytes {
            pages.push(std::mem::take(&mut current));
            current.push_str(line);
        } else {
            if has_line {
                current.push('\n');
            }
            current.push_str(line);
        }
        has_line = true;
    }

    pages.push(current);
    pages
}

fn sweep_store(store: &Store, threshold: Duration, now: Instant) -> usize {
    let mut map = store.write().unwrap_or_else(|e| e.into_inner());
    let before = map.len();
    map.retain(|_id, entry| now.saturating_duration_since(entry.timestamp) < threshold);
    before - map.len()
}

/// Pages large outputs and serves them back by id
pub struct OutputPager {
    store: Store,
    page_max_bytes: usize,
    cleanup_threshold: Duration,
}

impl OutputPager {
    pub fn new(page_max_bytes: usize, cleanup_threshold: Duration) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            page_max_bytes,
            cleanup_threshold,
        }
    }

    pub fn from_config(pager: &PagerSection) -> Self {
        Self::new(
            pager.page_max_bytes,
            Duration::from_secs(pager.cleanup_threshold_secs),
        )
    }

    pub fn page_max_bytes(&self) -> usize {
        self.page_max_bytes
    }

    /// Whether `text` would need more than one page
    pub fn exceeds_page(&self, text: &str) -> bool {
        text.len() > self.page_max_bytes
    }

    pub fn len(&self) -> usize {
        self.store.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Paginate both streams, pad to equal length and store under a fresh id
    pub fn store_response(&self, stdout: &str, stderr: &str) -> StoredResponse {
        let mut stdout_pages = paginate(stdout, self.page_max_bytes);
        let mut stderr_pages = paginate(stderr, self.page_max_bytes);
        let total_pages = stdout_pages.len().max(stderr_pages.len());
        stdout_pages.resize(total_pages, String::new());
        stderr_pages.resize(total_pages, String::new());

        let response_id = Uuid::new_v4();
        self.store
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                response_id,
                PagedResponse {
                    stdout_pages,
                    stderr_pages,
                    timestamp: Instant::now(),
                },
            );

        debug!(response_id = %response_id, total_pages, "response paged");
        StoredResponse {
            response_id,
            total_pages,
        }
    }

    /// Zero-based page lookup
    pub fn get_paginated_response(&self, id: &Uuid, page: usize) -> Result<PageView> {
        let map = self.store.read().unwrap_or_else(|e| e.into_inner());
        let entry = map
            .get(id)
            .ok_or_else(|| PagerError::NotFound(id.to_string()))?;

        let total_pages = entry.total_pages();
        if page >= total_pages {
            return Err(PagerError::OutOfBounds { page, total_pages });
        }

        Ok(PageView {
            stdout: entry.stdout_pages[page].clone(),
            stderr: entry.stderr_pages[page].clone(),
            page,
            total_pages,
        })
    }

    /// Lookup by the textual id a client sent back; malformed ids are not found
    pub fn get_by_str(&self, id: &str, page: usize) -> Result<PageView> {
        let uuid = Uuid::parse_str(id.trim()).map_err(|_| PagerError::NotFound(id.to_string()))?;
        self.get_paginated_response(&uuid, page)
    }

    /// Evict entries older than the cleanup threshold
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let removed = sweep_store(&self.store, self.cleanup_threshold, now);
        if removed > 0 {
            info!(removed, remaining = self.len(), "paged responses evicted");
        }
        removed
    }

    /// Fixed-interval sweep on the current runtime; stops once the pager is dropped
    pub fn spawn_cleanup(&self) -> JoinHandle<()> {
        let store: Weak<RwLock<HashMap<Uuid, PagedResponse>>> = Arc::downgrade(&self.store);
        let threshold = self.cleanup_threshold;
        let period = threshold.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    debug!("pager dropped, cleanup task exiting");
                    break;
                };
                let removed = sweep_store(&store, threshold, Instant::now());
                debug!(removed, "pager sweep");
            }
        })
    }
}
