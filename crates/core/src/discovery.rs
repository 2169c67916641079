//! Paginated resource discovery with bounded retry.
//!
//! Issues one count query, then offset-limited page queries until the
//! original total is covered. Each query retries with exponential backoff
//! before becoming terminal for the whole run.

use std::collections::HashSet;
use std::time::Duration;

use crate::client::{ResourceExplorer, ResourceQuery};
use crate::error::{DiscoveryError, ServiceError};
use crate::model::ResourceRecord;

/// Retry schedule for discovery queries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per query, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each attempt after.
    pub initial_backoff: Duration,
    /// Ceiling on the backoff delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(8000),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds or `max_attempts` is exhausted.
    fn run<T>(
        &self,
        operation: &'static str,
        mut op: impl FnMut() -> Result<T, ServiceError>,
    ) -> Result<T, DiscoveryError> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts => {
                    eprintln!(
                        "[retry] {} failed (attempt {}/{}): {}. Backing off {}ms...",
                        operation,
                        attempt,
                        self.max_attempts,
                        e,
                        backoff.as_millis()
                    );
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(self.max_backoff);
                }
                Err(e) => {
                    return Err(DiscoveryError::RetriesExhausted {
                        operation,
                        attempts: attempt,
                        source: e,
                    })
                }
            }
        }
    }
}

/// Discover every resource matching `query`, one materialized list per call.
///
/// The expected total is fetched once before paging begins and paging
/// continues while `offset < total` against that original total. A dataset
/// shrinking mid-run is an accepted race, not re-counted. Repeated entries
/// are dropped by `id`, first occurrence kept, because the service offers
/// no uniqueness guarantee across pages under concurrent tenant mutation.
pub fn discover<E: ResourceExplorer>(
    explorer: &E,
    query: &ResourceQuery,
    page_size: usize,
    policy: &RetryPolicy,
) -> Result<Vec<ResourceRecord>, DiscoveryError> {
    let page_size = page_size.max(1);
    let total = policy.run("count query", || explorer.count(query))?;

    let mut collected: Vec<ResourceRecord> = Vec::with_capacity(total);
    let mut offset = 0;
    while offset < total {
        // Omit the skip argument entirely on the first page.
        let skip = if offset == 0 { None } else { Some(offset) };
        let page = policy.run("page query", || explorer.page(query, page_size, skip))?;
        collected.extend(page);
        offset += page_size;
    }

    let mut seen = HashSet::with_capacity(collected.len());
    collected.retain(|record| seen.insert(record.id.clone()));
    Ok(collected)
}
