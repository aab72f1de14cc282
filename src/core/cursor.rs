//! Batch cursor
//!
//! Turns one category's result set into a fixed sequence of pages. The total is
//! counted once; page offsets `0, size, 2·size, …` below the total are computed
//! from it and handed out strictly in order. Pages are ordered by intrinsic id so
//! consecutive offsets neither overlap nor leave gaps while the graph is static.

use crate::adapters::source::cypher::Query;
use crate::adapters::source::transform::{edge_record, node_record};
use crate::adapters::source::{RawRow, SourceConnector, SourceResult};
use crate::domain::{Category, PropertyRecord, SourceError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use crate::config::schema::DEFAULT_PAGE_SIZE;

/// Converts one raw row into a record
pub type RowTransform = Arc<dyn Fn(&RawRow) -> SourceResult<PropertyRecord> + Send + Sync>;

/// What to fetch for one category and how to shape it
#[derive(Clone)]
pub struct FetchSpec {
    category: Category,
    count_query: Query,
    page_query: Query,
    transform: RowTransform,
}

impl FetchSpec {
    pub fn new(
        category: Category,
        count_query: Query,
        page_query: Query,
        transform: RowTransform,
    ) -> Self {
        Self {
            category,
            count_query,
            page_query,
            transform,
        }
    }

    /// Standard count/page queries and row transform for a category
    pub fn for_category(category: &Category) -> Self {
        let transform: RowTransform = if category.is_edge() {
            Arc::new(edge_record)
        } else {
            Arc::new(node_record)
        };
        Self::new(
            category.clone(),
            Query::count_for(category),
            Query::page_for(category),
            transform,
        )
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn count_query(&self) -> &Query {
        &self.count_query
    }

    pub fn page_query(&self) -> &Query {
        &self.page_query
    }
}

impl fmt::Debug for FetchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchSpec")
            .field("category", &self.category.name())
            .field("count_query", &self.count_query.text)
            .field("page_query", &self.page_query.text)
            .finish_non_exhaustive()
    }
}

/// One fetched page
#[derive(Debug, Clone)]
pub struct Batch {
    /// Zero-based page number
    pub index: usize,
    pub skip: u64,
    pub records: Vec<PropertyRecord>,
}

/// Offsets `0, page_size, 2·page_size, …` strictly below `total`
///
/// A `page_size` of 0 is treated as 1.
pub fn page_offsets(total: u64, page_size: u64) -> Vec<u64> {
    let step = page_size.max(1);
    (0..total.div_ceil(step)).map(|page| page * step).collect()
}

/// Pagination state for one category
///
/// Counters only move forward. Once exhausted the cursor stays exhausted and
/// [`next_batch`](Self::next_batch) returns `None` without touching the source.
pub struct BatchCursor {
    source: Arc<dyn SourceConnector>,
    spec: FetchSpec,
    page_size: u64,
    page_timeout: Option<Duration>,
    total: Option<u64>,
    page_offsets: Vec<u64>,
    next_page_index: usize,
    pages_completed: usize,
}

impl BatchCursor {
    pub fn new(source: Arc<dyn SourceConnector>, spec: FetchSpec) -> Self {
        Self {
            source,
            spec,
            page_size: DEFAULT_PAGE_SIZE,
            page_timeout: None,
            total: None,
            page_offsets: Vec::new(),
            next_page_index: 0,
            pages_completed: 0,
        }
    }

    /// Page size; 0 is treated as 1
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Per-page deadline; `None` or zero disables it
    pub fn with_page_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.page_timeout = timeout.filter(|d| !d.is_zero());
        self
    }

    pub fn category(&self) -> &Category {
        self.spec.category()
    }

    /// Counts the category once and derives its page offsets
    ///
    /// # Errors
    ///
    /// [`SourceError::CountQueryFailed`]; a failed count is not memoized, but it is
    /// not retried here either.
    pub async fn get_count(&mut self) -> SourceResult<u64> {
        if let Some(total) = self.total {
            return Ok(total);
        }

        let total = self
            .source
            .count(self.spec.count_query())
            .await
            .map_err(|e| SourceError::CountQueryFailed {
                category: self.category().name().to_string(),
                message: e.to_string(),
            })?;

        self.page_offsets = page_offsets(total, self.page_size);
        self.total = Some(total);

        tracing::debug!(
            category = %self.category(),
            total,
            pages = self.page_offsets.len(),
            page_size = self.page_size,
            "Counted category"
        );

        Ok(total)
    }

    /// Whether another page remains; counts first if needed
    pub async fn has_more(&mut self) -> SourceResult<bool> {
        self.get_count().await?;
        Ok(self.next_page_index < self.page_offsets.len())
    }

    /// Fetches the next page, or `None` once exhausted
    ///
    /// # Errors
    ///
    /// [`SourceError::Timeout`] when the page deadline elapses, otherwise
    /// [`SourceError::PageFetchFailed`].
    pub async fn next_batch(&mut self) -> SourceResult<Option<Batch>> {
        if !self.has_more().await? {
            return Ok(None);
        }

        let index = self.next_page_index;
        let skip = self.page_offsets[index];
        self.next_page_index += 1;

        let fetch = self
            .source
            .page(self.spec.page_query(), skip, self.page_size);

        let fetched = match self.page_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch).await.map_err(|_| {
                SourceError::Timeout(format!(
                    "page at skip {skip} of {} exceeded {}ms",
                    self.spec.category().name(),
                    limit.as_millis()
                ))
            })?,
            None => fetch.await,
        };

        let rows = fetched.map_err(|e| self.page_error(skip, e))?;
        self.pages_completed += 1;

        let records = rows
            .iter()
            .map(|row| (self.spec.transform)(row))
            .collect::<SourceResult<Vec<_>>>()
            .map_err(|e| self.page_error(skip, e))?;

        Ok(Some(Batch {
            index,
            skip,
            records,
        }))
    }

    fn page_error(&self, skip: u64, e: SourceError) -> SourceError {
        match e {
            SourceError::Timeout(_) | SourceError::PageFetchFailed { .. } => e,
            other => SourceError::PageFetchFailed {
                category: self.spec.category().name().to_string(),
                skip,
                message: other.to_string(),
            },
        }
    }

    /// Counted total, if known
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.page_offsets.len()
    }

    pub fn page_offsets(&self) -> &[u64] {
        &self.page_offsets
    }

    pub fn next_page_index(&self) -> usize {
        self.next_page_index
    }

    pub fn pages_completed(&self) -> usize {
        self.pages_completed
    }

    /// Counted, and every page handed out
    pub fn is_exhausted(&self) -> bool {
        self.total.is_some() && self.next_page_index >= self.page_offsets.len()
    }
}
