//! services/api/src/web/listing.rs
//!
//! The fetch-until-limit accumulation loop shared by draft and session
//! listing. Index batches arrive newest-first; any caller-side filter is
//! applied per batch (which is why a single query is not enough), and the
//! loop keeps issuing index queries until the requested count is reached or
//! the index is exhausted.

use std::future::Future;

use grant_assistant_core::domain::{Page, PageKey};
use grant_assistant_core::ports::PortResult;

/// Accumulates up to `limit` filtered items by repeatedly fetching
/// index-ordered batches. `fetch` receives the resume key and the batch
/// size still needed; it must return `last_key: None` once the index is
/// exhausted.
pub async fn fetch_until_limit<T, P, F, Fut>(
    limit: usize,
    filter: P,
    mut fetch: F,
) -> PortResult<Vec<T>>
where
    P: Fn(&T) -> bool,
    F: FnMut(Option<PageKey>, i64) -> Fut,
    Fut: Future<Output = PortResult<Page<T>>>,
{
    let mut items: Vec<T> = Vec::new();
    let mut after: Option<PageKey> = None;

    while items.len() < limit {
        let batch_size = (limit - items.len()) as i64;
        let page = fetch(after.take(), batch_size).await?;
        items.extend(page.items.into_iter().filter(|item| filter(item)));
        match page.last_key {
            Some(key) => after = Some(key),
            None => break,
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn key(n: i64) -> PageKey {
        PageKey {
            timestamp: Utc.timestamp_opt(1_700_000_000 - n, 0).unwrap(),
            session_id: format!("s{}", n),
        }
    }

    /// A fake index over `total` descending items, serving batches of at
    /// most `batch_size` and recording how many queries were issued.
    async fn run(total: i64, limit: usize, filter_mod: i64) -> (Vec<i64>, usize) {
        let mut calls = 0usize;
        let items = fetch_until_limit(
            limit,
            |n: &i64| filter_mod == 0 || n % filter_mod == 0,
            |after, batch_size| {
                calls += 1;
                let start = after.map(|k| k.timestamp).map_or(0, |ts| {
                    1_700_000_000 - ts.timestamp() + 1
                });
                let end = (start + batch_size).min(total);
                let items: Vec<i64> = (start..end).collect();
                let last_key = if end < total { items.last().map(|n| key(*n)) } else { None };
                async move { Ok(Page { items, last_key }) }
            },
        )
        .await
        .unwrap();
        (items, calls)
    }

    #[tokio::test]
    async fn stops_at_limit_without_extra_queries() {
        let (items, calls) = run(100, 15, 0).await;
        assert_eq!(items, (0..15).collect::<Vec<_>>());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn stops_when_index_is_exhausted() {
        let (items, calls) = run(7, 15, 0).await;
        assert_eq!(items.len(), 7);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn filtered_batches_keep_the_loop_going() {
        // Only every fifth item passes the filter, so one batch cannot
        // satisfy the limit and the loop must continue from the last key.
        let (items, calls) = run(100, 10, 5).await;
        assert_eq!(items.len(), 10);
        assert!(items.iter().all(|n| n % 5 == 0));
        assert!(calls > 1);
    }

    #[tokio::test]
    async fn never_returns_more_than_the_limit() {
        let (items, _) = run(100, 1, 0).await;
        assert_eq!(items.len(), 1);
    }
}
