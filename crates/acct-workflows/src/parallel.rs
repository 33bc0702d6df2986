//! `map(fn, items) -> list` with a sequential default and an optional
//! concurrent implementation (Design Note 9's reimplementation of the
//! source's optional Ray executor). Batch granularity is the chunk (~100
//! items) for anomaly scans and per-item for voucher classification, per
//! SPEC_FULL §9.

use futures_util::future::join_all;
use std::future::Future;

pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Sequential default: no concurrency, deterministic ordering.
pub async fn map_sequential<T, R, F, Fut>(items: Vec<T>, f: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(f(item).await);
    }
    out
}

/// Concurrent implementation: all items run as tasks on the current
/// executor, joined together. Order of results matches input order.
pub async fn map_concurrent<T, R, F, Fut>(items: Vec<T>, f: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    join_all(items.into_iter().map(f)).await
}

/// Splits `items` into chunks of `DEFAULT_CHUNK_SIZE`, preserving order.
pub fn chunk<T: Clone>(items: Vec<T>) -> Vec<Vec<T>> {
    items.chunks(DEFAULT_CHUNK_SIZE).map(|c| c.to_vec()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn map_sequential_preserves_order() {
        let out = map_sequential(vec![1, 2, 3], |x| async move { x * 2 }).await;
        assert_eq!(out, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn map_concurrent_preserves_order() {
        let out = map_concurrent(vec![1, 2, 3], |x| async move { x * 2 }).await;
        assert_eq!(out, vec![2, 4, 6]);
    }

    #[test]
    fn chunk_splits_at_default_size() {
        let items: Vec<i32> = (0..250).collect();
        let chunks = chunk(items);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[2].len(), 50);
    }
}
