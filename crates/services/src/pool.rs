//! Bounded worker pool for bulk operations.
//!
//! Runs one future per indexed input with at most `concurrency` in flight,
//! and reassembles results in input order regardless of completion order.
//! Workers report per-item outcomes (success or error) as values, so the
//! pool itself never fails.

use std::future::Future;

use futures::StreamExt;

/// Execute `f` over every item with bounded concurrency; results come back
/// in the index order of the inputs.
pub async fn run_indexed<T, R, F, Fut>(items: Vec<T>, concurrency: usize, f: F) -> Vec<R>
where
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = R>,
{
    let concurrency = concurrency.max(1);
    let mut results: Vec<(usize, R)> =
        futures::stream::iter(items.into_iter().enumerate().map(|(index, item)| {
            let fut = f(index, item);
            async move { (index, fut.await) }
        }))
        .buffer_unordered(concurrency)
        .collect()
        .await;
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, r)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn results_come_back_in_input_order() {
        // Later items finish first; order must still follow the input.
        let out = run_indexed(vec![30u64, 20, 10], 3, |i, delay| async move {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            i
        })
        .await;
        assert_eq!(out, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items: Vec<u32> = (0..12).collect();
        run_indexed(items, 2, |_, _| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn zero_concurrency_is_clamped() {
        let out = run_indexed(vec![1, 2, 3], 0, |_, v| async move { v * 2 }).await;
        assert_eq!(out, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let out: Vec<u32> = run_indexed(Vec::<u32>::new(), 4, |_, v| async move { v }).await;
        assert!(out.is_empty());
    }
}
