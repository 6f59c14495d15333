//! Bounded record-level parallelism
//!
//! CPU-bound per-record work runs on a dedicated rayon pool sized by the
//! configured `workers`, moved off the tokio runtime with `spawn_blocking`.
//! Output order always matches input order.

use crate::error::PipelineError;
use rayon::prelude::*;

/// Apply `f` to every item on a `workers`-thread rayon pool, preserving order
pub async fn map_ordered<T, U, F>(items: Vec<T>, workers: usize, f: F) -> Result<Vec<U>, PipelineError>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|idx| format!("hanja-worker-{}", idx))
        .build()
        .map_err(|e| PipelineError::Worker(format!("Failed to build worker pool: {}", e)))?;

    let count = items.len();
    tracing::debug!(records = count, workers, "Starting parallel record processing");

    let results = tokio::task::spawn_blocking(move || {
        pool.install(|| items.into_par_iter().map(f).collect::<Vec<U>>())
    })
    .await
    .map_err(|e| PipelineError::Worker(format!("Worker task failed: {}", e)))?;

    tracing::debug!(records = results.len(), "Parallel record processing completed");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_order_preserved() {
        let input: Vec<u32> = (0..500).collect();
        let output = map_ordered(input.clone(), 4, |n| n * 2).await.unwrap();
        let expected: Vec<u32> = input.iter().map(|n| n * 2).collect();
        assert_eq!(output, expected);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let output: Vec<u32> = map_ordered(Vec::<u32>::new(), 2, |n| n).await.unwrap();
        assert!(output.is_empty());
    }
}
