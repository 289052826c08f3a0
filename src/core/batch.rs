use crate::core::retry::IntoApiResult;
use crate::domain::model::ApiResult;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::future::Future;

/// 批次中單一請求的結果，保留原始順序
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry<T> {
    pub index: usize,
    pub result: ApiResult<T>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results<'a, T: 'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a ApiResult<T>>,
    {
        results
            .into_iter()
            .fold(BatchSummary::default(), |mut summary, result| {
                summary.total += 1;
                if result.is_success() {
                    summary.succeeded += 1;
                } else {
                    summary.failed += 1;
                }
                summary
            })
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Awaits every request and reports each outcome on its own.
/// A failing request never cancels or hides the others.
pub async fn settle_all<T, I, Fut, R>(requests: I) -> Vec<BatchEntry<T>>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = R>,
    R: IntoApiResult<T>,
{
    let outcomes = join_all(requests).await;
    let entries = into_entries(outcomes);
    log_summary(&entries);
    entries
}

/// Same as [`settle_all`], with at most `limit` requests in flight.
pub async fn settle_all_bounded<T, I, Fut, R>(requests: I, limit: usize) -> Vec<BatchEntry<T>>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = R>,
    R: IntoApiResult<T>,
{
    let outcomes: Vec<R> = stream::iter(requests)
        .buffered(limit.max(1))
        .collect()
        .await;
    let entries = into_entries(outcomes);
    log_summary(&entries);
    entries
}

fn into_entries<T, R: IntoApiResult<T>>(outcomes: Vec<R>) -> Vec<BatchEntry<T>> {
    outcomes
        .into_iter()
        .enumerate()
        .map(|(index, outcome)| BatchEntry {
            index,
            result: outcome.into_api_result(),
        })
        .collect()
}

fn log_summary<T>(entries: &[BatchEntry<T>]) {
    let summary = BatchSummary::from_results(entries.iter().map(|e| &e.result));
    if summary.all_succeeded() {
        tracing::debug!("📦 Batch finished: {} requests succeeded", summary.total);
    } else {
        tracing::warn!(
            "📦 Batch finished: {}/{} requests failed",
            summary.failed,
            summary.total
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ErrorCode;
    use std::time::Duration;

    async fn fake_request(id: usize) -> ApiResult<usize> {
        if id == 3 {
            ApiResult::failure("HTTP error! status: 500", ErrorCode::ServerError)
        } else {
            ApiResult::success(id * 10)
        }
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_results() {
        let entries = settle_all((1..=5).map(fake_request)).await;

        assert_eq!(entries.len(), 5);
        for entry in &entries {
            let id = entry.index + 1;
            if id == 3 {
                assert_eq!(entry.result.code(), Some(ErrorCode::ServerError));
            } else {
                assert_eq!(entry.result, ApiResult::success(id * 10));
            }
        }

        let summary = BatchSummary::from_results(entries.iter().map(|e| &e.result));
        assert_eq!(
            summary,
            BatchSummary {
                total: 5,
                succeeded: 4,
                failed: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_batch_preserves_order() {
        // 越早的請求越慢，確認輸出仍依輸入順序
        let requests = (0..4u64).map(|i| async move {
            tokio::time::sleep(Duration::from_millis(400 - i * 100)).await;
            ApiResult::success(i)
        });

        let entries = settle_all_bounded(requests, 2).await;
        let values: Vec<u64> = entries
            .into_iter()
            .filter_map(|e| e.result.into_data())
            .collect();
        assert_eq!(values, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let entries: Vec<BatchEntry<()>> =
            settle_all(Vec::<std::future::Ready<ApiResult<()>>>::new()).await;
        assert!(entries.is_empty());
    }
}
