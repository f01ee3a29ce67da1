//! Ordered, fail-fast joins over concurrently running fetches.

use std::future::Future;
use std::sync::Arc;

use futures::future::try_join_all;
use tokio::task::JoinHandle;

use courseware_shared::CoursewareError;

use crate::stage::StageResult;

/// Run every fetch concurrently and collect the results in input order.
///
/// The join fails with the first error to arrive. Fetches still running at
/// that point are detached, not aborted: they finish in the background and
/// their results are dropped.
pub async fn join_ordered<T, Fut, I>(fetches: I) -> StageResult<Vec<T>>
where
    T: Send + 'static,
    Fut: Future<Output = StageResult<T>> + Send + 'static,
    I: IntoIterator<Item = Fut>,
{
    let handles: Vec<JoinHandle<StageResult<T>>> = fetches.into_iter().map(tokio::spawn).collect();

    try_join_all(handles.into_iter().map(|handle| async move {
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(Arc::new(CoursewareError::content_load(format!(
                "fetch task did not complete: {e}"
            )))),
        }
    }))
    .await
}
