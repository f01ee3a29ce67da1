//! Outline loading pipeline: block id → header group → row groups.
//!
//! Three chained [`BackedStage`]s. Every new value in the block-id stage
//! re-derives the headers (children of that block), and every new header
//! group re-derives the rows (children of each header, fetched concurrently
//! and joined in header order). Results from superseded generations never
//! reach the later stages.

use std::sync::{Arc, Weak};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use courseware_shared::{BlockGroup, BlockId, CoursewareError, SharedError};
use courseware_stream::{BackedStage, Listener, StageResult, Subscription, join_ordered};

use crate::querier::CourseQuerier;

/// Keeps the querier reachable for as long as the pipeline lives.
struct PipelineOwner {
    querier: Arc<dyn CourseQuerier>,
}

fn owner_gone() -> SharedError {
    Arc::new(CoursewareError::content_load(
        "outline pipeline was torn down before the load finished",
    ))
}

/// The staged content loader behind an outline screen.
pub struct OutlinePipeline {
    owner: Arc<PipelineOwner>,
    block_id: BackedStage<Option<BlockId>>,
    headers: BackedStage<BlockGroup>,
    rows: BackedStage<Vec<BlockGroup>>,
    _links: [Subscription; 2],
}

impl OutlinePipeline {
    pub fn new(querier: Arc<dyn CourseQuerier>) -> Self {
        let owner = Arc::new(PipelineOwner { querier });
        let block_id = BackedStage::new("block_id");
        let headers = BackedStage::new("headers");
        let rows = BackedStage::new("rows");

        let headers_owner = Arc::downgrade(&owner);
        let headers_link = headers.follow(&block_id, move |id: Option<BlockId>, _: CancellationToken| {
            load_headers(headers_owner.clone(), id)
        });

        let rows_owner = Arc::downgrade(&owner);
        let rows_link = rows.follow(&headers, move |headers: BlockGroup, token: CancellationToken| {
            load_rows(rows_owner.clone(), headers, token)
        });

        Self {
            owner,
            block_id,
            headers,
            rows,
            _links: [headers_link, rows_link],
        }
    }

    pub fn querier(&self) -> &Arc<dyn CourseQuerier> {
        &self.owner.querier
    }

    /// Current root of the outline; `None` means the top of the course.
    pub fn current_block_id(&self) -> Option<BlockId> {
        self.block_id.value().flatten()
    }

    /// Re-root the outline at `id` and reload everything below it.
    pub fn bind(&self, id: Option<BlockId>) {
        debug!(block_id = ?id, "binding outline root");
        self.block_id.back_with_value(id);
    }

    /// Re-root the outline at the parent of `id`, once that lookup resolves.
    pub fn bind_parent_of(&self, id: BlockId) {
        let owner = Arc::downgrade(&self.owner);
        self.block_id.back_with(move |_| async move {
            let owner = owner.upgrade().ok_or_else(owner_gone)?;
            owner
                .querier
                .parent_of(&id)
                .await
                .map(Some)
                .map_err(Arc::new)
        });
    }

    pub fn headers(&self) -> &BackedStage<BlockGroup> {
        &self.headers
    }

    pub fn rows(&self) -> &BackedStage<Vec<BlockGroup>> {
        &self.rows
    }

    /// Whether any stage is still waiting on its source.
    pub fn is_loading(&self) -> bool {
        self.block_id.is_active() || self.headers.is_active() || self.rows.is_active()
    }

    /// Resolve once no stage is waiting on its source.
    pub async fn idle(&self) {
        let notify = Arc::new(Notify::new());
        let signal = Arc::clone(&notify);
        let _sub = self
            .rows
            .listen(Listener::new().on_finally(move || signal.notify_one()));
        while self.is_loading() {
            notify.notified().await;
        }
    }

    /// Drop all in-flight work and listeners.
    pub fn shutdown(&self) {
        self.block_id.shutdown();
        self.headers.shutdown();
        self.rows.shutdown();
    }
}

async fn load_headers(owner: Weak<PipelineOwner>, id: Option<BlockId>) -> StageResult<BlockGroup> {
    let owner = owner.upgrade().ok_or_else(owner_gone)?;
    owner.querier.children_of(id.as_ref()).await.map_err(Arc::new)
}

async fn load_rows(
    owner: Weak<PipelineOwner>,
    headers: BlockGroup,
    token: CancellationToken,
) -> StageResult<Vec<BlockGroup>> {
    let owner = owner.upgrade().ok_or_else(owner_gone)?;
    if token.is_cancelled() {
        debug!(block_id = %headers.block.id, "header group superseded before rows were requested");
        return Err(Arc::new(CoursewareError::content_load("superseded")));
    }

    let fetches = headers.children.into_iter().map(|header| {
        let querier = Arc::clone(&owner.querier);
        async move { querier.children_of(Some(&header.id)).await.map_err(Arc::new) }
    });
    join_ordered(fetches).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeQuerier, settle};

    fn group_ids(groups: &[BlockGroup]) -> Vec<&str> {
        groups.iter().map(|g| g.block.id.as_str()).collect()
    }

    #[tokio::test]
    async fn root_binding_loads_headers_and_rows() {
        let querier = Arc::new(FakeQuerier::sample());
        let pipeline = OutlinePipeline::new(querier.clone());

        pipeline.bind(None);
        settle(|| pipeline.is_loading()).await;

        let headers = pipeline.headers().value().expect("headers");
        assert_eq!(headers.block.id.as_str(), "root");
        let rows = pipeline.rows().value().expect("rows");
        assert_eq!(group_ids(&rows), vec!["ch1", "ch2"]);
        assert_eq!(rows[0].children.len(), 2);
        assert_eq!(pipeline.current_block_id(), None);
    }

    #[tokio::test]
    async fn later_binding_wins_over_slower_earlier_one() {
        let querier = Arc::new(FakeQuerier::sample());
        let ch1_gate = querier.gate("ch1");
        let pipeline = OutlinePipeline::new(querier.clone());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _sub = pipeline.rows().listen(Listener::new().on_success(move |rows: &Vec<BlockGroup>| {
            let _ = tx.send(rows.iter().map(|g| g.block.id.to_string()).collect::<Vec<_>>());
        }));

        pipeline.bind(Some("ch1".into()));
        pipeline.bind(Some("ch2".into()));
        assert_eq!(rx.recv().await, Some(vec!["seq3".to_string()]));

        // Let the superseded ch1 header fetch resolve; it must be discarded.
        ch1_gate.send(()).expect("release ch1");
        querier.wait_resolved("ch1").await;
        settle(|| pipeline.is_loading()).await;

        assert_eq!(pipeline.headers().value().expect("headers").block.id.as_str(), "ch2");
        assert_eq!(group_ids(&pipeline.rows().value().expect("rows")), vec!["seq3"]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn rows_from_a_superseded_root_are_discarded() {
        let querier = Arc::new(FakeQuerier::sample());
        let seq1_gate = querier.gate("seq1");
        let pipeline = OutlinePipeline::new(querier.clone());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _sub = pipeline.rows().listen(Listener::new().on_success(move |rows: &Vec<BlockGroup>| {
            let _ = tx.send(rows.iter().map(|g| g.block.id.to_string()).collect::<Vec<_>>());
        }));

        pipeline.bind(Some("ch1".into()));
        // seq2 resolving means the ch1 row fetch is under way, held on seq1.
        querier.wait_resolved("seq2").await;

        let ch2_gate = querier.gate("ch2");
        pipeline.bind(Some("ch2".into()));
        assert!(pipeline.rows().is_active());

        seq1_gate.send(()).expect("release seq1");
        querier.wait_resolved("seq1").await;
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert!(rx.try_recv().is_err());
        assert!(pipeline.rows().value().is_none());
        assert!(pipeline.rows().is_active());

        ch2_gate.send(()).expect("release ch2");
        assert_eq!(rx.recv().await, Some(vec!["seq3".to_string()]));
        assert_eq!(pipeline.current_block_id(), Some("ch2".into()));
        assert_eq!(group_ids(&pipeline.rows().value().expect("rows")), vec!["seq3"]);
    }

    #[tokio::test]
    async fn idle_waits_for_the_rows_of_the_latest_binding() {
        let querier = Arc::new(FakeQuerier::sample());
        let gate = querier.gate("ch2");
        let pipeline = OutlinePipeline::new(querier.clone());
        pipeline.idle().await;

        pipeline.bind(None);
        let release = tokio::spawn(async move {
            tokio::task::yield_now().await;
            gate.send(()).expect("release ch2");
        });
        pipeline.idle().await;
        release.await.expect("release task");

        assert!(!pipeline.is_loading());
        assert_eq!(group_ids(&pipeline.rows().value().expect("rows")), vec!["ch1", "ch2"]);
    }

    #[tokio::test]
    async fn one_failed_row_fetch_fails_the_rows() {
        let querier = Arc::new(FakeQuerier::sample());
        querier.fail_children_of("ch2");
        let pipeline = OutlinePipeline::new(querier.clone());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _sub = pipeline.rows().listen(Listener::new().on_failure(move |e| {
            let _ = tx.send(e.to_string());
        }));

        pipeline.bind(None);
        let message = rx.recv().await.expect("rows failure");
        assert!(message.contains("ch2"));
        assert!(pipeline.rows().value().is_none());
    }

    #[tokio::test]
    async fn binding_parent_reroots_the_outline() {
        let querier = Arc::new(FakeQuerier::sample());
        let pipeline = OutlinePipeline::new(querier.clone());

        pipeline.bind_parent_of("seq3".into());
        settle(|| pipeline.is_loading()).await;

        assert_eq!(pipeline.current_block_id(), Some("ch2".into()));
        assert_eq!(pipeline.headers().value().expect("headers").block.display_name, "Week 2");
    }

    #[tokio::test]
    async fn parent_lookup_failure_fails_every_stage() {
        let querier = Arc::new(FakeQuerier::sample());
        let pipeline = OutlinePipeline::new(querier.clone());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let header_tx = tx.clone();
        let _headers = pipeline.headers().listen(Listener::new().on_failure(move |_| {
            let _ = header_tx.send("headers");
        }));
        let _rows = pipeline.rows().listen(Listener::new().on_failure(move |_| {
            let _ = tx.send("rows");
        }));

        pipeline.bind_parent_of("root".into());
        let mut failed = vec![
            rx.recv().await.expect("first failure"),
            rx.recv().await.expect("second failure"),
        ];
        failed.sort_unstable();
        assert_eq!(failed, vec!["headers", "rows"]);
        assert_eq!(pipeline.current_block_id(), None);
    }

    #[tokio::test]
    async fn dropped_pipeline_fails_pending_loads_as_content_errors() {
        let querier = Arc::new(FakeQuerier::sample());
        let pipeline = OutlinePipeline::new(querier.clone());
        let owner = Arc::downgrade(&pipeline.owner);
        drop(pipeline);

        let err = load_headers(owner, None).await.unwrap_err();
        assert!(matches!(*err, CoursewareError::ContentLoad { .. }));
    }
}
