//! Test fixtures and fakes shared by the core crate's unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use courseware_shared::{Block, BlockGroup, BlockId, BlockType, CoursewareError, Result, VideoDownload};

use crate::querier::{CourseQuerier, CourseTree, JsonCourseQuerier};
use crate::services::{
    Analytics, DownloadPreferences, DownloadService, Reachability, Router, ScreenKind,
};

pub(crate) const SAMPLE_COURSE: &str = r#"{
  "course_id": "course-v1:Demo+101",
  "root": "root",
  "blocks": {
    "root": { "type": "course", "display_name": "Demo Course", "children": ["ch1", "ch2"] },
    "ch1": { "type": "chapter", "display_name": "Week 1", "children": ["seq1", "seq2"] },
    "ch2": { "type": "chapter", "display_name": "Week 2", "children": ["seq3"] },
    "seq1": {
      "type": "sequential",
      "display_name": "Intro",
      "internal_name": "intro-sequence",
      "children": ["v1", "p1"]
    },
    "seq2": { "type": "sequential", "display_name": "Practice", "children": ["p2"] },
    "seq3": { "type": "sequential", "display_name": "Wrap up" },
    "v1": {
      "type": "video",
      "display_name": "Welcome video",
      "web_url": "https://courses.example.com/unit/v1",
      "video_url": "https://cdn.example.com/v1.mp4"
    },
    "p1": { "type": "problem", "display_name": "Check" },
    "p2": { "type": "problem", "display_name": "Exercise" }
  }
}"#;

pub(crate) const EMPTY_COURSE: &str = r#"{
  "course_id": "course-v1:Empty+0",
  "root": "root",
  "blocks": { "root": { "type": "course", "display_name": "Nothing yet" } }
}"#;

const ROOT_KEY: &str = "<root>";

/// Yield to spawned tasks until `busy` reports false.
pub(crate) async fn settle(busy: impl Fn() -> bool) {
    for _ in 0..1_000 {
        if !busy() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("pipeline did not settle");
}

pub(crate) fn block(id: &str, block_type: BlockType) -> Block {
    Block {
        id: id.into(),
        block_type,
        display_name: id.to_uppercase(),
        internal_name: None,
        web_url: None,
        video_url: None,
        children: vec![],
    }
}

// ---------------------------------------------------------------------------
// FakeQuerier
// ---------------------------------------------------------------------------

/// Tree-backed querier whose fetches can be gated or made to fail.
pub(crate) struct FakeQuerier {
    inner: JsonCourseQuerier,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    failing_children: Mutex<HashSet<String>>,
    fail_parent: AtomicBool,
    pub refresh_requests: AtomicUsize,
    resolved_tx: mpsc::UnboundedSender<String>,
    resolved_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
}

impl FakeQuerier {
    pub(crate) fn from_json(json: &str) -> Self {
        let tree = CourseTree::from_json(json).expect("valid test course");
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();
        Self {
            inner: JsonCourseQuerier::from_tree(tree),
            gates: Mutex::new(HashMap::new()),
            failing_children: Mutex::new(HashSet::new()),
            fail_parent: AtomicBool::new(false),
            refresh_requests: AtomicUsize::new(0),
            resolved_tx,
            resolved_rx: tokio::sync::Mutex::new(resolved_rx),
        }
    }

    pub(crate) fn sample() -> Self {
        Self::from_json(SAMPLE_COURSE)
    }

    /// Hold the next `children_of(key)` until the returned sender fires.
    /// `"<root>"` gates `children_of(None)`.
    pub(crate) fn gate(&self, key: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().insert(key.to_string(), rx);
        tx
    }

    pub(crate) fn fail_children_of(&self, key: &str) {
        self.failing_children.lock().insert(key.to_string());
    }

    pub(crate) fn heal_children_of(&self, key: &str) {
        self.failing_children.lock().remove(key);
    }

    pub(crate) fn fail_parent_lookups(&self) {
        self.fail_parent.store(true, Ordering::SeqCst);
    }

    /// Wait until a `children_of(key)` call has returned.
    pub(crate) async fn wait_resolved(&self, key: &str) {
        let mut rx = self.resolved_rx.lock().await;
        while let Some(resolved) = rx.recv().await {
            if resolved == key {
                return;
            }
        }
    }
}

#[async_trait]
impl CourseQuerier for FakeQuerier {
    fn course_id(&self) -> &str {
        self.inner.course_id()
    }

    async fn root_id(&self) -> Result<BlockId> {
        self.inner.root_id().await
    }

    async fn children_of(&self, id: Option<&BlockId>) -> Result<BlockGroup> {
        let key = id.map_or(ROOT_KEY.to_string(), BlockId::to_string);
        let gate = self.gates.lock().remove(&key);
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let result = if self.failing_children.lock().contains(&key) {
            Err(CoursewareError::content_load(format!("children of {key} unavailable")))
        } else {
            self.inner.children_of(id).await
        };
        let _ = self.resolved_tx.send(key);
        result
    }

    async fn parent_of(&self, id: &BlockId) -> Result<BlockId> {
        if self.fail_parent.load(Ordering::SeqCst) {
            return Err(CoursewareError::Network("offline".into()));
        }
        self.inner.parent_of(id).await
    }

    async fn block(&self, id: &BlockId) -> Result<Block> {
        self.inner.block(id).await
    }

    fn set_needs_refresh(&self, needs_refresh: bool) {
        if needs_refresh {
            self.refresh_requests.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.set_needs_refresh(needs_refresh);
    }
}

// ---------------------------------------------------------------------------
// Recording collaborators
// ---------------------------------------------------------------------------

/// Records every analytics, router and download call as a string.
#[derive(Default)]
pub(crate) struct Recorder {
    pub events: Mutex<Vec<String>>,
    pub videos: Mutex<Vec<VideoDownload>>,
}

impl Recorder {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().push(event);
    }
}

impl Analytics for Recorder {
    fn track_screen(&self, name: &str, course_id: &str, value: Option<&str>) {
        self.push(format!("screen:{name}:{course_id}:{}", value.unwrap_or("-")));
    }

    fn track_bulk_video_download(
        &self,
        section_id: &BlockId,
        subsection_id: &BlockId,
        _course_id: &str,
        video_count: usize,
    ) {
        self.push(format!("bulk:{section_id}:{subsection_id}:{video_count}"));
    }

    fn track_single_video_download(&self, block_id: &BlockId, _course_id: &str, unit_url: Option<&str>) {
        self.push(format!("single:{block_id}:{}", unit_url.unwrap_or("-")));
    }
}

impl Router for Recorder {
    fn navigate_to_container(
        &self,
        block_id: &BlockId,
        block_type: BlockType,
        parent_id: &BlockId,
        course_id: &str,
        from: ScreenKind,
    ) {
        self.push(format!("nav:{block_id}:{block_type}:{parent_id}:{course_id}:{from:?}"));
    }

    fn navigate_to_downloads(&self, from: ScreenKind) {
        self.push(format!("nav:downloads:{from:?}"));
    }
}

impl DownloadService for Recorder {
    fn enqueue_videos(&self, videos: &[VideoDownload]) {
        self.videos.lock().extend_from_slice(videos);
    }

    fn enqueue_ids(&self, ids: &[BlockId], _course_id: &str) {
        self.videos.lock().extend(ids.iter().map(|id| VideoDownload {
            block_id: id.clone(),
            video_url: None,
        }));
    }
}

/// Fixed answers for the download gate.
pub(crate) struct StaticNetwork {
    pub on_wifi: Option<bool>,
    pub only_on_wifi: Option<bool>,
}

impl Reachability for StaticNetwork {
    fn is_on_wifi(&self) -> Option<bool> {
        self.on_wifi
    }
}

impl DownloadPreferences for StaticNetwork {
    fn only_on_wifi(&self) -> Option<bool> {
        self.only_on_wifi
    }
}
