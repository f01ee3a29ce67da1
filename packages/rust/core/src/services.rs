//! Collaborators the outline screen talks to.
//!
//! Each capability is a narrow trait; screens receive them bundled in an
//! [`OutlineEnvironment`]. Simple implementations for headless front-ends
//! live here too.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use courseware_shared::{BlockId, BlockType, DownloadsConfig, VideoDownload};

use crate::last_accessed::LastAccessedStore;
use crate::querier::CourseQuerier;

/// Screen name reported when the course root outline is shown.
pub const SCREEN_COURSE_OUTLINE: &str = "Course Outline";

/// Screen name reported when a section outline is shown.
pub const SCREEN_SECTION_OUTLINE: &str = "Section Outline";

/// Screen a navigation request originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    Outline,
    Downloads,
    FindCourses,
}

/// Screen-level navigation.
pub trait Router: Send + Sync {
    /// Show the container view for a block.
    fn navigate_to_container(
        &self,
        block_id: &BlockId,
        block_type: BlockType,
        parent_id: &BlockId,
        course_id: &str,
        from: ScreenKind,
    );

    /// Show the download queue.
    fn navigate_to_downloads(&self, from: ScreenKind);
}

/// Analytics sink.
pub trait Analytics: Send + Sync {
    fn track_screen(&self, name: &str, course_id: &str, value: Option<&str>);

    fn track_bulk_video_download(
        &self,
        section_id: &BlockId,
        subsection_id: &BlockId,
        course_id: &str,
        video_count: usize,
    );

    fn track_single_video_download(&self, block_id: &BlockId, course_id: &str, unit_url: Option<&str>);
}

/// Video download queue.
pub trait DownloadService: Send + Sync {
    fn enqueue_videos(&self, videos: &[VideoDownload]);
    fn enqueue_ids(&self, ids: &[BlockId], course_id: &str);
}

/// Network reachability. `None` when unknown.
pub trait Reachability: Send + Sync {
    fn is_on_wifi(&self) -> Option<bool>;
}

/// User download preferences. `None` when unset.
pub trait DownloadPreferences: Send + Sync {
    fn only_on_wifi(&self) -> Option<bool>;
}

impl DownloadPreferences for DownloadsConfig {
    fn only_on_wifi(&self) -> Option<bool> {
        Some(self.only_on_wifi)
    }
}

impl Reachability for DownloadsConfig {
    fn is_on_wifi(&self) -> Option<bool> {
        self.on_wifi
    }
}

/// Everything an outline screen needs from the rest of the app.
#[derive(Clone)]
pub struct OutlineEnvironment {
    pub querier: Arc<dyn CourseQuerier>,
    pub analytics: Arc<dyn Analytics>,
    pub router: Arc<dyn Router>,
    pub downloads: Arc<dyn DownloadService>,
    pub reachability: Arc<dyn Reachability>,
    pub preferences: Arc<dyn DownloadPreferences>,
    pub last_accessed: Arc<dyn LastAccessedStore>,
}

// ---------------------------------------------------------------------------
// Headless implementations
// ---------------------------------------------------------------------------

/// Reports analytics events as structured log records.
#[derive(Debug, Default)]
pub struct TracingAnalytics;

impl Analytics for TracingAnalytics {
    fn track_screen(&self, name: &str, course_id: &str, value: Option<&str>) {
        info!(target: "analytics", screen = name, course_id, value, "screen viewed");
    }

    fn track_bulk_video_download(
        &self,
        section_id: &BlockId,
        subsection_id: &BlockId,
        course_id: &str,
        video_count: usize,
    ) {
        info!(
            target: "analytics",
            %section_id,
            %subsection_id,
            course_id,
            video_count,
            "subsection videos downloaded"
        );
    }

    fn track_single_video_download(&self, block_id: &BlockId, course_id: &str, unit_url: Option<&str>) {
        info!(target: "analytics", %block_id, course_id, unit_url, "single video downloaded");
    }
}

/// A download queue that only records what was asked for.
#[derive(Debug, Default)]
pub struct QueuedDownloads {
    queued: Mutex<Vec<VideoDownload>>,
}

impl QueuedDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every queued download, oldest first.
    pub fn queued(&self) -> Vec<VideoDownload> {
        self.queued.lock().clone()
    }
}

impl DownloadService for QueuedDownloads {
    fn enqueue_videos(&self, videos: &[VideoDownload]) {
        let mut queued = self.queued.lock();
        for video in videos {
            if !queued.iter().any(|q| q.block_id == video.block_id) {
                queued.push(video.clone());
            }
        }
        info!(count = videos.len(), total = queued.len(), "videos queued for download");
    }

    fn enqueue_ids(&self, ids: &[BlockId], course_id: &str) {
        let videos: Vec<VideoDownload> = ids
            .iter()
            .map(|id| VideoDownload {
                block_id: id.clone(),
                video_url: None,
            })
            .collect();
        info!(course_id, "queueing videos by id");
        self.enqueue_videos(&videos);
    }
}
