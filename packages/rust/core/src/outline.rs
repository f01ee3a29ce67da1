//! Course outline screen controller.
//!
//! Owns an [`OutlinePipeline`], folds its results into an [`OutlineView`]
//! snapshot for the front-end to draw, and turns user actions (row taps,
//! download buttons, pull-to-refresh, navigation in a sibling content view)
//! into pipeline re-binds, router calls, downloads and analytics.
//!
//! Load state rules: the view starts `Initial`, shows `Loading` while work is
//! in flight, then settles on `Loaded`, `Empty` or `Failed`. A failure is only
//! shown while the view is still `Initial`, so a refresh that fails after
//! content is on screen leaves the content in place.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error, info, instrument};

use courseware_shared::{
    Block, BlockGroup, BlockId, CourseLastAccessed, EmptyIcon, LoadState, SharedError,
    VideoDownload,
};
use courseware_stream::{Listener, Subscription};

use crate::last_accessed::LastAccessedTracker;
use crate::pipeline::OutlinePipeline;
use crate::services::{
    OutlineEnvironment, SCREEN_COURSE_OUTLINE, SCREEN_SECTION_OUTLINE, ScreenKind,
};

/// Message shown when a course has no content below the current block.
pub const COURSEWARE_UNAVAILABLE: &str = "This course content is not available yet.";

/// Overlay message shown when a download is refused for lack of Wi-Fi.
pub const NO_WIFI_MESSAGE: &str = "You must be connected to Wi-Fi to download videos.";

/// Everything the outline screen displays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutlineView {
    /// Navigation title (display name of the current block).
    pub title: Option<String>,
    pub load_state: LoadState,
    /// One group per header: the header block and its rows.
    pub groups: Vec<BlockGroup>,
    /// Row to highlight, following navigation in the content view.
    pub highlighted: Option<BlockId>,
    /// "Resume where you left off" header.
    pub last_accessed: Option<CourseLastAccessed>,
    /// Whether the pull-to-refresh indicator is spinning.
    pub refreshing: bool,
    /// Transient, non-blocking message.
    pub overlay_message: Option<String>,
    /// Bumped every time the list data is replaced.
    pub revision: u64,
}

/// Result of a download request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Enqueued,
    /// Refused by the Wi-Fi-only preference.
    Blocked,
}

struct OutlineShared {
    env: OutlineEnvironment,
    course_id: String,
    root_id: Option<BlockId>,
    pipeline: OutlinePipeline,
    last_accessed: LastAccessedTracker,
    view: Mutex<OutlineView>,
}

/// Controller for one outline screen, rooted at a block of one course.
pub struct OutlineScreenController {
    shared: Arc<OutlineShared>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl OutlineScreenController {
    /// Create the controller. Nothing loads until [`start`](Self::start).
    pub fn new(env: OutlineEnvironment, root_id: Option<BlockId>) -> Self {
        let course_id = env.querier.course_id().to_string();
        let pipeline = OutlinePipeline::new(Arc::clone(&env.querier));
        let last_accessed =
            LastAccessedTracker::new(Arc::clone(&env.last_accessed), Arc::clone(&env.querier));

        Self {
            shared: Arc::new(OutlineShared {
                env,
                course_id,
                root_id,
                pipeline,
                last_accessed,
                view: Mutex::new(OutlineView::default()),
            }),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn course_id(&self) -> &str {
        &self.shared.course_id
    }

    /// Block the outline currently shows; `None` means the course root.
    pub fn block_id(&self) -> Option<BlockId> {
        self.shared.pipeline.current_block_id()
    }

    /// Wire the pipeline to the view and start the initial load.
    pub fn start(&self) {
        let mut subscriptions = self.subscriptions.lock();
        if !subscriptions.is_empty() {
            return;
        }

        let on_headers = Arc::downgrade(&self.shared);
        let on_headers_error = Arc::downgrade(&self.shared);
        subscriptions.push(
            self.shared.pipeline.headers().listen(
                Listener::new()
                    .on_success(move |headers: &BlockGroup| {
                        if let Some(shared) = on_headers.upgrade() {
                            shared.view.lock().title = Some(headers.block.display_name.clone());
                        }
                    })
                    .on_failure(move |error| show_error_if_necessary(&on_headers_error, error)),
            ),
        );

        let on_rows = Arc::downgrade(&self.shared);
        let on_rows_error = Arc::downgrade(&self.shared);
        let on_rows_finally = Arc::downgrade(&self.shared);
        subscriptions.push(
            self.shared.pipeline.rows().listen(
                Listener::new()
                    .on_success(move |groups: &Vec<BlockGroup>| {
                        if let Some(shared) = on_rows.upgrade() {
                            shared.show_groups(groups);
                        }
                    })
                    .on_failure(move |error| show_error_if_necessary(&on_rows_error, error))
                    .on_finally(move || {
                        if let Some(shared) = on_rows_finally.upgrade() {
                            if !shared.pipeline.is_loading() {
                                shared.view.lock().refreshing = false;
                            }
                        }
                    }),
            ),
        );
        drop(subscriptions);

        info!(course_id = %self.shared.course_id, root_id = ?self.shared.root_id, "outline screen started");
        self.shared.pipeline.bind(self.shared.root_id.clone());
    }

    /// Reload the current block from scratch.
    pub fn reload(&self) {
        self.shared.pipeline.bind(self.block_id());
    }

    /// Retry action of the load-state view: back to `Initial`, then reload.
    pub fn retry(&self) {
        self.shared.view.lock().load_state = LoadState::Initial;
        self.reload();
    }

    /// Pull-to-refresh: ask the querier for fresh content and reload.
    pub fn refresh(&self) {
        self.shared.env.querier.set_needs_refresh(true);
        self.shared.view.lock().refreshing = true;
        self.reload();
    }

    /// A sibling content view moved to `block_id` (a child of `parent_id`):
    /// follow it by re-rooting at the parent of `parent_id` and highlighting
    /// the entered block.
    pub fn entered_block(&self, block_id: BlockId, parent_id: BlockId) {
        debug!(%block_id, %parent_id, "content view entered block");
        self.shared.pipeline.bind_parent_of(parent_id);
        self.shared.view.lock().highlighted = Some(block_id);
    }

    /// A row was picked.
    pub fn choose_block(&self, block: &Block, parent_id: &BlockId) {
        info!(block_id = %block.id, %parent_id, "outline row chosen");
        self.shared.env.router.navigate_to_container(
            &block.id,
            block.block_type,
            parent_id,
            &self.shared.course_id,
            ScreenKind::Outline,
        );
    }

    pub fn show_downloads(&self) {
        self.shared.env.router.navigate_to_downloads(ScreenKind::Outline);
    }

    /// Download every video below `rooted_at`.
    ///
    /// Analytics needs the parent of `rooted_at`; if that lookup fails the
    /// failure is logged and the download stands.
    #[instrument(skip_all, fields(block_id = %rooted_at.id, videos = videos.len()))]
    pub async fn download_videos(&self, videos: &[VideoDownload], rooted_at: &Block) -> DownloadOutcome {
        if !self.can_download_video() {
            self.show_overlay_message(NO_WIFI_MESSAGE);
            return DownloadOutcome::Blocked;
        }

        let env = &self.shared.env;
        env.downloads.enqueue_videos(videos);

        match env.querier.parent_of(&rooted_at.id).await {
            Ok(parent_id) => env.analytics.track_bulk_video_download(
                &parent_id,
                &rooted_at.id,
                &self.shared.course_id,
                videos.len(),
            ),
            Err(e) => {
                error!(target: "analytics", block_id = %rooted_at.id, error = %e, "unable to find parent of block");
            }
        }
        DownloadOutcome::Enqueued
    }

    /// Download the video of a single block.
    pub fn download_video(&self, block: &Block) -> DownloadOutcome {
        if !self.can_download_video() {
            self.show_overlay_message(NO_WIFI_MESSAGE);
            return DownloadOutcome::Blocked;
        }

        let env = &self.shared.env;
        env.downloads
            .enqueue_ids(std::slice::from_ref(&block.id), &self.shared.course_id);
        env.analytics.track_single_video_download(
            &block.id,
            &self.shared.course_id,
            block.web_url.as_deref(),
        );
        DownloadOutcome::Enqueued
    }

    /// Screen is about to be shown: refresh last-accessed, report the screen.
    pub async fn view_will_appear(&self) {
        let item = self.shared.last_accessed.load().await;
        self.last_accessed_fetched(item);
        let current = self.block_id();
        self.shared.last_accessed.save(current.as_ref()).await;
        self.track_screen(current).await;
    }

    /// Show or hide the last-accessed header.
    pub fn last_accessed_fetched(&self, item: Option<CourseLastAccessed>) {
        self.shared.view.lock().last_accessed = item;
    }

    /// Jump to the last-accessed block, if one is shown.
    pub async fn resume_last_accessed(&self) {
        let Some(item) = self.shared.view.lock().last_accessed.clone() else {
            return;
        };
        let querier = &self.shared.env.querier;
        let lookup = tokio::try_join!(querier.block(&item.block_id), querier.parent_of(&item.block_id));
        match lookup {
            Ok((block, parent_id)) => self.choose_block(&block, &parent_id),
            Err(e) => error!(block_id = %item.block_id, error = %e, "unable to resume last accessed block"),
        }
    }

    pub fn dismiss_overlay(&self) {
        self.shared.view.lock().overlay_message = None;
    }

    /// Snapshot of the screen for drawing.
    pub fn view(&self) -> OutlineView {
        let loading = self.is_loading();
        let mut view = self.shared.view.lock().clone();
        if loading && view.load_state.is_initial() {
            view.load_state = LoadState::Loading;
        }
        view
    }

    /// Whether any outline stage is waiting on a fetch.
    pub fn is_loading(&self) -> bool {
        self.shared.pipeline.is_loading()
    }

    /// Resolve once the outline has finished loading.
    pub async fn idle(&self) {
        self.shared.pipeline.idle().await;
    }

    /// Tear the screen down; results still in flight are dropped on arrival.
    pub fn shutdown(&self) {
        self.subscriptions.lock().clear();
        self.shared.pipeline.shutdown();
        debug!(course_id = %self.shared.course_id, "outline screen shut down");
    }

    fn can_download_video(&self) -> bool {
        let has_wifi = self.shared.env.reachability.is_on_wifi().unwrap_or(false);
        let only_on_wifi = self.shared.env.preferences.only_on_wifi().unwrap_or(false);
        !only_on_wifi || has_wifi
    }

    fn show_overlay_message(&self, message: &str) {
        info!(message, "showing overlay message");
        self.shared.view.lock().overlay_message = Some(message.to_string());
    }

    async fn track_screen(&self, current: Option<BlockId>) {
        let querier = &self.shared.env.querier;
        let block = async {
            match &current {
                Some(id) => querier.block(id).await,
                None => querier.children_of(None).await.map(|group| group.block),
            }
        };

        match tokio::try_join!(querier.root_id(), block) {
            Ok((root_id, block)) => {
                let analytics = &self.shared.env.analytics;
                if current.is_none() || current.as_ref() == Some(&root_id) {
                    analytics.track_screen(SCREEN_COURSE_OUTLINE, &self.shared.course_id, None);
                } else {
                    analytics.track_screen(
                        SCREEN_SECTION_OUTLINE,
                        &self.shared.course_id,
                        Some(block.analytics_name()),
                    );
                }
            }
            Err(e) => error!(target: "analytics", error = %e, "unable to load block"),
        }
    }
}

impl Drop for OutlineScreenController {
    fn drop(&mut self) {
        self.shared.pipeline.shutdown();
    }
}

impl OutlineShared {
    fn show_groups(&self, groups: &[BlockGroup]) {
        let mut view = self.view.lock();
        view.groups = groups.to_vec();
        view.revision += 1;
        view.load_state = if groups.is_empty() {
            LoadState::Empty {
                icon: EmptyIcon::UnknownError,
                message: COURSEWARE_UNAVAILABLE.to_string(),
            }
        } else {
            LoadState::Loaded
        };
        debug!(groups = groups.len(), revision = view.revision, "outline rows updated");
    }
}

fn show_error_if_necessary(shared: &Weak<OutlineShared>, error: &SharedError) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let mut view = shared.view.lock();
    if view.load_state.is_initial() {
        error!(error = %error, "outline failed to load");
        view.load_state = LoadState::failed(error);
    } else {
        debug!(error = %error, "suppressing outline error, content already shown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::last_accessed::MemoryLastAccessedStore;
    use crate::testing::{
        EMPTY_COURSE, FakeQuerier, Recorder, StaticNetwork, block, settle,
    };
    use courseware_shared::BlockType;

    struct Harness {
        controller: OutlineScreenController,
        querier: Arc<FakeQuerier>,
        recorder: Arc<Recorder>,
    }

    fn harness_with(querier: FakeQuerier, network: StaticNetwork, root: Option<&str>) -> Harness {
        let querier = Arc::new(querier);
        let recorder = Arc::new(Recorder::default());
        let network = Arc::new(network);
        let env = OutlineEnvironment {
            querier: querier.clone(),
            analytics: recorder.clone(),
            router: recorder.clone(),
            downloads: recorder.clone(),
            reachability: network.clone(),
            preferences: network,
            last_accessed: Arc::new(MemoryLastAccessedStore::new()),
        };
        Harness {
            controller: OutlineScreenController::new(env, root.map(BlockId::from)),
            querier,
            recorder,
        }
    }

    fn harness() -> Harness {
        harness_with(
            FakeQuerier::sample(),
            StaticNetwork {
                on_wifi: Some(true),
                only_on_wifi: Some(true),
            },
            None,
        )
    }

    async fn loaded(h: &Harness) -> OutlineView {
        settle(|| h.controller.is_loading()).await;
        h.controller.view()
    }

    #[tokio::test]
    async fn initial_load_shows_title_and_groups() {
        let h = harness();
        assert_eq!(h.controller.view().load_state, LoadState::Initial);

        h.controller.start();
        assert_eq!(h.controller.view().load_state, LoadState::Loading);

        let view = loaded(&h).await;
        assert_eq!(view.title.as_deref(), Some("Demo Course"));
        assert_eq!(view.load_state, LoadState::Loaded);
        let headers: Vec<_> = view.groups.iter().map(|g| g.block.display_name.as_str()).collect();
        assert_eq!(headers, vec!["Week 1", "Week 2"]);
        assert_eq!(view.revision, 1);
    }

    #[tokio::test]
    async fn zero_children_is_empty_not_loaded() {
        let h = harness_with(
            FakeQuerier::from_json(EMPTY_COURSE),
            StaticNetwork {
                on_wifi: None,
                only_on_wifi: None,
            },
            None,
        );
        h.controller.start();

        let view = loaded(&h).await;
        assert_eq!(
            view.load_state,
            LoadState::Empty {
                icon: EmptyIcon::UnknownError,
                message: COURSEWARE_UNAVAILABLE.to_string(),
            }
        );
        assert!(view.groups.is_empty());
    }

    #[tokio::test]
    async fn failure_while_initial_is_shown_once_and_retry_recovers() {
        let h = harness();
        h.querier.fail_children_of("ch2");
        h.controller.start();

        let view = loaded(&h).await;
        assert!(view.load_state.is_failed());

        h.querier.heal_children_of("ch2");
        h.controller.retry();
        let view = loaded(&h).await;
        assert_eq!(view.load_state, LoadState::Loaded);
    }

    #[tokio::test]
    async fn late_failure_does_not_clobber_loaded_content() {
        let h = harness();
        h.controller.start();
        assert_eq!(loaded(&h).await.load_state, LoadState::Loaded);

        h.querier.fail_children_of("<root>");
        h.controller.refresh();
        assert!(h.controller.view().refreshing);

        let view = loaded(&h).await;
        assert_eq!(view.load_state, LoadState::Loaded);
        assert_eq!(view.groups.len(), 2);
        assert!(!view.refreshing);
        assert_eq!(h.querier.refresh_requests.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_rows_do_not_stop_a_pending_refresh() {
        let h = harness();
        let ch1 = h.querier.gate("ch1");
        h.controller.start();
        h.querier.wait_resolved("ch2").await;

        let root = h.querier.gate("<root>");
        h.controller.refresh();
        ch1.send(()).expect("release ch1");
        h.querier.wait_resolved("ch1").await;
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }

        let view = h.controller.view();
        assert!(view.refreshing);
        assert_eq!(view.load_state, LoadState::Loading);
        assert_eq!(view.revision, 0);

        root.send(()).expect("release root");
        let view = loaded(&h).await;
        assert!(!view.refreshing);
        assert_eq!(view.load_state, LoadState::Loaded);
        assert_eq!(view.revision, 1);
    }

    #[tokio::test]
    async fn superseded_failure_does_not_replace_newer_content() {
        let h = harness();
        let ch2 = h.querier.gate("ch2");
        h.querier.fail_children_of("ch2");
        h.controller.start();
        h.querier.wait_resolved("ch1").await;

        h.controller.entered_block("v1".into(), "seq1".into());
        let view = loaded(&h).await;
        assert_eq!(view.load_state, LoadState::Loaded);
        assert_eq!(view.title.as_deref(), Some("Week 1"));

        ch2.send(()).expect("release ch2");
        h.querier.wait_resolved("ch2").await;
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }

        let after = h.controller.view();
        assert_eq!(after.load_state, LoadState::Loaded);
        assert_eq!(after.groups, view.groups);
        assert_eq!(after.revision, view.revision);
    }

    #[tokio::test]
    async fn refresh_indicator_stops_after_successful_reload() {
        let h = harness();
        h.controller.start();
        loaded(&h).await;

        h.controller.refresh();
        let view = loaded(&h).await;
        assert!(!view.refreshing);
        assert_eq!(view.revision, 2);
    }

    #[tokio::test]
    async fn entering_a_block_follows_its_parent_chain() {
        let h = harness();
        h.controller.start();
        loaded(&h).await;

        h.controller.entered_block("v1".into(), "seq1".into());
        let view = loaded(&h).await;

        assert_eq!(h.controller.block_id(), Some("ch1".into()));
        assert_eq!(view.title.as_deref(), Some("Week 1"));
        assert_eq!(view.highlighted, Some("v1".into()));
        let headers: Vec<_> = view.groups.iter().map(|g| g.block.id.as_str()).collect();
        assert_eq!(headers, vec!["seq1", "seq2"]);
    }

    #[tokio::test]
    async fn choosing_a_row_routes_with_parent_and_course() {
        let h = harness();
        h.controller
            .choose_block(&block("seq1", BlockType::Sequential), &"ch1".into());
        h.controller.show_downloads();

        assert_eq!(
            h.recorder.events(),
            vec![
                "nav:seq1:sequential:ch1:course-v1:Demo+101:Outline",
                "nav:downloads:Outline",
            ]
        );
    }

    #[tokio::test]
    async fn wifi_only_without_wifi_blocks_downloads() {
        let h = harness_with(
            FakeQuerier::sample(),
            StaticNetwork {
                on_wifi: Some(false),
                only_on_wifi: Some(true),
            },
            None,
        );
        let seq1 = block("seq1", BlockType::Sequential);
        let videos = vec![VideoDownload::from(&block("v1", BlockType::Video))];

        assert_eq!(h.controller.download_videos(&videos, &seq1).await, DownloadOutcome::Blocked);
        assert_eq!(
            h.controller.download_video(&block("v1", BlockType::Video)),
            DownloadOutcome::Blocked
        );

        assert!(h.recorder.videos.lock().is_empty());
        assert!(h.recorder.events().is_empty());
        assert_eq!(h.controller.view().overlay_message.as_deref(), Some(NO_WIFI_MESSAGE));

        h.controller.dismiss_overlay();
        assert!(h.controller.view().overlay_message.is_none());
    }

    #[tokio::test]
    async fn downloads_proceed_on_wifi_or_without_restriction() {
        for network in [
            StaticNetwork {
                on_wifi: Some(true),
                only_on_wifi: Some(true),
            },
            StaticNetwork {
                on_wifi: Some(false),
                only_on_wifi: Some(false),
            },
            StaticNetwork {
                on_wifi: None,
                only_on_wifi: None,
            },
        ] {
            let h = harness_with(FakeQuerier::sample(), network, None);
            let seq1 = block("seq1", BlockType::Sequential);
            let videos = vec![VideoDownload::from(&block("v1", BlockType::Video))];

            assert_eq!(h.controller.download_videos(&videos, &seq1).await, DownloadOutcome::Enqueued);
            assert_eq!(h.recorder.videos.lock().len(), 1);
            assert_eq!(h.recorder.events(), vec!["bulk:ch1:seq1:1"]);
            assert!(h.controller.view().overlay_message.is_none());
        }
    }

    #[tokio::test]
    async fn bulk_download_survives_failed_parent_lookup() {
        let h = harness();
        h.querier.fail_parent_lookups();
        let seq1 = block("seq1", BlockType::Sequential);
        let videos = vec![VideoDownload::from(&block("v1", BlockType::Video))];

        assert_eq!(h.controller.download_videos(&videos, &seq1).await, DownloadOutcome::Enqueued);
        assert_eq!(h.recorder.videos.lock().len(), 1);
        assert!(h.recorder.events().is_empty());
    }

    #[tokio::test]
    async fn single_download_tracks_unit_url() {
        let h = harness();
        let mut video = block("v1", BlockType::Video);
        video.web_url = Some("https://courses.example.com/unit/v1".into());

        assert_eq!(h.controller.download_video(&video), DownloadOutcome::Enqueued);
        assert_eq!(h.recorder.videos.lock()[0].block_id, BlockId::from("v1"));
        assert_eq!(
            h.recorder.events(),
            vec!["single:v1:https://courses.example.com/unit/v1"]
        );
    }

    #[tokio::test]
    async fn appearing_tracks_course_or_section_screen() {
        let h = harness();
        h.controller.start();
        loaded(&h).await;
        h.controller.view_will_appear().await;

        let section = harness_with(
            FakeQuerier::sample(),
            StaticNetwork {
                on_wifi: None,
                only_on_wifi: None,
            },
            Some("seq1"),
        );
        section.controller.start();
        loaded(&section).await;
        section.controller.view_will_appear().await;

        assert_eq!(
            h.recorder.events(),
            vec!["screen:Course Outline:course-v1:Demo+101:-"]
        );
        assert_eq!(
            section.recorder.events(),
            vec!["screen:Section Outline:course-v1:Demo+101:intro-sequence"]
        );
    }

    #[tokio::test]
    async fn last_accessed_is_shown_on_the_next_appearance() {
        let h = harness();
        h.controller.start();
        loaded(&h).await;

        h.controller.entered_block("v1".into(), "seq1".into());
        loaded(&h).await;
        h.controller.view_will_appear().await;
        // Nothing was recorded before this appearance.
        assert!(h.controller.view().last_accessed.is_none());

        h.controller.view_will_appear().await;
        let resumed = h.controller.view().last_accessed.expect("last accessed");
        assert_eq!(resumed.block_id, BlockId::from("ch1"));
        assert_eq!(resumed.display_name, "Week 1");
    }

    #[tokio::test]
    async fn shutdown_drops_results_still_in_flight() {
        let h = harness();
        let gate = h.querier.gate("<root>");
        h.controller.start();
        h.controller.shutdown();

        gate.send(()).expect("release root fetch");
        h.querier.wait_resolved("<root>").await;

        let view = h.controller.view();
        assert_eq!(view.load_state, LoadState::Initial);
        assert!(view.title.is_none());
    }
}
