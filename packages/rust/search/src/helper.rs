//! Find-courses web view helper.
//!
//! Drives an embedded course-search page: decides which navigations stay in
//! the page and which go to the system browser, answers authentication
//! challenges from configured credentials, tracks the page load state and
//! turns search-bar submissions into search URLs.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use courseware_shared::{AppConfig, CoursewareError, HostCredential, LoadState, Result};
use courseware_stream::{BackedStage, Listener, Subscription};

use crate::query::build_query;

/// Placeholder substituted in the course info URL template.
pub const PATH_ID_PLACEHOLDER: &str = "{path_id}";

/// What triggered a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationType {
    /// The user activated a link.
    LinkActivated,
    FormSubmitted,
    BackForward,
    Reload,
    Other,
}

/// Target of a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub url: Option<Url>,
    /// URL of the top-level document the navigation belongs to.
    pub main_document_url: Option<Url>,
}

impl NavigationRequest {
    /// A top-level navigation to `url`.
    pub fn top_level(url: Url) -> Self {
        Self {
            main_document_url: Some(url.clone()),
            url: Some(url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationAction {
    pub navigation_type: NavigationType,
    pub request: NavigationRequest,
}

/// Verdict for a pending navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationPolicy {
    Allow,
    Cancel,
}

/// Answer to an HTTP authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChallengeDisposition {
    UseCredential(HostCredential),
    PerformDefaultHandling,
}

/// A page as delivered by a [`WebSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPage {
    /// Final URL after redirects.
    pub url: Url,
    pub status: u16,
    pub title: Option<String>,
    pub body_len: usize,
}

/// Owner of the helper; decides whether clicked links leave the page.
pub trait WebSearchDelegate: Send + Sync {
    /// `true` to hand the clicked link to the system browser.
    fn should_load_link(&self, request: &NavigationRequest) -> bool;
}

/// The system browser.
pub trait ExternalBrowser: Send + Sync {
    fn open(&self, url: &Url);
}

/// Source of credentials for authentication challenges.
pub trait ChallengeHandler: Send + Sync {
    fn respond(&self, host: &str) -> AuthChallengeDisposition;
}

/// Something that can load a page, answering challenges through `challenges`.
#[async_trait]
pub trait WebSurface: Send + Sync {
    async fn load(&self, url: &Url, challenges: Arc<dyn ChallengeHandler>) -> Result<LoadedPage>;
}

/// Answers challenges from the `[[credentials]]` table of the config.
#[derive(Debug, Clone, Default)]
pub struct ConfigCredentials {
    config: AppConfig,
}

impl ConfigCredentials {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }
}

impl ChallengeHandler for ConfigCredentials {
    fn respond(&self, host: &str) -> AuthChallengeDisposition {
        match self.config.credential_for_host(host) {
            Some(credential) => {
                debug!(host, username = %credential.username, "answering challenge with configured credential");
                AuthChallengeDisposition::UseCredential(credential.clone())
            }
            None => AuthChallengeDisposition::PerformDefaultHandling,
        }
    }
}

#[derive(Debug, Default)]
struct HelperState {
    request: Option<Url>,
    load_state: LoadState,
    search_base_url: Option<Url>,
}

struct HelperShared {
    state: Mutex<HelperState>,
}

impl HelperShared {
    fn set_load_state(&self, load_state: LoadState) {
        self.state.lock().load_state = load_state;
    }
}

/// Helper behind the find-courses screen.
pub struct WebSearchHelper {
    shared: Arc<HelperShared>,
    page: BackedStage<LoadedPage>,
    surface: Arc<dyn WebSurface>,
    browser: Arc<dyn ExternalBrowser>,
    credentials: Arc<ConfigCredentials>,
    delegate: Option<Weak<dyn WebSearchDelegate>>,
    course_info_template: String,
    _page_link: Subscription,
}

impl WebSearchHelper {
    pub fn new(
        config: AppConfig,
        surface: Arc<dyn WebSurface>,
        browser: Arc<dyn ExternalBrowser>,
    ) -> Self {
        let shared = Arc::new(HelperShared {
            state: Mutex::new(HelperState {
                search_base_url: config.search.base_url.clone(),
                ..HelperState::default()
            }),
        });
        let page = BackedStage::new("page");

        let on_page = Arc::downgrade(&shared);
        let on_page_error = Arc::downgrade(&shared);
        let page_link = page.listen(
            Listener::new()
                .on_success(move |page: &LoadedPage| {
                    if let Some(shared) = on_page.upgrade() {
                        info!(url = %page.url, status = page.status, title = ?page.title, "search page loaded");
                        shared.set_load_state(LoadState::Loaded);
                    }
                })
                .on_failure(move |error| {
                    if let Some(shared) = on_page_error.upgrade() {
                        warn!(%error, "search page failed to load");
                        shared.set_load_state(LoadState::failed(error));
                    }
                }),
        );

        Self {
            shared,
            page,
            surface,
            browser,
            course_info_template: config.search.course_info_url_template.clone(),
            credentials: Arc::new(ConfigCredentials::new(config)),
            delegate: None,
            _page_link: page_link,
        }
    }

    /// Attach the owner. Only a weak reference is kept.
    pub fn with_delegate(mut self, delegate: &Arc<dyn WebSearchDelegate>) -> Self {
        self.delegate = Some(Arc::downgrade(delegate));
        self
    }

    /// Decide whether a navigation stays in the page.
    ///
    /// Clicked links (when the delegate agrees, or there is no delegate) and
    /// navigations whose main document lives on another host than the
    /// current request are cancelled and opened in the system browser.
    pub fn decide_policy(&self, action: &NavigationAction) -> NavigationPolicy {
        let request = &action.request;
        let captured_link = action.navigation_type == NavigationType::LinkActivated
            && self
                .delegate
                .as_ref()
                .and_then(Weak::upgrade)
                .is_none_or(|delegate| delegate.should_load_link(request));

        let current_host = self
            .shared
            .state
            .lock()
            .request
            .as_ref()
            .and_then(|url| url.host_str().map(str::to_owned));
        let request_host = request.main_document_url.as_ref().and_then(Url::host_str);
        let outside_link = request_host != current_host.as_deref();

        match &request.url {
            Some(url) if outside_link || captured_link => {
                info!(%url, outside_link, captured_link, "opening link in system browser");
                self.browser.open(url);
                NavigationPolicy::Cancel
            }
            _ => NavigationPolicy::Allow,
        }
    }

    /// Load `url` in the page, superseding any load in flight.
    pub fn load_request_with_url(&self, url: Url) -> JoinHandle<()> {
        {
            let mut state = self.shared.state.lock();
            state.request = Some(url.clone());
            state.load_state = LoadState::Initial;
        }
        debug!(%url, "loading search page");

        let surface = Arc::clone(&self.surface);
        let challenges: Arc<dyn ChallengeHandler> = self.credentials.clone();
        self.page
            .back_with(move |_| async move { surface.load(&url, challenges).await.map_err(Arc::new) })
    }

    /// The page finished loading.
    pub fn did_finish_navigation(&self) {
        self.shared.set_load_state(LoadState::Loaded);
    }

    /// The page failed to load; the error is shown with a retry action.
    pub fn did_fail_navigation(&self, error: &impl std::fmt::Display) {
        self.shared.set_load_state(LoadState::failed(error));
    }

    /// Reissue the last request. Does nothing before the first load.
    pub fn retry(&self) -> Option<JoinHandle<()>> {
        let request = self.shared.state.lock().request.clone()?;
        Some(self.load_request_with_url(request))
    }

    pub fn authentication_challenge(&self, host: &str) -> AuthChallengeDisposition {
        self.credentials.respond(host)
    }

    /// Search-bar submission: load the search results for `text`.
    pub fn search_submitted(&self, text: &str) -> Result<JoinHandle<()>> {
        let base = self
            .search_base_url()
            .ok_or_else(|| CoursewareError::config("no search base URL configured"))?;
        let url = build_query(base.as_str(), text)?;
        info!(terms = text, %url, "course search submitted");
        Ok(self.load_request_with_url(url))
    }

    pub fn search_base_url(&self) -> Option<Url> {
        self.shared.state.lock().search_base_url.clone()
    }

    pub fn set_search_base_url(&self, url: Option<Url>) {
        self.shared.state.lock().search_base_url = url;
    }

    /// URL of the course info page for `path_id`.
    pub fn course_info_url(&self, path_id: &str) -> Result<Url> {
        if self.course_info_template.is_empty() {
            return Err(CoursewareError::config("no course info URL template configured"));
        }
        let url = self.course_info_template.replace(PATH_ID_PLACEHOLDER, path_id);
        Url::parse(&url).map_err(|e| CoursewareError::validation(format!("invalid course info URL {url}: {e}")))
    }

    pub fn is_loaded(&self) -> bool {
        self.shared.state.lock().load_state.is_loaded()
    }

    /// Load state for display; `Loading` while a load is in flight.
    pub fn load_state(&self) -> LoadState {
        let loading = self.page.is_active();
        let state = self.shared.state.lock().load_state.clone();
        if loading && state.is_initial() {
            LoadState::Loading
        } else {
            state
        }
    }

    pub fn current_request(&self) -> Option<Url> {
        self.shared.state.lock().request.clone()
    }

    /// Most recently loaded page.
    pub fn page(&self) -> Option<LoadedPage> {
        self.page.value()
    }

    pub fn is_loading(&self) -> bool {
        self.page.is_active()
    }

    pub fn shutdown(&self) {
        self.page.shutdown();
    }
}

impl Drop for WebSearchHelper {
    fn drop(&mut self) {
        self.page.shutdown();
    }
}
