//! Outline screen logic for courseware browsing.
//!
//! The [`OutlinePipeline`] turns a block id into the header and row groups an
//! outline shows; the [`OutlineScreenController`] folds those into an
//! [`OutlineView`] and handles navigation, downloads and analytics.

pub mod last_accessed;
pub mod outline;
pub mod pipeline;
pub mod querier;
pub mod services;

#[cfg(test)]
mod testing;

pub use last_accessed::{LastAccessedStore, LastAccessedTracker, MemoryLastAccessedStore};
pub use outline::{
    COURSEWARE_UNAVAILABLE, DownloadOutcome, NO_WIFI_MESSAGE, OutlineScreenController, OutlineView,
};
pub use pipeline::OutlinePipeline;
pub use querier::{CourseQuerier, CourseTree, JsonCourseQuerier};
pub use services::{
    Analytics, DownloadPreferences, DownloadService, OutlineEnvironment, QueuedDownloads,
    Reachability, Router, SCREEN_COURSE_OUTLINE, SCREEN_SECTION_OUTLINE, ScreenKind,
    TracingAnalytics,
};
